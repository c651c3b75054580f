//! Tier 4: screenshot the rendered document page by page and read it back with OCR.
//!
//! ```text
//! Load → SuppressUi → DetectPagination → [pages × scrolls] → Preprocess → Ocr → Clean → QualityGate
//! ```
//!
//! The gate never discards text. A failing verdict lowers the confidence
//! to `Low` and leaves the accept decision to the orchestrator.

pub mod capture;
pub mod cleaner;
pub mod preprocess;
pub mod quality;
pub mod runner;

pub use capture::{parse_indicator, CaptureReport, CapturedPage, PageCapture, PageCaptureState};
pub use cleaner::TextCleaner;
pub use preprocess::ImagePreprocessor;
pub use quality::{OcrQualityMetrics, QualityGate, QualityVerdict};
pub use runner::{OcrRunner, TesseractRunner};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::error::{OcrError, RenderError, TierError};
use crate::browser::{DriverFactory, PageDriver, ReadinessDetector};
use crate::cache::ArtifactDir;
use crate::domain::{Confidence, SubAttempt, TierKind};
use crate::orchestrator::{Tier, TierContext, TierOutput};

/// Recognized text plus the gate's verdict on it
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub text: String,
    pub verdict: QualityVerdict,
    pub pages: usize,
    pub planned_pages: u32,
    pub captures: usize,
    /// Capture or OCR stopped at the deadline before the document was done
    pub truncated: bool,
    pub page_errors: Vec<(u32, String)>,
}

pub struct ScreenshotOcrEngine {
    factory: Arc<dyn DriverFactory>,
    detector: ReadinessDetector,
    capture: PageCapture,
    preprocessor: ImagePreprocessor,
    runner: Arc<dyn OcrRunner>,
    cleaner: TextCleaner,
    gate: QualityGate,
}

impl ScreenshotOcrEngine {
    pub fn new(
        factory: Arc<dyn DriverFactory>,
        detector: ReadinessDetector,
        capture: PageCapture,
        preprocessor: ImagePreprocessor,
        runner: Arc<dyn OcrRunner>,
        cleaner: TextCleaner,
        gate: QualityGate,
    ) -> Self {
        Self {
            factory,
            detector,
            capture,
            preprocessor,
            runner,
            cleaner,
            gate,
        }
    }

    pub async fn run(&self, url: &Url, artifacts: &ArtifactDir, deadline: Instant) -> Result<OcrOutcome, TierError> {
        let report = self.capture_pages(url, artifacts, deadline).await?;
        let captures = report.groups.iter().map(|g| g.images.len()).sum::<usize>();
        info!(
            "Captured {} screenshot(s) over {} of {} page(s)",
            captures,
            report.groups.len(),
            report.planned_pages
        );

        let recognized = self.recognize(&report.groups, deadline).await;
        artifacts.clear_captures();
        let (text, ocr_truncated) = recognized?;

        if text.trim().is_empty() {
            return Err(TierError::Rejected("OCR produced no text".to_string()));
        }

        let verdict = self.gate.evaluate(&text);
        if verdict.passed {
            info!("OCR text passed the quality gate: {:?}", verdict.metrics);
        } else {
            warn!("OCR text below quality bar: {:?}", verdict.metrics);
        }
        Ok(OcrOutcome {
            text,
            verdict,
            pages: report.groups.len(),
            planned_pages: report.planned_pages,
            captures,
            truncated: report.truncated || ocr_truncated,
            page_errors: report.page_errors,
        })
    }

    async fn capture_pages(&self, url: &Url, artifacts: &ArtifactDir, deadline: Instant) -> Result<CaptureReport, TierError> {
        let driver = self.factory.launch().await?;
        let result = self.load_and_capture(driver.as_ref(), url, artifacts, deadline).await;
        driver.close().await;
        result
    }

    /// Load and capture, leaving part of the time until `deadline` for OCR
    async fn load_and_capture(
        &self,
        driver: &dyn PageDriver,
        url: &Url,
        artifacts: &ArtifactDir,
        deadline: Instant,
    ) -> Result<CaptureReport, TierError> {
        let now = Instant::now();
        let left = deadline.saturating_duration_since(now);
        let capture_deadline = now + (left - self.capture.ocr_reserve().min(left / 2));

        let remaining = capture_deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, driver.navigate(url))
            .await
            .map_err(|_| RenderError::Timeout(format!("navigation to {}", url)))??;
        let readiness = self.detector.wait(driver, capture_deadline).await;
        debug!("Viewer readiness: {:?}", readiness);
        self.capture.run(driver, artifacts, capture_deadline).await
    }

    /// OCR every capture in page order, dropping lines repeated across
    /// consecutive captures of the same page. Stops at `deadline` with the
    /// pages read so far; the flag says whether it did.
    async fn recognize(&self, groups: &[CapturedPage], deadline: Instant) -> Result<(String, bool), TierError> {
        let mut pages = Vec::with_capacity(groups.len());
        let mut last_error = None;
        let mut truncated = false;

        for group in groups {
            let mut previous = String::new();
            let mut page_text = Vec::new();

            for image in &group.images {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let recognized = if remaining.is_zero() {
                    None
                } else {
                    let input = self.preprocess(image.clone()).await;
                    tokio::time::timeout(remaining, self.runner.recognize(&input)).await.ok()
                };
                let raw = match recognized {
                    Some(Ok(raw)) => raw,
                    Some(Err(e @ (OcrError::Unavailable(_) | OcrError::MissingLanguage(_)))) => return Err(e.into()),
                    Some(Err(e)) => {
                        warn!("OCR failed on {}: {}", image.display(), e);
                        last_error = Some(e);
                        continue;
                    }
                    None => {
                        warn!("Deadline reached during OCR of page {}", group.page);
                        truncated = true;
                        break;
                    }
                };

                let cleaned = self.cleaner.clean(&raw);
                let fresh = cleaner::drop_overlap(&previous, &cleaned);
                if !fresh.trim().is_empty() {
                    page_text.push(fresh);
                }
                previous = cleaned;
            }

            if !page_text.is_empty() {
                pages.push(page_text.join("\n"));
            }
            if truncated {
                break;
            }
        }

        if pages.is_empty() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }
        Ok((crate::text::normalize_whitespace(&pages.join("\n\n")), truncated))
    }

    /// Preprocessed copy of `image`, or the original if preprocessing fails
    async fn preprocess(&self, image: PathBuf) -> PathBuf {
        let preprocessor = self.preprocessor.clone();
        let source = image.clone();
        match tokio::task::spawn_blocking(move || preprocessor.process_file(&source)).await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                warn!("Preprocessing failed, using raw capture: {}", e);
                image
            }
            Err(e) => {
                warn!("Preprocessing task failed, using raw capture: {}", e);
                image
            }
        }
    }
}

#[async_trait]
impl Tier for ScreenshotOcrEngine {
    fn kind(&self) -> TierKind {
        TierKind::ScreenshotOcr
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutput {
        match self.run(&ctx.request.url, ctx.artifacts, ctx.deadline).await {
            Ok(outcome) => {
                let metrics = &outcome.verdict.metrics;
                let gate = if outcome.verdict.passed {
                    SubAttempt::success("quality_gate")
                } else {
                    SubAttempt::failure(
                        "quality_gate",
                        format!(
                            "{} chars, {} keyword hits, {:.0}% alphabetic",
                            metrics.char_length,
                            metrics.keyword_hits,
                            metrics.alpha_ratio * 100.0
                        ),
                    )
                };
                let capture = format!(
                    "capture: {} of {} pages, {} images",
                    outcome.pages, outcome.planned_pages, outcome.captures
                );
                let mut details = vec![if outcome.truncated {
                    SubAttempt::failure(capture, "stopped at the deadline")
                } else {
                    SubAttempt::success(capture)
                }];
                details.extend(
                    outcome
                        .page_errors
                        .iter()
                        .map(|(page, reason)| SubAttempt::failure(format!("page {}", page), reason.clone())),
                );
                details.push(gate);

                // A document cut short is never more than Low
                let confidence = if outcome.truncated {
                    Confidence::Low
                } else {
                    outcome.verdict.confidence()
                };
                TierOutput::from(Ok(outcome.text))
                    .with_details(details)
                    .with_confidence(confidence)
                    .with_deadline_hit(outcome.truncated)
            }
            Err(e) => TierOutput::from(Err(e)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeOcr;
    use super::*;
    use crate::browser::testing::{FakeFactory, FakePage};
    use crate::config::{CaptureConfig, CleanerConfig, OcrConfig, QualityConfig, ReadinessConfig};
    use std::time::Duration;

    fn engine(page: FakePage, ocr: Arc<FakeOcr>) -> ScreenshotOcrEngine {
        ScreenshotOcrEngine::new(
            Arc::new(FakeFactory::new(page)),
            ReadinessDetector::new(ReadinessConfig::default()),
            PageCapture::new(CaptureConfig::default()),
            ImagePreprocessor::new(OcrConfig {
                binarize: false,
                ..Default::default()
            }),
            ocr,
            TextCleaner::new(CleanerConfig::default()).unwrap(),
            QualityGate::new(QualityConfig::default()),
        )
    }

    fn url() -> Url {
        Url::parse("https://docs.qq.com/pdf/DSk9uYlZ").unwrap()
    }

    fn artifacts() -> (tempfile::TempDir, ArtifactDir) {
        let root = tempfile::tempdir().unwrap();
        let dir = ArtifactDir::create(root.path(), "ocr", false).unwrap();
        (root, dir)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_are_read_in_order_and_overlap_dropped() {
        // Single capture per page: viewport equals page height
        let page = FakePage::viewer(3, Some(3), 900, 900);
        let ocr = Arc::new(FakeOcr::new(&[
            ("page1_1", "Postdoctoral research position in ecology\nZoom in"),
            ("page2_1", "Applicants need a PhD in biology or related fields"),
            ("page3_1", "Send your CV by email before the deadline"),
        ]));
        let engine = engine(page.clone(), ocr.clone());
        let (_root, dir) = artifacts();

        let outcome = engine
            .run(&url(), &dir, Instant::now() + Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(
            outcome.text,
            "Postdoctoral research position in ecology\n\n\
             Applicants need a PhD in biology or related fields\n\n\
             Send your CV by email before the deadline"
        );
        assert_eq!(*ocr.seen.lock().unwrap(), vec!["page1_1", "page2_1", "page3_1"]);
        assert_eq!(outcome.pages, 3);
        assert!(outcome.verdict.passed);
        assert!(page.is_closed());
        // Screenshots are gone once OCR is done
        assert!(!dir.capture_path(1, 1).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_lines_between_scroll_captures_are_dropped() {
        let page = FakePage::viewer(1, Some(1), 1260, 900);
        let ocr = Arc::new(FakeOcr::new(&[
            ("page1_1", "Research group overview paragraph\nFunding covers four years"),
            ("page1_2", "Funding covers four years\nApply through the university portal"),
        ]));
        let (_root, dir) = artifacts();

        let outcome = engine(page, ocr)
            .run(&url(), &dir, Instant::now() + Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(
            outcome.text,
            "Research group overview paragraph\nFunding covers four years\nApply through the university portal"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_quality_text_is_returned_with_low_confidence() {
        let page = FakePage::viewer(1, None, 900, 900);
        let ocr = Arc::new(FakeOcr::new(&[("page1_1", "Some unrelated words here")]));
        let (_root, dir) = artifacts();
        let request = crate::domain::FetchRequest::new(url(), Duration::from_secs(600));
        let ctx = TierContext {
            request: &request,
            artifacts: &dir,
            deadline: Instant::now() + Duration::from_secs(300),
        };

        let output = engine(page, ocr).attempt(&ctx).await;

        assert_eq!(output.result.unwrap(), "Some unrelated words here");
        assert_eq!(output.confidence, Some(crate::domain::Confidence::Low));
        assert!(!output.details[1].outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_language_data_fails_the_tier() {
        let page = FakePage::viewer(2, Some(2), 900, 900);
        let ocr = Arc::new(FakeOcr::failing(OcrError::MissingLanguage("chi_sim".to_string())));
        let (_root, dir) = artifacts();

        let err = engine(page, ocr)
            .run(&url(), &dir, Instant::now() + Duration::from_secs(300))
            .await
            .unwrap_err();

        assert!(matches!(err, TierError::Ocr(OcrError::MissingLanguage(_))));
        assert!(!dir.capture_path(1, 1).exists());
    }
}
