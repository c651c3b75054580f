use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::app::error::{Error, Result};
use crate::browser::{ChromeFactory, DriverFactory, ReadinessDetector, RenderedFetcher};
use crate::config::{Config, ConfigError};
use crate::document::DocumentExtractor;
use crate::domain::{FetchRequest, FetchResult, TypeHint};
use crate::fetcher::{Fetcher, HttpFetcher, StaticFetcher};
use crate::ocr::{ImagePreprocessor, PageCapture, QualityGate, ScreenshotOcrEngine, TesseractRunner, TextCleaner};
use crate::orchestrator::{FetchOrchestrator, Tier};

/// The engine wired from one configuration value
pub struct Engine {
    pub config: Arc<Config>,
    pub orchestrator: FetchOrchestrator,
    tesseract: TesseractRunner,
}

impl Engine {
    /// Validate `config` and build every tier. Fails on configuration the
    /// engine could never run with.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.fetch.clone())?);
        let browser: Arc<dyn DriverFactory> = Arc::new(ChromeFactory::new(
            config.browser.clone(),
            config.fetch.user_agent.clone(),
        ));
        Self::with_components(config, http, browser)
    }

    /// Like [`Engine::new`], but also fails when Tesseract or one of the
    /// configured OCR languages is missing
    pub async fn start(config: Config) -> Result<Self> {
        let engine = Self::new(config)?;
        let languages = engine.check_ocr().await?;
        debug!("OCR ready with {} installed language(s)", languages.len());
        Ok(engine)
    }

    /// Build with a custom fetcher and browser, e.g. for tests
    pub fn with_components(config: Config, http: Arc<dyn Fetcher>, browser: Arc<dyn DriverFactory>) -> Result<Self> {
        let tesseract = TesseractRunner::new(config.ocr.clone());
        let cleaner = TextCleaner::new(config.cleaner.clone())
            .map_err(|e| ConfigError::Invalid(format!("cleaner.ui_blacklist: {}", e)))?;

        let screenshot = ScreenshotOcrEngine::new(
            browser.clone(),
            ReadinessDetector::new(config.readiness.clone()),
            PageCapture::new(config.capture.clone()),
            ImagePreprocessor::new(config.ocr.clone()),
            Arc::new(tesseract.clone()),
            cleaner,
            QualityGate::new(config.quality.clone()),
        );

        let tiers: Vec<Box<dyn Tier>> = vec![
            Box::new(StaticFetcher::new(http.clone())),
            Box::new(RenderedFetcher::new(browser, config.readiness.clone())),
            Box::new(DocumentExtractor::new(http)),
            Box::new(screenshot),
        ];
        let orchestrator = FetchOrchestrator::new(
            tiers,
            config.tiers.clone(),
            config.fetch.min_text_length,
            config.cache.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            tesseract,
        })
    }

    /// Fail when Tesseract or one of its configured languages is missing
    pub async fn check_ocr(&self) -> Result<Vec<String>> {
        Ok(self.tesseract.check_languages().await?)
    }

    /// Request for `url` under the configured global deadline
    pub fn request(&self, url: &str, hint: Option<TypeHint>) -> Result<FetchRequest> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Other(format!("Unsupported URL scheme: {}", url.scheme())));
        }
        let mut request = FetchRequest::new(url, self.config.tiers.global_deadline());
        if let Some(hint) = hint {
            request = request.with_hint(hint);
        }
        Ok(request)
    }

    pub fn request_with_deadline(&self, url: &str, hint: Option<TypeHint>, deadline: Duration) -> Result<FetchRequest> {
        let mut request = self.request(url, hint)?;
        request.global_deadline = deadline;
        Ok(request)
    }

    pub async fn fetch(&self, request: FetchRequest) -> FetchResult {
        self.orchestrator.acquire(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::OcrError;
    use crate::browser::testing::FakeFactory;
    use crate::domain::TierKind;

    fn engine() -> Engine {
        let http: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(Default::default()).unwrap());
        Engine::with_components(Config::default(), http, Arc::new(FakeFactory::broken())).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = Config::default();
        config.tiers.document_timeout_secs = 0;
        assert!(matches!(Engine::new(config), Err(Error::Config(_))));

        let mut config = Config::default();
        config.ocr.languages.clear();
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_all_four_tiers_in_order() {
        assert_eq!(engine().orchestrator.tier_kinds(), TierKind::ALL.to_vec());
    }

    #[test]
    fn test_request_building() {
        let engine = engine();
        let request = engine.request("https://example.com/a.pdf", None).unwrap();
        assert_eq!(request.global_deadline, Duration::from_secs(600));
        assert_eq!(request.effective_hint(), Some(TypeHint::Pdf));

        assert!(engine.request("not a url", None).is_err());
        assert!(engine.request("ftp://example.com/file", None).is_err());
    }

    #[tokio::test]
    async fn test_start_fails_without_tesseract() {
        let mut config = Config::default();
        config.ocr.tesseract_bin = "/nonexistent/tesseract-binary".to_string();

        let err = Engine::start(config).await.err().unwrap();

        assert!(matches!(err, Error::Ocr(OcrError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_fails_on_missing_language_data() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("tesseract");
        std::fs::write(
            &bin,
            "#!/bin/sh\necho 'List of available languages in \"/usr/share/tessdata/\" (2):'\necho eng\necho osd\n",
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut config = Config::default();
        config.ocr.tesseract_bin = bin.display().to_string();
        config.ocr.languages = vec!["eng".to_string(), "chi_sim".to_string()];

        let err = Engine::start(config).await.err().unwrap();

        assert!(matches!(err, Error::Ocr(OcrError::MissingLanguage(ref lang)) if lang == "chi_sim"));
    }
}
