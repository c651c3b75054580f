use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::error::{RenderError, TierError};
use crate::browser::PageDriver;
use crate::cache::ArtifactDir;
use crate::config::CaptureConfig;

/// Screenshots of one viewer page, top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    pub page: u32,
    pub images: Vec<PathBuf>,
}

/// Progress through the pages × scrolls loop
#[derive(Debug, Default)]
pub struct PageCaptureState {
    pub page_index: u32,
    pub total_pages_estimate: u32,
    pub scroll_offset: u64,
    pub last_scroll_offset: u64,
    pub images: Vec<PathBuf>,
}

/// Everything one capture run produced
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub groups: Vec<CapturedPage>,
    /// Pages the run meant to visit
    pub planned_pages: u32,
    /// Capturing stopped at the deadline
    pub truncated: bool,
    /// Pages whose capture broke off, with the reason
    pub page_errors: Vec<(u32, String)>,
}

/// How the scroll loop over one page ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageEnd {
    Bottom,
    SpilledIntoNext,
    ScrollCap,
    Deadline,
}

/// `(current, total)` from indicator text such as `"1 / 3"` or `"第 2/5 页"`
pub fn parse_indicator(text: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"(\d+)\s*/\s*(\d+)").ok()?;
    let caps = re.captures(text)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps.get(2)?.as_str().parse().ok()?;
    (total > 0).then_some((current, total))
}

/// Sleep for `delay`, but never past `deadline`
async fn settle(delay: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    tokio::time::sleep(delay.min(remaining)).await;
}

/// Scroll-and-screenshot loop over a paginated viewer
#[derive(Debug, Clone)]
pub struct PageCapture {
    config: CaptureConfig,
}

impl PageCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn ocr_reserve(&self) -> Duration {
        self.config.ocr_reserve()
    }

    async fn indicator(&self, driver: &dyn PageDriver) -> Option<(u32, u32)> {
        match driver.page_indicator().await {
            Ok(Some(text)) => parse_indicator(&text),
            Ok(None) => None,
            Err(e) => {
                debug!("Page indicator unavailable: {}", e);
                None
            }
        }
    }

    /// Capture every page of an already loaded viewer.
    ///
    /// Never visits more than `max_pages` pages or takes more than
    /// `max_scrolls_per_page` captures of one page. Stops at `deadline` and
    /// keeps what was captured. A page that fails is recorded and skipped;
    /// the run only fails when nothing was captured at all.
    pub async fn run(
        &self,
        driver: &dyn PageDriver,
        artifacts: &ArtifactDir,
        deadline: Instant,
    ) -> Result<CaptureReport, TierError> {
        settle(self.config.initial_settle(), deadline).await;

        if let Err(e) = driver.suppress_ui(&self.config.ui_selectors, self.config.zoom).await {
            warn!("Could not hide viewer UI: {}", e);
        }

        let max_pages = self.config.max_pages.max(1);
        let mut state = PageCaptureState {
            total_pages_estimate: 1,
            ..Default::default()
        };
        match self.indicator(driver).await {
            Some((_, total)) => {
                if total > max_pages {
                    warn!("Viewer reports {} pages, capturing the first {}", total, max_pages);
                }
                state.total_pages_estimate = total.min(max_pages);
            }
            None => debug!("No page indicator, treating document as a single page"),
        }
        let pages = state.total_pages_estimate;
        info!("Capturing {} page(s)", pages);

        let viewport = driver.viewport_height().await?;
        let step = ((viewport as f64 * self.config.scroll_fraction) as u32).max(1);
        let mut report = CaptureReport {
            planned_pages: pages,
            ..Default::default()
        };
        let mut last_error = None;

        for page in 1..=pages {
            if Instant::now() >= deadline {
                warn!("Deadline reached before page {} of {}", page, pages);
                report.truncated = true;
                break;
            }
            state.page_index = page;

            let end = self.capture_page(driver, artifacts, &mut state, pages, step, deadline).await;
            if !state.images.is_empty() {
                report.groups.push(CapturedPage {
                    page,
                    images: std::mem::take(&mut state.images),
                });
            }

            let end = match end {
                Ok(end) => end,
                Err(e) => {
                    warn!("Capture of page {} broke off: {}", page, e);
                    report.page_errors.push((page, e.to_string()));
                    let gone = matches!(e, TierError::Render(RenderError::WorkerGone));
                    last_error = Some(e);
                    if gone {
                        break;
                    }
                    PageEnd::Bottom
                }
            };
            match end {
                PageEnd::Deadline => {
                    warn!("Deadline reached while capturing page {} of {}", page, pages);
                    report.truncated = true;
                    break;
                }
                PageEnd::ScrollCap => warn!("Page {} hit the scroll cap of {}", page, self.config.max_scrolls_per_page),
                PageEnd::Bottom | PageEnd::SpilledIntoNext => {}
            }

            if page < pages && end != PageEnd::SpilledIntoNext {
                if let Err(e) = driver
                    .advance_page(&self.config.next_page_selectors, &self.config.next_page_key)
                    .await
                {
                    warn!("Could not turn to page {}: {}", page + 1, e);
                    report.page_errors.push((page + 1, e.to_string()));
                    last_error = Some(e.into());
                    break;
                }
                settle(self.config.page_turn_settle(), deadline).await;
            }
        }

        if report.groups.is_empty() {
            return Err(last_error.unwrap_or_else(|| TierError::Rejected("deadline reached before the first capture".to_string())));
        }
        Ok(report)
    }

    /// Scroll down one page taking screenshots into `state.images`.
    /// Images written before an error stay in `state.images`.
    async fn capture_page(
        &self,
        driver: &dyn PageDriver,
        artifacts: &ArtifactDir,
        state: &mut PageCaptureState,
        pages: u32,
        step: u32,
        deadline: Instant,
    ) -> Result<PageEnd, TierError> {
        let page = state.page_index;
        driver.scroll_to_top().await?;
        state.scroll_offset = 0;
        state.last_scroll_offset = 0;

        for shot in 1..=self.config.max_scrolls_per_page.max(1) {
            if Instant::now() >= deadline {
                return Ok(PageEnd::Deadline);
            }

            let png = driver.capture().await?;
            let path = artifacts.capture_path(page, shot);
            tokio::fs::write(&path, &png).await?;
            state.images.push(path);

            let offset = driver.scroll_by(step).await?;
            settle(self.config.scroll_settle(), deadline).await;
            state.last_scroll_offset = state.scroll_offset;
            state.scroll_offset = offset;
            if state.scroll_offset == state.last_scroll_offset {
                debug!("Bottom of page {} after {} captures", page, shot);
                return Ok(PageEnd::Bottom);
            }

            if page < pages {
                if let Some((current, _)) = self.indicator(driver).await {
                    if current > page {
                        debug!("Scrolled from page {} into page {}", page, current);
                        return Ok(PageEnd::SpilledIntoNext);
                    }
                }
            }
        }

        Ok(PageEnd::ScrollCap)
    }
}
