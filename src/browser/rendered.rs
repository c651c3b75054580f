use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::error::{RenderError, TierError};
use crate::browser::{DriverFactory, PageDriver, Readiness, ReadinessDetector};
use crate::config::ReadinessConfig;
use crate::domain::{TierKind, TypeHint};
use crate::orchestrator::{Tier, TierContext, TierOutput};
use crate::text::char_len;

/// Tier 2: load the page in a fresh browser and read the rendered text
pub struct RenderedFetcher {
    factory: Arc<dyn DriverFactory>,
    detector: ReadinessDetector,
    config: ReadinessConfig,
}

impl RenderedFetcher {
    pub fn new(factory: Arc<dyn DriverFactory>, config: ReadinessConfig) -> Self {
        Self {
            factory,
            detector: ReadinessDetector::new(config.clone()),
            config,
        }
    }

    /// Navigate, wait for readiness and extract, up to `attempts` times.
    ///
    /// Returns the first text of at least `min_content_length` chars, or the
    /// longest text seen once attempts run out.
    pub async fn fetch(&self, url: &Url, deadline: Instant) -> Result<String, TierError> {
        let driver = self.factory.launch().await?;
        let result = self.fetch_with(driver.as_ref(), url, deadline).await;
        driver.close().await;
        result
    }

    async fn fetch_with(&self, driver: &dyn PageDriver, url: &Url, deadline: Instant) -> Result<String, TierError> {
        let attempts = self.config.attempts.max(1);
        let mut best = String::new();
        let mut last_error = None;

        for attempt in 1..=attempts {
            if Instant::now() >= deadline {
                debug!("Render deadline reached before attempt {}", attempt);
                break;
            }

            match self.load_once(driver, url, deadline).await {
                Ok(text) => {
                    let len = char_len(&text);
                    if len >= self.config.min_content_length {
                        info!("Rendered {} chars on attempt {}/{}", len, attempt, attempts);
                        return Ok(text);
                    }
                    debug!(
                        "Attempt {}/{} rendered only {} chars (want {})",
                        attempt, attempts, len, self.config.min_content_length
                    );
                    if len > char_len(&best) {
                        best = text;
                    }
                }
                Err(RenderError::WorkerGone) => {
                    warn!("Browser worker died on attempt {}/{}", attempt, attempts);
                    last_error = Some(RenderError::WorkerGone);
                    break;
                }
                Err(e) => {
                    warn!("Render attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::time::sleep(self.config.retry_delay().min(remaining)).await;
            }
        }

        if !best.trim().is_empty() {
            info!("Accepting degraded render of {} chars", char_len(&best));
            return Ok(best);
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => TierError::Rejected("page rendered no text".to_string()),
        })
    }

    async fn load_once(&self, driver: &dyn PageDriver, url: &Url, deadline: Instant) -> Result<String, RenderError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, driver.navigate(url))
            .await
            .map_err(|_| RenderError::Timeout(format!("navigation to {}", url)))??;

        match self.detector.wait(driver, deadline).await {
            Readiness::Ready(strategy) => debug!("Ready via {}", strategy),
            Readiness::TimedOutDegraded { partial_ok } => {
                debug!("Readiness timed out, partial content: {}", partial_ok)
            }
        }

        driver.extract_text().await
    }
}

#[async_trait]
impl Tier for RenderedFetcher {
    fn kind(&self) -> TierKind {
        TierKind::Rendered
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutput {
        if ctx.artifacts.load_document().is_some() {
            return TierOutput::from(Err(TierError::Rejected("document content".to_string())));
        }
        if ctx.request.effective_hint() == Some(TypeHint::TencentDoc) {
            return TierOutput::from(Err(TierError::Rejected("paginated viewer".to_string())));
        }
        self.fetch(&ctx.request.url, ctx.deadline).await.into()
    }
}
