use async_trait::async_trait;
use tokio::time::Instant;

use crate::app::error::TierError;
use crate::cache::ArtifactDir;
use crate::domain::{Confidence, FetchRequest, SubAttempt, TierKind};
use crate::fetcher::StaticFetcher;

/// Everything a tier may look at while running
pub struct TierContext<'a> {
    pub request: &'a FetchRequest,
    pub artifacts: &'a ArtifactDir,
    /// When the tier should stop working and return what it has. The
    /// orchestrator cancels the tier a short grace period later.
    pub deadline: Instant,
}

/// What one tier produced
#[derive(Debug)]
pub struct TierOutput {
    pub result: Result<String, TierError>,
    /// Text worth keeping even though the tier failed
    pub partial: Option<String>,
    pub details: Vec<SubAttempt>,
    /// Overrides the tier's rank-based confidence when lower
    pub confidence: Option<Confidence>,
    /// The tier stopped early because its deadline ran out
    pub deadline_hit: bool,
}

impl TierOutput {
    pub fn with_partial(mut self, partial: Option<String>) -> Self {
        self.partial = partial.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_details(mut self, details: Vec<SubAttempt>) -> Self {
        self.details = details;
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_deadline_hit(mut self, hit: bool) -> Self {
        self.deadline_hit = hit;
        self
    }
}

impl From<Result<String, TierError>> for TierOutput {
    fn from(result: Result<String, TierError>) -> Self {
        Self {
            result,
            partial: None,
            details: Vec::new(),
            confidence: None,
            deadline_hit: false,
        }
    }
}

/// One strategy in the fallback chain
#[async_trait]
pub trait Tier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Run the tier once. Never panics or returns early with an error;
    /// failures are carried in the output.
    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutput;
}

#[async_trait]
impl Tier for StaticFetcher {
    fn kind(&self) -> TierKind {
        TierKind::Static
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutput {
        self.fetch(ctx.request, ctx.artifacts, ctx.deadline).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_partial_is_dropped() {
        let output = TierOutput::from(Err(TierError::Rejected("x".to_string())))
            .with_partial(Some("  \n ".to_string()));
        assert!(output.partial.is_none());

        let output = TierOutput::from(Ok("text".to_string())).with_partial(Some("half".to_string()));
        assert_eq!(output.partial.as_deref(), Some("half"));
    }
}
