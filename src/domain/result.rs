use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One strategy in the fallback chain. Declaration order is escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Static,
    Rendered,
    Document,
    ScreenshotOcr,
}

impl TierKind {
    pub const ALL: [TierKind; 4] = [
        TierKind::Static,
        TierKind::Rendered,
        TierKind::Document,
        TierKind::ScreenshotOcr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Rendered => "rendered",
            Self::Document => "document",
            Self::ScreenshotOcr => "screenshot_ocr",
        }
    }

    /// Confidence implied by the tier's rank in the chain
    pub fn base_confidence(&self) -> Confidence {
        match self {
            Self::Static | Self::Rendered => Confidence::High,
            // OCR is capped at Medium regardless of its own quality verdict
            Self::Document | Self::ScreenshotOcr => Confidence::Medium,
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse trust label attached to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of one step nested inside a tier, e.g. a single document parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAttempt {
    pub name: String,
    pub outcome: Outcome,
}

impl SubAttempt {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Success,
        }
    }

    pub fn failure(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failure(reason.into()),
        }
    }
}

/// Audit record for one tier tried during a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: TierKind,
    pub started_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub extracted_text: Option<String>,
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<SubAttempt>,
}

impl TierAttempt {
    pub fn tier_name(&self) -> &'static str {
        self.tier.name()
    }
}

/// Final result of an acquisition. Owned by the caller once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub request_id: String,
    pub url: String,
    pub text: String,
    pub source_tier: Option<TierKind>,
    pub confidence: Confidence,
    pub attempts: Vec<TierAttempt>,
    pub elapsed: Duration,
    pub deadline_hit: bool,
}

impl FetchResult {
    /// Whether a tier cleared the minimum bar
    pub fn is_success(&self) -> bool {
        self.attempts.iter().any(|a| a.outcome.is_success())
    }

    /// Tiers in the order they were tried
    pub fn tiers_tried(&self) -> Vec<TierKind> {
        self.attempts.iter().map(|a| a.tier).collect()
    }
}
