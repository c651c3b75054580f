use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::TierKind;

/// HTTP settings shared by the static and document downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User agent sent with every request and set on browser pages
    pub user_agent: String,

    /// Timeout for a single HTTP request in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// Base delay before the first retry in milliseconds, doubled each attempt (default: 1000)
    pub backoff_base_ms: u64,

    /// Minimum characters a tier must produce to count as success (default: 100)
    pub min_text_length: usize,

    /// Largest response body accepted, in bytes (default: 50 MiB)
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout_secs: 30,
            backoff_base_ms: 1000,
            min_text_length: 100,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Per-tier time budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub static_timeout_secs: u64,
    pub rendered_timeout_secs: u64,
    pub document_timeout_secs: u64,
    pub screenshot_timeout_secs: u64,

    /// Default wall-clock budget for a whole request (default: 600)
    pub global_deadline_secs: u64,

    /// Time a tier keeps after its own deadline to hand back what it has,
    /// before it is cancelled (default: 5, at most a quarter of the budget)
    pub grace_secs: u64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            static_timeout_secs: 60,
            rendered_timeout_secs: 240,
            document_timeout_secs: 120,
            screenshot_timeout_secs: 300,
            global_deadline_secs: 600,
            grace_secs: 5,
        }
    }
}

impl TierConfig {
    pub fn timeout_for(&self, tier: TierKind) -> Duration {
        let secs = match tier {
            TierKind::Static => self.static_timeout_secs,
            TierKind::Rendered => self.rendered_timeout_secs,
            TierKind::Document => self.document_timeout_secs,
            TierKind::ScreenshotOcr => self.screenshot_timeout_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn global_deadline(&self) -> Duration {
        Duration::from_secs(self.global_deadline_secs)
    }

    /// Share of `budget` reserved for winding down after the tier's deadline
    pub fn grace_for(&self, budget: Duration) -> Duration {
        Duration::from_secs(self.grace_secs).min(budget / 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let config = FetchConfig::default();
        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_for_each_tier() {
        let config = TierConfig::default();
        assert_eq!(config.timeout_for(TierKind::Static), Duration::from_secs(60));
        assert_eq!(config.timeout_for(TierKind::ScreenshotOcr), Duration::from_secs(300));
        assert_eq!(config.global_deadline(), Duration::from_secs(600));
    }

    #[test]
    fn test_grace_is_capped_by_budget() {
        let config = TierConfig::default();
        assert_eq!(config.grace_for(Duration::from_secs(240)), Duration::from_secs(5));
        assert_eq!(config.grace_for(Duration::from_secs(8)), Duration::from_secs(2));
        assert_eq!(config.grace_for(Duration::ZERO), Duration::ZERO);
    }
}
