use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Headless browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    pub window_width: u32,
    pub window_height: u32,

    /// Extra command-line switches passed to Chrome
    pub launch_args: Vec<String>,

    /// Timeout for a single worker command in seconds (default: 30)
    pub command_timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            launch_args: vec![
                "--no-sandbox".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-software-rasterizer".to_string(),
            ],
            command_timeout_secs: 30,
        }
    }
}

impl BrowserSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Page readiness detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Upper bound on one readiness wait in seconds (default: 60)
    pub max_wait_secs: u64,

    /// Delay between polls in milliseconds (default: 1000)
    pub poll_interval_ms: u64,

    /// Quiet window with no in-flight requests before the network counts as idle (default: 500)
    pub network_quiet_ms: u64,

    /// Consecutive unchanged polls required by the stability strategies (default: 3)
    pub stability_polls: usize,

    /// Visible text length below which a navigation is retried (default: 500)
    pub min_content_length: usize,

    /// Selectors whose presence marks the main content as rendered
    pub key_selectors: Vec<String>,

    /// Navigations per rendered fetch (default: 3)
    pub attempts: u32,

    /// Pause between navigations in milliseconds (default: 2000)
    pub retry_delay_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: 60,
            poll_interval_ms: 1000,
            network_quiet_ms: 500,
            stability_polls: 3,
            min_content_length: 500,
            key_selectors: vec![
                "main".to_string(),
                "article".to_string(),
                "[role=\"main\"]".to_string(),
                "#main".to_string(),
                "#content".to_string(),
                ".content".to_string(),
                ".main-content".to_string(),
            ],
            attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl ReadinessConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn network_quiet(&self) -> Duration {
        Duration::from_millis(self.network_quiet_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Screenshot capture of paginated viewers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Hard cap on pages captured, whatever the indicator reports (default: 10)
    pub max_pages: u32,

    /// Hard cap on captures per page (default: 30)
    pub max_scrolls_per_page: u32,

    /// Scroll step as a fraction of the viewport height (default: 0.4)
    pub scroll_fraction: f64,

    /// Wait after each scroll in milliseconds (default: 400)
    pub scroll_settle_ms: u64,

    /// Wait after a page turn in milliseconds (default: 1500)
    pub page_turn_settle_ms: u64,

    /// Wait after navigation before touching the viewer in milliseconds (default: 2000)
    pub initial_settle_ms: u64,

    /// CSS zoom applied after hiding the viewer chrome (default: 0.9)
    pub zoom: f64,

    /// Viewer chrome hidden before capturing
    pub ui_selectors: Vec<String>,

    /// Controls clicked to advance to the next page, tried in order
    pub next_page_selectors: Vec<String>,

    /// Key pressed when no next-page control exists (default: ArrowDown)
    pub next_page_key: String,

    /// Time kept back from capturing for OCR in seconds, at most half of
    /// what is left when capturing starts (default: 30)
    pub ocr_reserve_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_scrolls_per_page: 30,
            scroll_fraction: 0.4,
            scroll_settle_ms: 400,
            page_turn_settle_ms: 1500,
            initial_settle_ms: 2000,
            zoom: 0.9,
            ui_selectors: vec![
                "[role=\"toolbar\"]".to_string(),
                ".toolbar".to_string(),
                "[class*=\"toolbar\"]".to_string(),
                "[role=\"complementary\"]".to_string(),
                ".sidebar".to_string(),
                "[class*=\"sidebar\"]".to_string(),
                "[class*=\"thumbnail\"]".to_string(),
            ],
            next_page_selectors: vec![
                "button[aria-label*=\"next\"]".to_string(),
                "button[aria-label*=\"Next\"]".to_string(),
                "button[title*=\"下一页\"]".to_string(),
                "button[title*=\"next\"]".to_string(),
                "[class*=\"next-page\"]".to_string(),
                "[id*=\"next-page\"]".to_string(),
            ],
            next_page_key: "ArrowDown".to_string(),
            ocr_reserve_secs: 30,
        }
    }
}

impl CaptureConfig {
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn page_turn_settle(&self) -> Duration {
        Duration::from_millis(self.page_turn_settle_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn ocr_reserve(&self) -> Duration {
        Duration::from_secs(self.ocr_reserve_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_readiness_values() {
        let config = ReadinessConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.stability_polls, 3);
        assert_eq!(config.attempts, 3);
        assert!(config.key_selectors.contains(&"main".to_string()));
    }

    #[test]
    fn test_default_capture_caps() {
        let config = CaptureConfig::default();
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.max_scrolls_per_page, 30);
        assert_eq!(config.next_page_key, "ArrowDown");
    }
}
