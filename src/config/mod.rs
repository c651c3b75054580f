//! Engine configuration.
//!
//! Configuration is read from `~/.config/textgrab/config.toml` (or an explicit
//! path). If the default file doesn't exist, one with comments is created.
//! The loaded value is immutable and handed to the engine at construction.

pub mod browser;
pub mod fetch;
pub mod ocr;

pub use browser::{BrowserSettings, CaptureConfig, ReadinessConfig};
pub use fetch::{FetchConfig, TierConfig};
pub use ocr::{CleanerConfig, OcrConfig, QualityConfig};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub tiers: TierConfig,
    pub readiness: ReadinessConfig,
    pub browser: BrowserSettings,
    pub capture: CaptureConfig,
    pub ocr: OcrConfig,
    pub cleaner: CleanerConfig,
    pub quality: QualityConfig,
    pub cache: CacheConfig,
}

/// Scratch area for downloaded documents and screenshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory; the system cache dir is used when unset
    pub root: Option<PathBuf>,

    /// Keep per-request artifacts after the request finishes (default: false)
    pub retain_artifacts: bool,
}

impl CacheConfig {
    /// Resolved cache root: `~/.cache/textgrab` or the temp dir as a last resort
    pub fn root_dir(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("textgrab"),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/textgrab/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("textgrab").join("config.toml"))
    }

    /// Write the commented default config file, creating parent directories.
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.fetch.request_timeout_secs == 0 {
            return invalid("fetch.request_timeout_secs must be greater than zero");
        }
        if self.fetch.min_text_length == 0 {
            return invalid("fetch.min_text_length must be greater than zero");
        }
        let tiers = &self.tiers;
        if [
            tiers.static_timeout_secs,
            tiers.rendered_timeout_secs,
            tiers.document_timeout_secs,
            tiers.screenshot_timeout_secs,
            tiers.global_deadline_secs,
        ]
        .contains(&0)
        {
            return invalid("tier timeouts and the global deadline must be greater than zero");
        }
        if self.readiness.poll_interval_ms == 0 {
            return invalid("readiness.poll_interval_ms must be greater than zero");
        }
        if self.readiness.max_wait_secs == 0 {
            return invalid("readiness.max_wait_secs must be greater than zero");
        }
        if self.readiness.stability_polls == 0 {
            return invalid("readiness.stability_polls must be at least 1");
        }
        if self.readiness.attempts == 0 {
            return invalid("readiness.attempts must be at least 1");
        }
        if self.browser.command_timeout_secs == 0 {
            return invalid("browser.command_timeout_secs must be greater than zero");
        }
        if self.capture.max_pages == 0 {
            return invalid("capture.max_pages must be at least 1");
        }
        if self.capture.max_scrolls_per_page == 0 {
            return invalid("capture.max_scrolls_per_page must be at least 1");
        }
        if !(self.capture.scroll_fraction > 0.0 && self.capture.scroll_fraction <= 1.0) {
            return invalid("capture.scroll_fraction must be in (0, 1]");
        }
        if !(self.capture.zoom > 0.0 && self.capture.zoom <= 1.0) {
            return invalid("capture.zoom must be in (0, 1]");
        }
        if self.ocr.languages.iter().all(|l| l.trim().is_empty()) {
            return invalid("ocr.languages must name at least one language");
        }
        if self.ocr.timeout_secs == 0 {
            return invalid("ocr.timeout_secs must be greater than zero");
        }
        if [self.ocr.contrast, self.ocr.brightness, self.ocr.sharpness]
            .iter()
            .any(|f| !f.is_finite() || *f <= 0.0)
        {
            return invalid("ocr enhancement factors must be positive");
        }
        if !(0.0..=1.0).contains(&self.quality.min_alpha_ratio) {
            return invalid("quality.min_alpha_ratio must be between 0 and 1");
        }

        Ok(())
    }

    /// Create a config optimized for speed (less thorough)
    pub fn fast() -> Self {
        let mut config = Self::default();
        config.tiers.static_timeout_secs = 20;
        config.tiers.rendered_timeout_secs = 60;
        config.tiers.document_timeout_secs = 60;
        config.tiers.screenshot_timeout_secs = 120;
        config.tiers.global_deadline_secs = 240;
        config.readiness.max_wait_secs = 20;
        config.readiness.attempts = 1;
        config.capture.max_pages = 3;
        config
    }

    /// Create a config optimized for coverage (slower)
    pub fn thorough() -> Self {
        let mut config = Self::default();
        config.tiers.rendered_timeout_secs = 400;
        config.tiers.screenshot_timeout_secs = 600;
        config.tiers.global_deadline_secs = 1200;
        config.readiness.max_wait_secs = 120;
        config.capture.max_pages = 20;
        config.capture.max_scrolls_per_page = 50;
        config
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# textgrab configuration
#
# Durations are in seconds (*_secs) or milliseconds (*_ms).

[fetch]
user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
request_timeout_secs = 30
# Retry delay starts here and doubles on every attempt
backoff_base_ms = 1000
# A tier must produce at least this many characters to succeed
min_text_length = 100
max_bytes = 52428800

[tiers]
static_timeout_secs = 60
rendered_timeout_secs = 240
document_timeout_secs = 120
screenshot_timeout_secs = 300
# Budget for a whole request; every tier is cut short when it runs out
global_deadline_secs = 600
# Seconds a tier gets past its deadline to return partial text
grace_secs = 5

[readiness]
max_wait_secs = 60
poll_interval_ms = 1000
network_quiet_ms = 500
stability_polls = 3
min_content_length = 500
attempts = 3
retry_delay_ms = 2000
key_selectors = [
    "main",
    "article",
    '[role="main"]',
    "#main",
    "#content",
    ".content",
    ".main-content",
]

[browser]
headless = true
window_width = 1920
window_height = 1080
command_timeout_secs = 30
launch_args = [
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-software-rasterizer",
]

[capture]
# Never capture more pages than this, whatever the viewer reports
max_pages = 10
max_scrolls_per_page = 30
scroll_fraction = 0.4
scroll_settle_ms = 400
page_turn_settle_ms = 1500
initial_settle_ms = 2000
zoom = 0.9
next_page_key = "ArrowDown"
# Seconds kept back from capturing so the pages already taken can be read
ocr_reserve_secs = 30
ui_selectors = [
    '[role="toolbar"]',
    ".toolbar",
    '[class*="toolbar"]',
    '[role="complementary"]',
    ".sidebar",
    '[class*="sidebar"]',
    '[class*="thumbnail"]',
]
next_page_selectors = [
    'button[aria-label*="next"]',
    'button[aria-label*="Next"]',
    'button[title*="下一页"]',
    'button[title*="next"]',
    '[class*="next-page"]',
    '[id*="next-page"]',
]

[ocr]
tesseract_bin = "tesseract"
languages = ["eng", "chi_sim"]
oem = 3
psm = 3
timeout_secs = 60
contrast = 2.0
brightness = 1.1
sharpness = 1.5
# Requires a build with the `binarize` feature; skipped otherwise
binarize = true
threshold_radius = 5

[cleaner]
min_line_length = 5
keep_keywords = ["phd", "university", "email", "deadline", "position", "research", "doctor"]
ui_blacklist = [
    "view only", "scroll", "rotate", "edit", "split", "merge", "extract text",
    "pdf to word", "pdf to image", "ai podcast", "all translate", "adjust page",
    "file compress", "shortcut tools", "print", "thumbnail", "outline",
    "zoom in", "zoom out", "next page", "previous page", "download", "share",
    "annotation", "highlight", "comment", "save", "export", "upload",
]

[quality]
min_length = 50
min_alpha_ratio = 0.3
min_keyword_hits = 1
keywords = [
    "phd", "university", "position", "research", "student", "application",
    "deadline", "email", "contact", "degree", "master", "doctoral",
]

[cache]
# root = "/var/cache/textgrab"
retain_artifacts = false
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
