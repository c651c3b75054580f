//! Browser automation behind a narrow command contract.
//!
//! The rendered and screenshot tiers only talk to a [`PageDriver`]. The
//! Chrome implementation runs in its own worker task and is reached over a
//! channel, so a hung or crashed browser surfaces as a [`RenderError`]
//! instead of taking the orchestrator down with it.
//!
//! ```text
//! RenderedFetcher / PageCapture → PageDriver → command channel → BrowserWorker → Chrome
//! ```

pub mod readiness;
pub mod rendered;
pub mod scripts;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use readiness::{Readiness, ReadinessDetector, ReadinessSignal, Strategy};
pub use rendered::RenderedFetcher;
pub use worker::ChromeFactory;

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::app::error::RenderError;

/// One sample of page state taken by the readiness loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageProbe {
    /// Requests sent but not yet finished or failed
    pub in_flight: usize,
    /// Time since the last request started or ended
    pub idle_for: Duration,
    /// Whether any key selector matched a node with visible text
    pub key_element_found: bool,
    /// Length of the main content's visible text
    pub text_len: usize,
    /// Document scroll height in pixels
    pub height: u64,
}

/// Operations on a single live page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for the navigation to commit
    async fn navigate(&self, url: &Url) -> Result<(), RenderError>;

    async fn probe(&self, key_selectors: &[String]) -> Result<PageProbe, RenderError>;

    /// Visible text of the main content with page chrome removed
    async fn extract_text(&self) -> Result<String, RenderError>;

    /// Hide viewer chrome and zoom out
    async fn suppress_ui(&self, selectors: &[String], zoom: f64) -> Result<(), RenderError>;

    /// Raw text of the viewer's page indicator, e.g. `"1 / 3"`
    async fn page_indicator(&self) -> Result<Option<String>, RenderError>;

    async fn scroll_to_top(&self) -> Result<(), RenderError>;

    /// Scroll down by `dy` pixels and return the resulting offset
    async fn scroll_by(&self, dy: u32) -> Result<u64, RenderError>;

    async fn viewport_height(&self) -> Result<u32, RenderError>;

    /// PNG screenshot of the current viewport
    async fn capture(&self) -> Result<Vec<u8>, RenderError>;

    /// Click the first matching next-page control, or press `fallback_key`
    async fn advance_page(&self, selectors: &[String], fallback_key: &str) -> Result<(), RenderError>;

    /// Shut the session down. Safe to call more than once.
    async fn close(&self);
}

/// Starts an isolated browser session per request
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, RenderError>;
}
