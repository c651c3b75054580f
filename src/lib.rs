//! # Textgrab
//!
//! Plain-text acquisition for arbitrary URLs: static pages, JavaScript
//! applications, PDFs behind download links and document viewers that can
//! only be read as images.
//!
//! ## Architecture
//!
//! A request escalates through four tiers until one clears the minimum bar:
//!
//! ```text
//! Static → Rendered → Document → ScreenshotOcr
//!   │         │           │            │
//! reqwest  chromium    lopdf /      capture → preprocess
//!  + html  + readiness  pdf-extract  → tesseract → clean → gate
//! ```
//!
//! - [`fetcher`]: HTTP client, charset decoding and HTML text extraction
//! - [`browser`]: Headless Chromium worker and the readiness detector
//! - [`document`]: PDF download and the parser chain
//! - [`ocr`]: Screenshot capture and OCR pipeline
//! - [`orchestrator`]: Deadline-aware tier escalation
//!
//! ## Quick Start
//!
//! ```bash
//! # Print the text of a page
//! textgrab fetch https://example.com/jobs/123
//!
//! # Force the document route and show the attempt trail
//! textgrab fetch https://drive.google.com/file/d/abc/view --hint google-drive --json
//!
//! # Verify the configuration and Tesseract language data
//! textgrab check
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Engine wiring and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: TOML configuration with presets
//! - [`domain`]: Requests, results and the attempt trail

/// Engine wiring and error handling.
///
/// The [`Engine`](app::Engine) builds every tier from one
/// [`Config`](config::Config) and hands requests to the orchestrator.
pub mod app;

/// Headless browser control.
///
/// - [`ChromeFactory`](browser::ChromeFactory): one Chromium per render
/// - [`ReadinessDetector`](browser::ReadinessDetector): decides when a page is done
/// - [`RenderedFetcher`](browser::RenderedFetcher): the rendered tier
pub mod browser;

/// Per-request artifact directories for downloads and screenshots.
pub mod cache;

/// Command-line interface using clap.
///
/// - `fetch <url> [--hint] [--deadline-secs] [--json]` - Acquire text
/// - `check` - Validate config and OCR languages
/// - `init-config` - Write the default config file
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/textgrab/config.toml` with `fast` and `thorough` presets.
pub mod config;

/// PDF download and text extraction.
pub mod document;

/// Core domain models.
///
/// - [`FetchRequest`](domain::FetchRequest): URL, hint and deadline
/// - [`FetchResult`](domain::FetchResult): text, confidence and attempt trail
/// - [`TierKind`](domain::TierKind): the four strategies in escalation order
pub mod domain;

/// Static HTTP fetching and HTML text extraction.
pub mod fetcher;

/// Screenshot OCR for viewers that expose no text.
pub mod ocr;

/// Tier escalation under per-tier and global deadlines.
pub mod orchestrator;

/// Text normalization and quality helpers shared by the tiers.
pub mod text;
