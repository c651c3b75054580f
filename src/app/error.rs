use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors raised while constructing the engine or running the binary.
///
/// Per-request failures never surface here; they are classified by the tier
/// that hit them and recorded in the attempt trail.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Static page or document download failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return NetworkError::Timeout(err.to_string());
        }
        if let Some(status) = err.status() {
            return NetworkError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_body() || err.is_decode() {
            return NetworkError::Body(err.to_string());
        }
        NetworkError::Connect(err.to_string())
    }
}

/// Browser worker failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}. Is Chrome or Chromium installed and in PATH?")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("Screenshot failed: {0}")]
    Capture(String),

    #[error("Browser command timed out: {0}")]
    Timeout(String),

    #[error("Browser worker is gone")]
    WorkerGone,
}

/// Document parser failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Document is encrypted or protected")]
    Protected,

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("No text extracted")]
    Empty,

    #[error("Extracted text rejected: {0}")]
    Invalid(String),
}

/// Text recognition failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR language data missing: {0}")]
    MissingLanguage(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Image processing failed: {0}")]
    Image(String),
}

/// Why a single tier did not produce acceptable text.
///
/// Always recorded as a failed attempt, never returned from `acquire`.
#[derive(Error, Debug)]
pub enum TierError {
    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("render: {0}")]
    Render(#[from] RenderError),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("ocr: {0}")]
    Ocr(#[from] OcrError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
