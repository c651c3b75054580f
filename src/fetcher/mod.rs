//! Plain HTTP retrieval (tier 1) and the downloads shared with the document tier.

pub mod html;
pub mod http;
pub mod routing;

pub use http::HttpFetcher;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::app::error::{NetworkError, TierError};
use crate::cache::ArtifactDir;
use crate::domain::{FetchRequest, TypeHint};

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct Download {
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Download {
    /// Whether the body is a PDF, by header or by magic bytes
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
            || self.bytes.starts_with(b"%PDF")
    }

    pub fn is_html(&self) -> bool {
        html::is_html(self.content_type.as_deref(), &self.bytes)
    }

    pub fn text(&self) -> String {
        html::decode_body(&self.bytes, self.content_type.as_deref())
    }
}

/// Byte retrieval with retries, bounded by a deadline
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url, attempts: u32, deadline: Instant) -> Result<Download, NetworkError>;
}

/// GET `url`, following Drive's virus-scan interstitial once when it shows up
pub async fn download_following_interstitial(
    fetcher: &dyn Fetcher,
    url: &Url,
    hint: Option<TypeHint>,
    attempts: u32,
    deadline: Instant,
) -> Result<Download, NetworkError> {
    let download = fetcher.get(url, attempts, deadline).await?;
    if hint != Some(TypeHint::GoogleDrive) || download.is_pdf() || !download.is_html() {
        return Ok(download);
    }

    match routing::drive_confirm_link(&download.text(), &download.url) {
        Some(confirm) => {
            info!("Following Drive download confirmation: {}", confirm);
            fetcher.get(&confirm, attempts, deadline).await
        }
        None => Ok(download),
    }
}

/// Tier 1: GET the page and turn the body into text
pub struct StaticFetcher {
    fetcher: Arc<dyn Fetcher>,
}

impl StaticFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch and extract text.
    ///
    /// Document bodies are stored in `artifacts` for the document tier and
    /// reported as a failure.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        artifacts: &ArtifactDir,
        deadline: Instant,
    ) -> Result<String, TierError> {
        let hint = request.effective_hint();
        let target = routing::static_target(&request.url, hint);
        if target != request.url {
            debug!("Rewrote {} to {}", request.url, target);
        }

        let download = download_following_interstitial(
            self.fetcher.as_ref(),
            &target,
            hint,
            request.attempt_budget,
            deadline,
        )
        .await?;

        if download.is_pdf() {
            artifacts.store_document(&download.bytes)?;
            info!("Static fetch returned a PDF ({} bytes), deferring to the document tier", download.bytes.len());
            return Err(TierError::Rejected("document content".to_string()));
        }

        let text = if download.is_html() {
            html::extract_text(&download.text())
        } else {
            let is_text = download
                .content_type
                .as_deref()
                .map_or(true, |ct| ct.to_ascii_lowercase().starts_with("text/"));
            if !is_text {
                return Err(TierError::Rejected(format!(
                    "unsupported content type: {}",
                    download.content_type.as_deref().unwrap_or("unknown")
                )));
            }
            crate::text::normalize_whitespace(&download.text())
        };

        debug!("Static fetch extracted {} chars", crate::text::char_len(&text));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download(content_type: Option<&str>, bytes: &[u8]) -> Download {
        Download {
            url: Url::parse("https://example.com/x").unwrap(),
            content_type: content_type.map(String::from),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_pdf_detection() {
        assert!(download(Some("application/pdf"), b"").is_pdf());
        assert!(download(Some("application/octet-stream"), b"%PDF-1.5 ...").is_pdf());
        assert!(!download(Some("text/html"), b"<html></html>").is_pdf());
    }

    #[test]
    fn test_text_decodes_with_charset() {
        let d = download(Some("text/plain; charset=utf-8"), "naïve".as_bytes());
        assert_eq!(d.text(), "naïve");
    }
}
