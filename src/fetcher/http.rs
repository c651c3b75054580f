use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::error::NetworkError;
use crate::config::FetchConfig;
use crate::fetcher::{Download, Fetcher};

/// reqwest-based [`Fetcher`] with bounded retries and exponential backoff
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_once(&self, url: &Url, timeout: std::time::Duration) -> Result<Download, NetworkError> {
        let mut response = self.client.get(url.clone()).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.config.max_bytes {
                return Err(NetworkError::Body(format!(
                    "response too large: {} > {} bytes",
                    len, self.config.max_bytes
                )));
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() as u64 + chunk.len() as u64 > self.config.max_bytes {
                return Err(NetworkError::Body(format!(
                    "response exceeded {} bytes",
                    self.config.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(Download {
            url: final_url,
            content_type,
            bytes,
        })
    }
}

/// Client errors that will not change on retry
fn is_permanent(err: &NetworkError) -> bool {
    match err {
        NetworkError::Status { status, .. } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            status.is_client_error()
                && status != StatusCode::REQUEST_TIMEOUT
                && status != StatusCode::TOO_MANY_REQUESTS
        }
        NetworkError::InvalidUrl(_) => true,
        _ => false,
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url, attempts: u32, deadline: Instant) -> Result<Download, NetworkError> {
        let attempts = attempts.max(1);
        let mut last_error = NetworkError::Timeout(format!("no time left to fetch {}", url));

        for attempt in 1..=attempts {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            debug!("GET {} (attempt {}/{})", url, attempt, attempts);
            let timeout = remaining.min(self.config.request_timeout());
            match self.get_once(url, timeout).await {
                Ok(download) => {
                    info!(
                        "Downloaded {} bytes from {} ({})",
                        download.bytes.len(),
                        download.url,
                        download.content_type.as_deref().unwrap_or("unknown type")
                    );
                    return Ok(download);
                }
                Err(e) => {
                    warn!("Download failed (attempt {}/{}): {}", attempt, attempts, e);
                    let permanent = is_permanent(&e);
                    last_error = e;
                    if permanent {
                        break;
                    }
                }
            }

            if attempt < attempts {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let delay = self.config.backoff(attempt).min(remaining);
                debug!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_errors() {
        let not_found = NetworkError::Status {
            status: 404,
            url: String::new(),
        };
        let throttled = NetworkError::Status {
            status: 429,
            url: String::new(),
        };
        let unavailable = NetworkError::Status {
            status: 503,
            url: String::new(),
        };
        assert!(is_permanent(&not_found));
        assert!(!is_permanent(&throttled));
        assert!(!is_permanent(&unavailable));
        assert!(!is_permanent(&NetworkError::Connect("refused".into())));
    }

    #[test]
    fn test_client_builds_with_defaults() {
        assert!(HttpFetcher::new(FetchConfig::default()).is_ok());
    }
}
