use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Content-type routing hint supplied by the caller or detected from the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeHint {
    Html,
    Pdf,
    GoogleDrive,
    GoogleDocs,
    TencentDoc,
}

impl TypeHint {
    /// Detect a hint from well-known URL shapes
    pub fn detect(url: &Url) -> Option<Self> {
        let host = url.host_str().unwrap_or("").to_lowercase();
        let path = url.path().to_lowercase();

        if host.contains("docs.google.com") && path.contains("/document/d/") {
            return Some(Self::GoogleDocs);
        }
        if host.contains("drive.google.com") && (path.contains("/file/d/") || path.starts_with("/uc")) {
            return Some(Self::GoogleDrive);
        }
        if host.contains("docs.qq.com") && path.contains("/pdf/") {
            return Some(Self::TencentDoc);
        }
        if path.contains(".pdf") {
            return Some(Self::Pdf);
        }
        None
    }

    /// Whether the target is expected to be a downloadable document rather than a page
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Pdf | Self::GoogleDrive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::GoogleDrive => "google-drive",
            Self::GoogleDocs => "google-docs",
            Self::TencentDoc => "tencent-doc",
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "web" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            "google-drive" | "gdrive" => Ok(Self::GoogleDrive),
            "google-docs" | "gdocs" => Ok(Self::GoogleDocs),
            "tencent-doc" | "tencent" => Ok(Self::TencentDoc),
            other => Err(format!(
                "Unknown type hint: {}. Use pdf, google-drive, google-docs, tencent-doc or html",
                other
            )),
        }
    }
}

/// A single acquisition request. Immutable for the duration of a call.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub type_hint: Option<TypeHint>,
    /// Maximum network attempts per download
    pub attempt_budget: u32,
    /// Wall-clock budget for the whole request, measured from `acquire`
    pub global_deadline: Duration,
}

impl FetchRequest {
    pub fn new(url: Url, global_deadline: Duration) -> Self {
        Self {
            url,
            type_hint: None,
            attempt_budget: 3,
            global_deadline,
        }
    }

    pub fn with_hint(mut self, hint: TypeHint) -> Self {
        self.type_hint = Some(hint);
        self
    }

    pub fn with_attempt_budget(mut self, attempts: u32) -> Self {
        self.attempt_budget = attempts.max(1);
        self
    }

    /// The explicit hint, or one detected from the URL
    pub fn effective_hint(&self) -> Option<TypeHint> {
        self.type_hint.or_else(|| TypeHint::detect(&self.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint_for(url: &str) -> Option<TypeHint> {
        TypeHint::detect(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_detect_pdf() {
        assert_eq!(hint_for("https://example.com/files/call.pdf"), Some(TypeHint::Pdf));
        assert_eq!(hint_for("https://example.com/files/CALL.PDF?x=1"), Some(TypeHint::Pdf));
    }

    #[test]
    fn test_detect_google_links() {
        assert_eq!(
            hint_for("https://drive.google.com/file/d/abc123/view"),
            Some(TypeHint::GoogleDrive)
        );
        assert_eq!(
            hint_for("https://docs.google.com/document/d/xyz/edit"),
            Some(TypeHint::GoogleDocs)
        );
    }

    #[test]
    fn test_detect_tencent_doc() {
        assert_eq!(
            hint_for("https://docs.qq.com/pdf/DSmVabc"),
            Some(TypeHint::TencentDoc)
        );
    }

    #[test]
    fn test_detect_plain_page() {
        assert_eq!(hint_for("https://example.com/jobs/123"), None);
    }

    #[test]
    fn test_parse_hint() {
        assert_eq!("pdf".parse::<TypeHint>().unwrap(), TypeHint::Pdf);
        assert_eq!("Google-Drive".parse::<TypeHint>().unwrap(), TypeHint::GoogleDrive);
        assert_eq!("tencent-doc".parse::<TypeHint>().unwrap(), TypeHint::TencentDoc);
        assert!("spreadsheet".parse::<TypeHint>().is_err());
    }

    #[test]
    fn test_explicit_hint_wins() {
        let url = Url::parse("https://example.com/report.pdf").unwrap();
        let request = FetchRequest::new(url, Duration::from_secs(60)).with_hint(TypeHint::Html);
        assert_eq!(request.effective_hint(), Some(TypeHint::Html));
    }

    #[test]
    fn test_attempt_budget_never_zero() {
        let url = Url::parse("https://example.com").unwrap();
        let request = FetchRequest::new(url, Duration::from_secs(60)).with_attempt_budget(0);
        assert_eq!(request.attempt_budget, 1);
    }
}
