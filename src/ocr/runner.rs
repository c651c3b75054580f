use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::app::error::OcrError;
use crate::config::OcrConfig;

/// Text recognition over a single image file
#[async_trait]
pub trait OcrRunner: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}

/// Runs the `tesseract` binary as a child process
#[derive(Debug, Clone)]
pub struct TesseractRunner {
    config: OcrConfig,
}

impl TesseractRunner {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Fail unless every configured language has installed data
    pub async fn check_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = Command::new(&self.config.tesseract_bin)
            .arg("--list-langs")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.config.tesseract_bin, e)))?;

        // Older releases print the list on stderr
        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        let installed = parse_language_list(&listing);

        let missing: Vec<&str> = self
            .config
            .languages
            .iter()
            .filter(|lang| !installed.iter().any(|i| i == *lang))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(OcrError::MissingLanguage(missing.join(", ")));
        }

        info!("Tesseract languages available: {}", self.config.language_arg());
        Ok(installed)
    }
}

/// Language codes from `tesseract --list-langs`, skipping the header line
pub fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(' ') && !l.ends_with(':'))
        .map(String::from)
        .collect()
}

#[async_trait]
impl OcrRunner for TesseractRunner {
    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let mut command = Command::new(&self.config.tesseract_bin);
        command
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(self.config.language_arg())
            .arg("--oem")
            .arg(self.config.oem.to_string())
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout(), command.output())
            .await
            .map_err(|_| OcrError::Recognition(format!("timed out on {}", image.display())))?
            .map_err(|e| OcrError::Unavailable(format!("{}: {}", self.config.tesseract_bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Failed loading language") || stderr.contains("Error opening data file") {
                return Err(OcrError::MissingLanguage(stderr.trim().to_string()));
            }
            return Err(OcrError::Recognition(format!(
                "{} exited with {}: {}",
                self.config.tesseract_bin,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Recognized {} chars from {}", text.chars().count(), image.display());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language_list() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\nchi_sim\neng\nosd\n";
        assert_eq!(parse_language_list(listing), vec!["chi_sim", "eng", "osd"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let runner = TesseractRunner::new(OcrConfig {
            tesseract_bin: "/nonexistent/tesseract-binary".to_string(),
            ..Default::default()
        });

        let err = runner.recognize(Path::new("page1_1.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));

        let err = runner.check_languages().await.unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }
}
