//! Per-request scratch directories for downloaded documents and screenshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Name of the document bytes stashed by the static tier
const DOCUMENT_FILE: &str = "document.pdf";

/// Generate a request id from the URL, the current time and a process-wide counter.
///
/// Two requests for the same URL issued at the same instant still get distinct ids.
pub fn request_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}

/// Scratch directory owned by a single request.
///
/// Removed when dropped unless retained, so artifacts never outlive the
/// request on any exit path.
#[derive(Debug)]
pub struct ArtifactDir {
    path: PathBuf,
    retain: bool,
}

impl ArtifactDir {
    /// Create `<root>/<request_id>`
    pub fn create(root: &Path, request_id: &str, retain: bool) -> std::io::Result<Self> {
        let path = root.join(request_id);
        fs::create_dir_all(&path)?;
        debug!("Created artifact dir {}", path.display());
        Ok(Self { path, retain })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a screenshot: `page{N}_{K}.png`
    pub fn capture_path(&self, page: u32, index: u32) -> PathBuf {
        self.path.join(format!("page{}_{}.png", page, index))
    }

    pub fn document_path(&self) -> PathBuf {
        self.path.join(DOCUMENT_FILE)
    }

    /// Persist downloaded document bytes for a later tier
    pub fn store_document(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.document_path();
        fs::write(&path, bytes)?;
        debug!("Stored {} document bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Document bytes stored earlier in this request, if any
    pub fn load_document(&self) -> Option<Vec<u8>> {
        fs::read(self.document_path()).ok()
    }

    /// Remove every screenshot while keeping the directory itself
    pub fn clear_captures(&self) {
        if self.retain {
            return;
        }
        let Ok(entries) = fs::read_dir(&self.path) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove capture {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl Drop for ArtifactDir {
    fn drop(&mut self) {
        if self.retain {
            debug!("Retaining artifacts at {}", self.path.display());
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove artifact dir {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_hex() {
        let a = request_id("https://example.com");
        let b = request_id("https://example.com");
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let dir = ArtifactDir::create(root.path(), "abc", false).unwrap();
            dir.store_document(b"%PDF-1.4").unwrap();
            fs::write(dir.capture_path(1, 0), b"png").unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_retained_dir_survives_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let dir = ArtifactDir::create(root.path(), "keep", true).unwrap();
            dir.store_document(b"%PDF-1.4").unwrap();
            dir.path().to_path_buf()
        };
        assert!(path.join("document.pdf").exists());
    }

    #[test]
    fn test_document_roundtrip_and_capture_names() {
        let root = tempfile::tempdir().unwrap();
        let dir = ArtifactDir::create(root.path(), "doc", false).unwrap();
        assert!(dir.load_document().is_none());
        dir.store_document(b"bytes").unwrap();
        assert_eq!(dir.load_document().unwrap(), b"bytes");
        assert!(dir.capture_path(3, 7).ends_with("page3_7.png"));
    }

    #[test]
    fn test_clear_captures_keeps_document() {
        let root = tempfile::tempdir().unwrap();
        let dir = ArtifactDir::create(root.path(), "mixed", false).unwrap();
        dir.store_document(b"bytes").unwrap();
        fs::write(dir.capture_path(1, 0), b"png").unwrap();
        fs::write(dir.capture_path(1, 1), b"png").unwrap();

        dir.clear_captures();

        assert!(!dir.capture_path(1, 0).exists());
        assert!(dir.document_path().exists());
    }
}
