use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text recognition and image preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract executable, looked up in PATH unless absolute
    pub tesseract_bin: String,

    /// Language packs joined with `+` on the command line
    pub languages: Vec<String>,

    /// OCR engine mode (default: 3, LSTM with legacy fallback)
    pub oem: u8,

    /// Page segmentation mode (default: 3, fully automatic)
    pub psm: u8,

    /// Timeout for recognizing one image in seconds (default: 60)
    pub timeout_secs: u64,

    pub contrast: f32,
    pub brightness: f32,
    pub sharpness: f32,

    /// Adaptive-threshold binarization, only honored when built with the `binarize` feature
    pub binarize: bool,

    /// Neighbourhood radius for adaptive thresholding (default: 5, an 11px block)
    pub threshold_radius: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: "tesseract".to_string(),
            languages: vec!["eng".to_string(), "chi_sim".to_string()],
            oem: 3,
            psm: 3,
            timeout_secs: 60,
            contrast: 2.0,
            brightness: 1.1,
            sharpness: 1.5,
            binarize: true,
            threshold_radius: 5,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Language argument in Tesseract's `eng+chi_sim` form
    pub fn language_arg(&self) -> String {
        self.languages.join("+")
    }
}

/// Post-OCR line filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Viewer UI labels; any line containing one as a whole word is dropped
    pub ui_blacklist: Vec<String>,

    /// Lines this short or shorter are dropped unless they carry a keep keyword (default: 5)
    pub min_line_length: usize,

    /// Keywords that keep a short line
    pub keep_keywords: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        let blacklist = [
            "view only",
            "scroll",
            "rotate",
            "edit",
            "split",
            "merge",
            "extract text",
            "pdf to word",
            "pdf to image",
            "ai podcast",
            "all translate",
            "adjust page",
            "file compress",
            "shortcut tools",
            "print",
            "thumbnail",
            "outline",
            "zoom in",
            "zoom out",
            "next page",
            "previous page",
            "download",
            "share",
            "annotation",
            "highlight",
            "comment",
            "save",
            "export",
            "upload",
        ];
        let keep = [
            "phd",
            "university",
            "email",
            "deadline",
            "position",
            "research",
            "doctor",
        ];
        Self {
            ui_blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
            min_line_length: 5,
            keep_keywords: keep.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Acceptance thresholds for OCR output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Text must be strictly longer than this (default: 50)
    pub min_length: usize,

    /// Alphabetic share of non-whitespace characters must exceed this (default: 0.3)
    pub min_alpha_ratio: f64,

    /// Distinct relevance keywords that must appear (default: 1)
    pub min_keyword_hits: usize,

    pub keywords: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        let keywords = [
            "phd",
            "university",
            "position",
            "research",
            "student",
            "application",
            "deadline",
            "email",
            "contact",
            "degree",
            "master",
            "doctoral",
        ];
        Self {
            min_length: 50,
            min_alpha_ratio: 0.3,
            min_keyword_hits: 1,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        }
    }
}
