use serde::Serialize;

use crate::config::QualityConfig;
use crate::domain::Confidence;
use crate::text;

/// Measurements behind the gate's verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrQualityMetrics {
    pub char_length: usize,
    pub keyword_hits: usize,
    pub alpha_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityVerdict {
    pub metrics: OcrQualityMetrics,
    pub passed: bool,
}

impl QualityVerdict {
    pub fn confidence(&self) -> Confidence {
        if self.passed {
            Confidence::High
        } else {
            Confidence::Low
        }
    }
}

/// Flags OCR output that is too short, too symbolic or off-topic
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityConfig,
    keywords: Vec<String>,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Self {
        let keywords = config.keywords.iter().map(|k| k.to_lowercase()).collect();
        Self { config, keywords }
    }

    pub fn measure(&self, text: &str) -> OcrQualityMetrics {
        let lower = text.to_lowercase();
        OcrQualityMetrics {
            char_length: text::char_len(text.trim()),
            keyword_hits: self.keywords.iter().filter(|k| lower.contains(k.as_str())).count(),
            alpha_ratio: text::alpha_ratio(text),
        }
    }

    pub fn evaluate(&self, text: &str) -> QualityVerdict {
        let metrics = self.measure(text);
        let passed = metrics.char_length > self.config.min_length
            && metrics.alpha_ratio > self.config.min_alpha_ratio
            && metrics.keyword_hits >= self.config.min_keyword_hits;
        QualityVerdict { metrics, passed }
    }
}
