//! Tier 3: text from document bytes through a chain of parsers.

pub mod parsers;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::error::{ParseError, TierError};
use crate::domain::{SubAttempt, TierKind};
use crate::fetcher::{self, routing, Fetcher};
use crate::orchestrator::{Tier, TierContext, TierOutput};
use crate::text;

pub use parsers::{LopdfParser, PdfExtractParser, RawTextParser};

/// One document format parser. Runs on a blocking thread and may panic.
pub trait DocumentParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, bytes: &[u8]) -> Result<String, ParseError>;
}

/// Parsers in priority order
pub fn default_parsers() -> Vec<Arc<dyn DocumentParser>> {
    vec![
        Arc::new(PdfExtractParser),
        Arc::new(LopdfParser),
        Arc::new(RawTextParser),
    ]
}

/// Result of running the parser chain over one document
#[derive(Debug)]
pub struct Extraction {
    pub text: Result<String, ParseError>,
    /// One entry per parser tried, in order
    pub details: Vec<SubAttempt>,
}

pub struct DocumentExtractor {
    fetcher: Arc<dyn Fetcher>,
    parsers: Vec<Arc<dyn DocumentParser>>,
}

impl DocumentExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_parsers(fetcher, default_parsers())
    }

    pub fn with_parsers(fetcher: Arc<dyn Fetcher>, parsers: Vec<Arc<dyn DocumentParser>>) -> Self {
        Self { fetcher, parsers }
    }

    /// Try each parser in order; the first whose normalized output passes
    /// validation wins. Deterministic for the same bytes.
    pub async fn extract(&self, bytes: Arc<Vec<u8>>) -> Extraction {
        let mut details = Vec::with_capacity(self.parsers.len());
        let mut protected = false;
        let mut last_error = ParseError::Empty;

        for parser in &self.parsers {
            let name = parser.name();
            let outcome = run_parser(parser.clone(), bytes.clone())
                .await
                .and_then(|raw| {
                    let cleaned = normalize(&raw);
                    validate(&cleaned).map(|_| cleaned)
                });

            match outcome {
                Ok(text) => {
                    info!("Parser {} extracted {} chars", name, text::char_len(&text));
                    details.push(SubAttempt::success(name));
                    return Extraction { text: Ok(text), details };
                }
                Err(e) => {
                    debug!("Parser {} failed: {}", name, e);
                    protected |= e == ParseError::Protected;
                    details.push(SubAttempt::failure(name, e.to_string()));
                    last_error = e;
                }
            }
        }

        let error = if protected { ParseError::Protected } else { last_error };
        warn!("All {} document parsers failed: {}", self.parsers.len(), error);
        Extraction { text: Err(error), details }
    }

    /// Bytes stored by an earlier tier, or a fresh download for document links
    async fn obtain(&self, ctx: &TierContext<'_>) -> Result<Option<Vec<u8>>, TierError> {
        if let Some(bytes) = ctx.artifacts.load_document() {
            debug!("Reusing {} document bytes from an earlier tier", bytes.len());
            return Ok(Some(bytes));
        }

        let hint = ctx.request.effective_hint();
        let Some(target) = routing::document_target(&ctx.request.url, hint) else {
            return Ok(None);
        };

        let download = fetcher::download_following_interstitial(
            self.fetcher.as_ref(),
            &target,
            hint,
            ctx.request.attempt_budget,
            ctx.deadline,
        )
        .await?;

        if !download.is_pdf() {
            return Err(TierError::Rejected(format!(
                "download is not a document: {}",
                download.content_type.as_deref().unwrap_or("unknown type")
            )));
        }
        ctx.artifacts.store_document(&download.bytes)?;
        Ok(Some(download.bytes))
    }
}

async fn run_parser(parser: Arc<dyn DocumentParser>, bytes: Arc<Vec<u8>>) -> Result<String, ParseError> {
    match tokio::task::spawn_blocking(move || parser.parse(&bytes)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ParseError::Malformed("parser panicked".to_string())),
        Err(e) => Err(ParseError::Malformed(e.to_string())),
    }
}

#[async_trait]
impl Tier for DocumentExtractor {
    fn kind(&self) -> TierKind {
        TierKind::Document
    }

    async fn attempt(&self, ctx: &TierContext<'_>) -> TierOutput {
        let bytes = match self.obtain(ctx).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return TierOutput::from(Err(TierError::Rejected("no document to parse".to_string()))),
            Err(e) => return TierOutput::from(Err(e)),
        };

        let extraction = self.extract(Arc::new(bytes)).await;
        TierOutput::from(extraction.text.map_err(TierError::from)).with_details(extraction.details)
    }
}

const REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{feff}", ""),
    ("\u{00ad}", ""),
    ("\u{00a0}", " "),
    ("\u{fb00}", "ff"),
    ("\u{fb01}", "fi"),
    ("\u{fb02}", "fl"),
    ("\u{fb03}", "ffi"),
    ("\u{fb04}", "ffl"),
    ("\u{2013}", "-"),
    ("\u{2014}", "--"),
    ("\u{201c}", "\""),
    ("\u{201d}", "\""),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{2026}", "..."),
];

fn is_page_artifact(line: &str) -> bool {
    let line = line.trim();
    let number = line.strip_prefix("Page ").unwrap_or(line);
    (!number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
        || line.starts_with("www.")
        || line.starts_with("http://")
        || line.starts_with("https://")
}

/// Clean parser output: character fixes, page furniture, broken lines
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    for (from, to) in REPLACEMENTS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }

    let mut out = String::with_capacity(text.len());
    for line in text.lines().map(str::trim).filter(|l| !is_page_artifact(l)) {
        let Some(prev) = out.chars().last() else {
            out.push_str(line);
            continue;
        };
        let starts_lower = line.chars().next().is_some_and(|c| c.is_lowercase());
        let prev_prev = out.chars().rev().nth(1);

        if prev == '-' && starts_lower && prev_prev.is_some_and(|c| c.is_lowercase()) {
            // Word hyphenated across a line break
            out.pop();
        } else if starts_lower && (prev.is_lowercase() || prev == ',') {
            out.push(' ');
        } else {
            out.push('\n');
        }
        out.push_str(line);
    }

    text::normalize_whitespace(&out)
}

/// Reject parser output that is raw PDF data or garbage
pub fn validate(text: &str) -> Result<(), ParseError> {
    let length = text::char_len(text.trim());
    if length == 0 {
        return Err(ParseError::Empty);
    }
    if length < 50 {
        return Err(ParseError::Invalid(format!("only {} chars", length)));
    }
    if text::looks_like_pdf_garbage(text) {
        return Err(ParseError::Invalid("raw PDF data".to_string()));
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        *counts.entry(c).or_default() += 1;
    }
    let alpha: usize = counts.values().sum();
    if let Some(max) = counts.values().max() {
        if *max as f64 / alpha as f64 > 0.4 {
            return Err(ParseError::Invalid("one character dominates".to_string()));
        }
    }

    let symbol_runs = special_runs(text);
    if symbol_runs as f64 > length as f64 / 200.0 {
        return Err(ParseError::Invalid(format!("{} symbol runs", symbol_runs)));
    }

    let words = text.split_whitespace().count();
    if words < 5 {
        return Err(ParseError::Invalid(format!("only {} words", words)));
    }

    let ratio = text::alpha_ratio(text);
    if ratio < 0.2 {
        return Err(ParseError::Invalid(format!("alphabetic ratio {:.0}%", ratio * 100.0)));
    }
    Ok(())
}

/// Runs of four or more consecutive symbols
fn special_runs(text: &str) -> usize {
    let mut runs = 0;
    let mut current = 0;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            current = 0;
        } else {
            current += 1;
            if current == 4 {
                runs += 1;
            }
        }
    }
    runs
}
