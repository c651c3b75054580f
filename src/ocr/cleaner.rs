use regex::Regex;
use tracing::debug;

use crate::config::CleanerConfig;
use crate::text;

/// Strips viewer noise and OCR artifacts from recognized text
#[derive(Debug)]
pub struct TextCleaner {
    blacklist: Option<Regex>,
    noise: Regex,
    cjk_gap: Regex,
    config: CleanerConfig,
}

impl TextCleaner {
    pub fn new(config: CleanerConfig) -> Result<Self, regex::Error> {
        let terms: Vec<String> = config
            .ui_blacklist
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
            .collect();
        let blacklist = if terms.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\b(?:{})\b", terms.join("|")))?)
        };

        Ok(Self {
            blacklist,
            // Stray glyphs tesseract emits for borders and icons
            noise: Regex::new(r"[|¦▪■□●○◆◇►▶◀▲▼★☆※•·~`^]+")?,
            cjk_gap: Regex::new(r"([\p{Han}\x{3000}-\x{303f}\x{ff00}-\x{ffef}])[ \t]+([\p{Han}\x{3000}-\x{303f}\x{ff00}-\x{ffef}])")?,
            config,
        })
    }

    pub fn is_blacklisted(&self, line: &str) -> bool {
        self.blacklist.as_ref().is_some_and(|re| re.is_match(line))
    }

    fn keep_short(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.config.keep_keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
    }

    /// Whether a line carries at least one letter or digit
    fn meaningful(line: &str) -> bool {
        line.chars().any(char::is_alphanumeric)
    }

    fn collapse_cjk(&self, line: &str) -> String {
        // Twice, since matches cannot overlap on the shared character
        let once = self.cjk_gap.replace_all(line, "$1$2");
        self.cjk_gap.replace_all(&once, "$1$2").into_owned()
    }

    pub fn clean(&self, raw: &str) -> String {
        let normalized = text::normalize_whitespace(raw);
        let mut kept = Vec::new();
        let mut dropped = 0usize;

        for line in normalized.lines() {
            if line.is_empty() {
                kept.push(String::new());
                continue;
            }
            let line = self.noise.replace_all(line, " ");
            // Glyphs removed between words leave runs of spaces
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            let line = self.collapse_cjk(&line);

            if self.is_blacklisted(&line)
                || !Self::meaningful(&line)
                || (text::char_len(&line) <= self.config.min_line_length && !self.keep_short(&line))
            {
                dropped += 1;
                continue;
            }
            kept.push(line);
        }

        debug!("Cleaner dropped {} lines", dropped);
        text::normalize_whitespace(&kept.join("\n"))
    }
}

/// Drop lines of `current` that already appeared in `previous`.
///
/// Consecutive scroll captures overlap, so the same lines come back from OCR.
pub fn drop_overlap(previous: &str, current: &str) -> String {
    let seen: std::collections::HashSet<&str> = previous
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if seen.is_empty() {
        return current.to_string();
    }
    current
        .lines()
        .filter(|l| !seen.contains(l.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
