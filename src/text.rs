//! Text checks shared by every tier.

/// Markers that only show up when raw PDF syntax leaks into extracted text
const PDF_MARKERS: &[&str] = &[
    "endobj",
    "endstream",
    "/Type",
    "/Catalog",
    "/Pages",
    "/MediaBox",
    "/Contents",
    "startxref",
    "%%EOF",
    "trailer",
];

/// Notices that mean the page refused to show its content
const UNAVAILABLE_NOTICES: &[&str] = &[
    "暂不支持您的浏览器",
    "unsupported browser",
    "browser not supported",
    "this browser version is no longer supported",
    "access denied",
    "access restricted",
    "content unavailable",
];

/// Download prompts that only count as a refusal on short pages
const DOWNLOAD_PROMPTS: &[&str] = &[
    "推荐您下载",
    "无法下载",
    "无法打印",
    "不支持下载",
    "不支持打印",
    "体验更流畅",
    "立即下载",
    "download not supported",
    "print not supported",
    "please download",
    "recommended download",
];

const ERROR_PAGE_KEYWORDS: &[&str] = &["error", "404", "403", "500", "not found", "forbidden"];

/// Length in characters, not bytes
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Share of alphabetic characters among non-whitespace characters
pub fn alpha_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut alpha = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_alphabetic() {
            alpha += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        alpha as f64 / total as f64
    }
}

/// Trim every line, collapse inner runs of spaces and keep at most one blank line in a row
pub fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = 0;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(collapsed);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Whether text looks like raw PDF bytes decoded as a string
pub fn looks_like_pdf_garbage(text: &str) -> bool {
    if text.trim_start().starts_with("%PDF-") {
        return true;
    }

    let head: String = text.chars().take(2000).collect();
    let markers = PDF_MARKERS.iter().filter(|m| head.contains(**m)).count();
    if markers >= 3 {
        return true;
    }

    let sample: Vec<char> = text.chars().take(1000).collect();
    if sample.len() > 200 {
        let len = sample.len() as f64;
        let control = sample
            .iter()
            .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
            .count();
        if control as f64 / len > 0.05 {
            return true;
        }
        let replacement = sample.iter().filter(|c| **c == '\u{FFFD}').count();
        if replacement as f64 / len > 0.10 {
            return true;
        }
    }

    false
}

/// The notice a page shows instead of its content, if it shows one
pub fn unavailable_notice(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if let Some(notice) = UNAVAILABLE_NOTICES.iter().find(|p| lower.contains(**p)) {
        return Some(notice);
    }

    let len = char_len(text.trim());
    if len < 1000 {
        if let Some(prompt) = DOWNLOAD_PROMPTS.iter().find(|p| lower.contains(**p)) {
            return Some(prompt);
        }
    }
    if len < 200 && ERROR_PAGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some("error page");
    }
    None
}

/// Minimum bar every tier's output must clear before it is accepted.
///
/// Returns the rejection reason on failure.
pub fn check_minimum_bar(text: &str, min_length: usize) -> Result<(), String> {
    let len = char_len(text.trim());
    if len == 0 {
        return Err("no text extracted".to_string());
    }
    if len < min_length {
        return Err(format!("text too short ({} < {} chars)", len, min_length));
    }
    if looks_like_pdf_garbage(text) {
        return Err("text looks like raw PDF data".to_string());
    }
    if let Some(notice) = unavailable_notice(text) {
        return Err(format!("page shows an unavailable notice: {}", notice));
    }
    Ok(())
}
