//! The three document parsers, richest first.

use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::debug;

use crate::app::error::ParseError;
use crate::document::DocumentParser;

/// Map a library error onto the parse taxonomy
fn classify(message: String) -> ParseError {
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("decrypt") || lower.contains("password") {
        ParseError::Protected
    } else {
        ParseError::Malformed(message)
    }
}

fn load(bytes: &[u8]) -> Result<Document, ParseError> {
    let doc = Document::load_mem(bytes).map_err(|e| classify(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(ParseError::Protected);
    }
    Ok(doc)
}

fn non_empty(text: String) -> Result<String, ParseError> {
    if text.trim().is_empty() {
        Err(ParseError::Empty)
    } else {
        Ok(text)
    }
}

/// Full layout-aware extraction via `pdf-extract`
pub struct PdfExtractParser;

impl DocumentParser for PdfExtractParser {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ParseError> {
        // pdf-extract decrypts with an empty password on its own, so check first
        load(bytes)?;
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| classify(e.to_string()))?;
        non_empty(text)
    }
}

/// Page-by-page extraction with `lopdf`'s font-aware decoder
pub struct LopdfParser;

impl DocumentParser for LopdfParser {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ParseError> {
        let doc = load(bytes)?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        if pages.is_empty() {
            return Err(ParseError::Malformed("document has no pages".to_string()));
        }

        let mut out = String::new();
        for page in pages {
            match doc.extract_text(&[page]) {
                Ok(text) => {
                    out.push_str(&text);
                    out.push('\n');
                }
                Err(e) => debug!("lopdf could not read page {}: {}", page, e),
            }
        }
        non_empty(out)
    }
}

/// Lenient scan of text-showing operators in decoded content streams.
///
/// Ignores fonts and encodings entirely, so it recovers something from
/// documents the other two reject.
pub struct RawTextParser;

impl RawTextParser {
    fn string_bytes(object: &Object, out: &mut Vec<u8>) {
        match object {
            Object::String(bytes, _) => out.extend_from_slice(bytes),
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::String(bytes, _) => out.extend_from_slice(bytes),
                        // Large negative kerning is a word gap
                        Object::Integer(n) if *n < -200 => out.push(b' '),
                        Object::Real(n) if *n < -200.0 => out.push(b' '),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn decode(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl DocumentParser for RawTextParser {
    fn name(&self) -> &'static str {
        "raw-text"
    }

    fn parse(&self, bytes: &[u8]) -> Result<String, ParseError> {
        let doc = load(bytes)?;
        let mut out = String::new();

        for (number, page_id) in doc.get_pages() {
            let content = match doc.get_page_content(page_id).and_then(|raw| Content::decode(&raw)) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping unreadable content on page {}: {}", number, e);
                    continue;
                }
            };

            let mut line = Vec::new();
            for op in &content.operations {
                match op.operator.as_str() {
                    "Tj" | "TJ" => {
                        if let Some(operand) = op.operands.first() {
                            Self::string_bytes(operand, &mut line);
                        }
                    }
                    // ' and " move to the next line before showing text
                    "'" | "\"" => {
                        line.push(b'\n');
                        if let Some(operand) = op.operands.last() {
                            Self::string_bytes(operand, &mut line);
                        }
                    }
                    "Td" | "TD" | "T*" | "ET" => line.push(b'\n'),
                    _ => {}
                }
            }
            out.push_str(&Self::decode(&line));
            out.push('\n');
        }

        non_empty(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::pdf_with_lines;

    #[test]
    fn test_raw_scan_reads_shown_strings_in_order() {
        let pdf = pdf_with_lines(&["Postdoctoral position", "Department of Physics"]);

        let text = RawTextParser.parse(&pdf).unwrap();

        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Postdoctoral position", "Department of Physics"]);
    }

    #[test]
    fn test_garbage_bytes_are_malformed() {
        for parser in [&PdfExtractParser as &dyn DocumentParser, &LopdfParser, &RawTextParser] {
            let err = parser.parse(b"definitely not a pdf").unwrap_err();
            assert!(matches!(err, ParseError::Malformed(_)), "{}: {:?}", parser.name(), err);
        }
    }

    #[test]
    fn test_encryption_errors_classify_as_protected() {
        assert_eq!(classify("File is encrypted".to_string()), ParseError::Protected);
        assert_eq!(classify("Decryption failed: bad password".to_string()), ParseError::Protected);
        assert!(matches!(classify("invalid xref".to_string()), ParseError::Malformed(_)));
    }
}
