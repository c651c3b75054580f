use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text never belongs to the page content
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "iframe",
];

/// Elements that start a new line in the extracted text
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "tr", "table", "h1", "h2",
    "h3", "h4", "h5", "h6", "pre", "blockquote", "dd", "dt", "form",
];

/// Decode response bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng fallback.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, encoding);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> String {
    // Malformed sequences become U+FFFD and are caught by the garbage check later
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Visible text of an HTML document, one block per line
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());
    match body {
        Some(body) => collect_text(body, &mut out),
        None => collect_text(document.root_element(), &mut out),
    }

    crate::text::normalize_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if SKIPPED_TAGS.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child, out);
            if block {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
    }
}

/// Whether a Content-Type header or the body itself says HTML
pub fn is_html(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("text/html") || ct.contains("application/xhtml") {
            return true;
        }
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_prefers_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("héllo".as_bytes());
        assert_eq!(decode_body(&bytes, Some("text/html; charset=iso-8859-1")), "héllo");
    }

    #[test]
    fn test_decode_uses_header_charset() {
        let (bytes, _, _) = encoding_rs::GBK.encode("博士招生");
        assert_eq!(decode_body(&bytes, Some("text/html; charset=GBK")), "博士招生");
    }

    #[test]
    fn test_extract_charset_variants() {
        assert_eq!(extract_charset("text/html; charset=\"utf-8\""), Some("utf-8".to_string()));
        assert_eq!(extract_charset("text/html;Charset=GB2312"), Some("GB2312".to_string()));
        assert_eq!(extract_charset("text/html"), None);
    }

    #[test]
    fn test_extract_text_skips_noise() {
        let html = r#"<html><head><title>T</title><script>var x = 1;</script></head>
            <body>
              <nav>Home | About</nav>
              <main><h1>PhD Position</h1><p>Apply   before <b>March</b>.</p></main>
              <footer>Copyright</footer>
            </body></html>"#;
        let text = extract_text(html);
        assert!(text.contains("PhD Position"));
        assert!(text.contains("Apply before March ."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8"), b""));
        assert!(is_html(None, b"  <!DOCTYPE html><html>"));
        assert!(!is_html(Some("application/pdf"), b"%PDF-1.4"));
    }
}
