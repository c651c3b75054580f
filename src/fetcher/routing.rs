//! URL rewriting for hosted documents.

use scraper::{Html, Selector};
use url::Url;

use crate::domain::TypeHint;

const DRIVE_DOWNLOAD: &str = "https://drive.google.com/uc";

/// File id from `/file/d/<id>/...` or `?id=<id>` Drive links
pub fn drive_file_id(url: &Url) -> Option<String> {
    path_id_after(url, "d").or_else(|| {
        url.query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .filter(|id| !id.is_empty())
    })
}

/// Document id from `/document/d/<id>/...` Docs links
pub fn docs_document_id(url: &Url) -> Option<String> {
    path_id_after(url, "d")
}

fn path_id_after(url: &Url, marker: &str) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == marker)?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// Direct download link for a Drive file
pub fn drive_download_url(url: &Url) -> Option<Url> {
    let id = drive_file_id(url)?;
    let mut download = Url::parse(DRIVE_DOWNLOAD).ok()?;
    download
        .query_pairs_mut()
        .append_pair("export", "download")
        .append_pair("id", &id);
    Some(download)
}

/// Export link for a Docs document, `format` being `txt` or `pdf`
pub fn docs_export_url(url: &Url, format: &str) -> Option<Url> {
    let id = docs_document_id(url)?;
    let mut export = url.clone();
    export.set_path(&format!("/document/d/{}/export", id));
    export.set_query(Some(&format!("format={}", format)));
    export.set_fragment(None);
    Some(export)
}

/// URL the static tier should GET
pub fn static_target(url: &Url, hint: Option<TypeHint>) -> Url {
    let rewritten = match hint {
        Some(TypeHint::GoogleDrive) => drive_download_url(url),
        Some(TypeHint::GoogleDocs) => docs_export_url(url, "txt"),
        _ => None,
    };
    rewritten.unwrap_or_else(|| url.clone())
}

/// URL the document tier should download when nothing was stored earlier
pub fn document_target(url: &Url, hint: Option<TypeHint>) -> Option<Url> {
    match hint {
        Some(TypeHint::GoogleDrive) => drive_download_url(url),
        Some(TypeHint::GoogleDocs) => docs_export_url(url, "pdf"),
        Some(TypeHint::Pdf) => Some(url.clone()),
        _ => None,
    }
}

/// Follow-up link on Drive's "can't scan this file for viruses" page.
///
/// Either an anchor carrying `export=download` and `confirm=`, or the
/// `download-form` form rebuilt as a GET with its inputs as query pairs.
pub fn drive_confirm_link(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    if let Ok(anchors) = Selector::parse("a[href]") {
        let link = document
            .select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains("export=download") && href.contains("confirm="));
        if let Some(href) = link {
            return base.join(href).ok();
        }
    }

    let form_selector = Selector::parse("form#download-form").ok()?;
    let form = document.select(&form_selector).next()?;
    let action = form.value().attr("action").filter(|a| !a.is_empty())?;
    let mut target = base.join(action).ok()?;

    let input_selector = Selector::parse("input[name]").ok()?;
    let inputs: Vec<(String, String)> = form
        .select(&input_selector)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect();
    if inputs.is_empty() {
        return None;
    }
    {
        let mut pairs = target.query_pairs_mut();
        for (name, value) in &inputs {
            pairs.append_pair(name, value);
        }
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_drive_file_link_rewrite() {
        let link = url("https://drive.google.com/file/d/1AbC-xyz/view?usp=sharing");
        assert_eq!(
            drive_download_url(&link).unwrap().as_str(),
            "https://drive.google.com/uc?export=download&id=1AbC-xyz"
        );
    }

    #[test]
    fn test_drive_open_link_rewrite() {
        let link = url("https://drive.google.com/open?id=42");
        assert_eq!(drive_file_id(&link), Some("42".to_string()));
    }

    #[test]
    fn test_docs_export_rewrite() {
        let link = url("https://docs.google.com/document/d/DOC1/edit#heading=h.1");
        assert_eq!(
            docs_export_url(&link, "txt").unwrap().as_str(),
            "https://docs.google.com/document/d/DOC1/export?format=txt"
        );
        assert_eq!(
            document_target(&link, Some(TypeHint::GoogleDocs)).unwrap().as_str(),
            "https://docs.google.com/document/d/DOC1/export?format=pdf"
        );
    }

    #[test]
    fn test_static_target_passthrough() {
        let link = url("https://example.com/jobs");
        assert_eq!(static_target(&link, None), link);
        assert_eq!(static_target(&link, Some(TypeHint::GoogleDrive)), link);
        assert!(document_target(&link, None).is_none());
    }

    #[test]
    fn test_confirm_anchor() {
        let base = url("https://drive.google.com/uc?export=download&id=X");
        let html = r#"<html><body>
            <a href="/help">Help</a>
            <a href="/uc?export=download&amp;confirm=t0k&amp;id=X">Download anyway</a>
        </body></html>"#;
        assert_eq!(
            drive_confirm_link(html, &base).unwrap().as_str(),
            "https://drive.google.com/uc?export=download&confirm=t0k&id=X"
        );
    }

    #[test]
    fn test_confirm_form() {
        let base = url("https://drive.google.com/uc?export=download&id=X");
        let html = r#"<form id="download-form" action="https://drive.usercontent.google.com/download" method="get">
            <input type="hidden" name="id" value="X">
            <input type="hidden" name="confirm" value="t">
            <input type="submit" value="Download anyway">
        </form>"#;
        assert_eq!(
            drive_confirm_link(html, &base).unwrap().as_str(),
            "https://drive.usercontent.google.com/download?id=X&confirm=t"
        );
    }

    #[test]
    fn test_no_confirm_link() {
        let base = url("https://drive.google.com/uc?export=download&id=X");
        assert!(drive_confirm_link("<html><body>nothing</body></html>", &base).is_none());
    }
}
