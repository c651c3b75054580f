//! JavaScript evaluated inside the page.

/// Main content candidates, most specific first
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
];

/// Page chrome removed before text extraction
pub const REMOVE_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    ".sidebar",
    ".advertisement",
    ".ads",
    ".cookie-banner",
    "script",
    "style",
    "noscript",
];

pub const SCROLL_TO_TOP: &str = "window.scrollTo(0, 0); true";

pub const VIEWPORT_HEIGHT: &str = "window.innerHeight";

/// Selector list as a JS array literal
fn js_array<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}

/// Returns `{keyFound, textLen, height}` without touching the DOM
pub fn probe_script<S: AsRef<str>>(key_selectors: &[S]) -> String {
    let key_selectors = js_array(key_selectors);
    format!(
        r#"
        (() => {{
            const keySelectors = {key_selectors};
            let keyFound = false;
            for (const selector of keySelectors) {{
                try {{
                    const el = document.querySelector(selector);
                    if (el && (el.innerText || '').trim().length > 0) {{
                        keyFound = true;
                        break;
                    }}
                }} catch (e) {{}}
            }}
            const main = document.querySelector('main')
                || document.querySelector('article')
                || document.querySelector('[role="main"]')
                || document.querySelector('#content')
                || document.body;
            const text = main ? (main.innerText || '') : '';
            const root = document.documentElement;
            const height = Math.max(
                root ? root.scrollHeight : 0,
                document.body ? document.body.scrollHeight : 0
            );
            return {{ keyFound: keyFound, textLen: text.length, height: height }};
        }})()
        "#
    )
}

/// Removes page chrome and returns `{text, selector}` for the best content container
pub fn extraction_script() -> String {
    let remove_selectors = js_array(REMOVE_SELECTORS);
    let content_selectors = js_array(CONTENT_SELECTORS);
    format!(
        r#"
        (() => {{
            const removeSelectors = {remove_selectors};
            for (const selector of removeSelectors) {{
                document.querySelectorAll(selector).forEach(el => el.remove());
            }}

            const contentSelectors = {content_selectors};
            for (const selector of contentSelectors) {{
                const element = document.querySelector(selector);
                if (element && element.innerText.trim().length > 100) {{
                    return {{ text: element.innerText, selector: selector }};
                }}
            }}

            const body = document.body;
            if (body) {{
                return {{ text: body.innerText, selector: 'body' }};
            }}
            return {{ text: '', selector: null }};
        }})()
        "#
    )
}

/// Hides viewer toolbars, panels and short buttons, then zooms out
pub fn suppress_ui_script<S: AsRef<str>>(selectors: &[S], zoom: f64) -> String {
    let selectors = js_array(selectors);
    format!(
        r#"
        (() => {{
            const selectors = {selectors};
            let hidden = 0;
            for (const selector of selectors) {{
                try {{
                    document.querySelectorAll(selector).forEach(el => {{
                        el.style.display = 'none';
                        hidden += 1;
                    }});
                }} catch (e) {{}}
            }}
            document.querySelectorAll('button:not([class*="page"])').forEach(el => {{
                if (el.textContent && el.textContent.length < 20) {{
                    el.style.visibility = 'hidden';
                }}
            }});
            if (document.body) {{
                document.body.style.zoom = '{zoom}';
            }}
            return hidden;
        }})()
        "#
    )
}

/// Returns `{indicator}`: the first text shaped like a `current/total` page indicator, or null
pub fn page_indicator_script() -> String {
    r#"
    (() => {
        const pattern = /(\d+)\s*\/\s*(\d+)/;
        const selectors = [
            '.page-num-info',
            'input[value*="/"]',
            '[class*="page"]',
            '[class*="Page"]'
        ];
        for (const selector of selectors) {
            for (const el of document.querySelectorAll(selector)) {
                const candidates = [el.value, el.textContent];
                for (const candidate of candidates) {
                    if (candidate && candidate.length < 40 && pattern.test(candidate)) {
                        return { indicator: candidate.trim() };
                    }
                }
            }
        }
        return { indicator: null };
    })()
    "#
    .to_string()
}

/// Scrolls down and returns the new vertical offset
pub fn scroll_by_script(dy: u32) -> String {
    format!(
        "(() => {{ window.scrollBy(0, {dy}); \
         return Math.round(window.pageYOffset || document.documentElement.scrollTop || 0); }})()"
    )
}

/// Clicks the first matching element and returns `{clicked}` with its selector, or null
pub fn click_first_script<S: AsRef<str>>(selectors: &[S]) -> String {
    let selectors = js_array(selectors);
    format!(
        r#"
        (() => {{
            const selectors = {selectors};
            for (const selector of selectors) {{
                try {{
                    const el = document.querySelector(selector);
                    if (el) {{
                        el.click();
                        return {{ clicked: selector }};
                    }}
                }} catch (e) {{}}
            }}
            return {{ clicked: null }};
        }})()
        "#
    )
}
