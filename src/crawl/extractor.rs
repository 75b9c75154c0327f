//! Visible text and link extraction from HTML

use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

static LINK_SELECTOR: OnceLock<Selector> = OnceLock::new();

/// Elements whose text is never rendered
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "head", "title", "meta", "noscript", "template",
];

/// Parse a response body as an HTML document
pub fn parse_html(body: &[u8]) -> Html {
    Html::parse_document(&String::from_utf8_lossy(body))
}

/// Human-visible text of the document.
///
/// Text inside hidden elements is skipped. Whitespace runs collapse to a
/// single space and text nodes are joined with a space.
pub fn visible_text(document: &Html) -> String {
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|elem| HIDDEN_ELEMENTS.contains(&elem.name()))
        });
        if hidden {
            continue;
        }
        words.extend(text.split_whitespace());
    }

    words.join(" ")
}

/// Absolute URLs of every `<a href>` in the document.
///
/// Hrefs are resolved against `base`, fragments are removed, and repeats are
/// dropped keeping first-occurrence order. Hrefs that cannot be resolved are
/// skipped.
pub fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let selector =
        LINK_SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("valid link selector"));

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        url.set_fragment(None);

        let link = String::from(url);
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}
