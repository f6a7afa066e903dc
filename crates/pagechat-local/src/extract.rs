//! Selector-based content extraction over parsed HTML.
//!
//! Parsing is best-effort and total: malformed markup degrades to whatever
//! the parser recovers, and missing elements yield empty strings.

use crate::normalize::normalize;
use html_scraper::{Html, Selector};
use pagechat_core::Headings;

/// Upper bound on the merged body text, in characters.
pub const MAX_CONTENT_CHARS: usize = 100_000;

/// Subtrees removed before any text extraction so their text never leaks
/// into an extracted field.
const STRIP_SELECTOR: &str = "script, style, link, noscript, iframe, img, video, audio, form, button";

/// Elements whose class or id signals a content container.
const GENERIC_CONTENT_SELECTOR: &str = ".content, #content, [class*='content']";

/// Everything `extract` pulls from one page: the same shape as the scraped
/// entity minus url/error/cache metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub title: String,
    pub headings: Headings,
    pub meta_description: String,
    pub content: String,
}

pub fn extract(raw_markup: &str) -> ExtractedDocument {
    let mut doc = Html::parse_document(raw_markup);
    strip_non_content(&mut doc);

    let title = first_text(&doc, "title");
    let meta_description = meta_description(&doc);
    let h1 = joined_text(&doc, "h1");
    let h2 = joined_text(&doc, "h2");
    let h3 = joined_text(&doc, "h3");
    let h4 = joined_text(&doc, "h4");
    let h5 = joined_text(&doc, "h5");
    let h6 = joined_text(&doc, "h6");
    let article_text = joined_text(&doc, "article");
    let main_text = joined_text(&doc, "main");
    let content_text = joined_text(&doc, GENERIC_CONTENT_SELECTOR);
    let paragraphs = joined_text(&doc, "p");
    let list_items = joined_text(&doc, "li");

    let combined = [
        title.as_str(),
        meta_description.as_str(),
        h1.as_str(),
        h2.as_str(),
        h3.as_str(),
        h4.as_str(),
        h5.as_str(),
        h6.as_str(),
        article_text.as_str(),
        main_text.as_str(),
        content_text.as_str(),
        paragraphs.as_str(),
        list_items.as_str(),
    ]
    .join(" ");
    let content = truncate_chars(&normalize(&combined), MAX_CONTENT_CHARS);

    ExtractedDocument {
        title: normalize(&title),
        headings: Headings {
            h1: normalize(&h1),
            h2: normalize(&h2),
            h3: normalize(&h3),
            h4: normalize(&h4),
            h5: normalize(&h5),
            h6: normalize(&h6),
        },
        meta_description: normalize(&meta_description),
        content,
    }
}

fn strip_non_content(doc: &mut Html) {
    let Ok(sel) = Selector::parse(STRIP_SELECTOR) else {
        return;
    };
    // Collect ids first: detaching while the select iterator borrows the
    // tree is not possible, and detached descendants are harmless no-ops.
    let ids: Vec<_> = doc.select(&sel).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn element_text(el: html_scraper::ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, css: &str) -> String {
    let Ok(sel) = Selector::parse(css) else {
        return String::new();
    };
    doc.select(&sel).next().map(element_text).unwrap_or_default()
}

/// Text of every matching element, document order, single-space joined.
fn joined_text(doc: &Html, css: &str) -> String {
    let Ok(sel) = Selector::parse(css) else {
        return String::new();
    };
    doc.select(&sel)
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn meta_description(doc: &Html) -> String {
    let Ok(sel) = Selector::parse(r#"meta[name="description"]"#) else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
