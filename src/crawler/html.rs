//! Small helpers shared by the HTML parsers

use scraper::{ElementRef, Html, Selector};

/// Parses a CSS selector, logging instead of failing on a bad pattern
pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::error!("Invalid CSS selector '{}': {:?}", css, e);
            None
        }
    }
}

/// First element matching `css`
pub(crate) fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = selector(css)?;
    document.select(&selector).next()
}

/// Text content of an element with whitespace runs collapsed to single spaces
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapsed text of the first element matching `css`; empty text counts as absent
pub(crate) fn first_text(document: &Html, css: &str) -> Option<String> {
    select_first(document, css)
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Reads the decimal digits out of `text`, ignoring separators and units
///
/// Returns `None` when there are no digits or the number does not fit in a `u64`.
pub(crate) fn digits_to_u64(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
