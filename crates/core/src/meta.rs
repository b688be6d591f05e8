//! Page heuristics shared by the listing and detail extractors.

use crate::dom::{self, DomNode};

/// Label for the provider organization field.
pub const LABEL_PROVIDER: &str = "제공기관";
/// Label for the category (classification) field.
pub const LABEL_CATEGORY: &str = "분류체계";
/// Label for the API type field.
pub const LABEL_API_TYPE: &str = "API유형";
/// Label for the data format field.
pub const LABEL_DATA_FORMAT: &str = "데이터포맷";
/// Label for a free-text description.
pub const LABEL_DESCRIPTION: &str = "설명";

/// A parsed page with the views every extraction strategy reads from.
pub struct Page<'a> {
    /// Raw markup, for patterns that live inside scripts.
    pub html: &'a str,
    pub dom: DomNode,
    /// Visible text of the whole document, whitespace-joined.
    pub text: String,
}

impl<'a> Page<'a> {
    pub fn parse(html: &'a str) -> Self {
        let dom = dom::parse_html(html);
        let text = dom.text_content();
        Self { html, dom, text }
    }
}

/// Run `strategies` in order and return the first hit with the name of the
/// strategy that produced it.
pub fn first_match<T>(
    page: &Page<'_>,
    strategies: &[(&'static str, fn(&Page<'_>) -> Option<T>)],
) -> Option<(&'static str, T)> {
    strategies
        .iter()
        .find_map(|(name, strategy)| strategy(page).map(|value| (*name, value)))
}

/// Find `label` in `text` and return the first token that follows it.
///
/// The token ends at the first whitespace, `·`, `,` or `|`.
pub fn scan_field_label(text: &str, label: &str) -> Option<String> {
    let idx = text.find(label)?;
    let rest = text[idx + label.len()..].trim();
    let token = rest
        .split(|c: char| c.is_whitespace() || matches!(c, '·' | ',' | '|'))
        .next()
        .unwrap_or("")
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Label → value pairs from `<dt>`/`<th>` elements and their next element
/// sibling, in document order. Pairs with a blank value are skipped.
pub fn label_pairs(dom: &DomNode) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    dom.walk(&mut |ctx| {
        if ctx.node.tag != "dt" && ctx.node.tag != "th" {
            return;
        }
        let Some(value) = ctx.next_sibling.and_then(|n| n.text_opt()) else {
            return;
        };
        pairs.push((ctx.node.text_content(), value));
    });
    pairs
}

/// First value recorded under `label`.
pub fn label_value(pairs: &[(String, String)], label: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(l, _)| l == label)
        .map(|(_, v)| v.clone())
}

/// `JSON`, `XML`, or both joined with `separator`, by literal token presence.
pub fn format_tag(text: &str, separator: &str) -> Option<String> {
    let json = text.contains("JSON");
    let xml = text.contains("XML");
    match (json, xml) {
        (true, true) => Some(format!("JSON{separator}XML")),
        (true, false) => Some("JSON".to_string()),
        (false, true) => Some("XML".to_string()),
        (false, false) => None,
    }
}

/// Keep only the ASCII digits of `text` and parse them.
pub fn digits_only(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Text before the first `separator`, trimmed.
pub fn cut_at(text: &str, separator: char) -> &str {
    match text.find(separator) {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    }
}
