/// Minimal CSS selector engine for querying parsed pages.
/// Supports: tag, .class, #id, attribute tests (`[a]`, `[a=v]`, `[a*=v]`,
/// `[a^=v]`, `[a$=v]`), universal, descendant and child combinators, and
/// comma-separated selector groups.

use crate::dom::DomNode;

/// A comma-separated list of selectors. An element matches the group when it
/// matches any member.
#[derive(Debug, Clone)]
pub struct SelectorGroup {
    pub selectors: Vec<Selector>,
}

/// A single selector (one part of a comma-separated list).
#[derive(Debug, Clone)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

/// How an attribute test compares the attribute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

/// A component of a selector chain.
#[derive(Debug, Clone)]
pub enum SelectorPart {
    /// Matches a tag name: `div`, `li`, etc.
    Tag(String),
    /// Matches a class: `.foo`
    Class(String),
    /// Matches an ID: `#bar`
    Id(String),
    /// Matches an attribute: `[href*="openapi.do"]`
    Attribute(String, Option<(AttrOp, String)>),
    /// Descendant combinator (space)
    Descendant,
    /// Child combinator (>)
    Child,
    /// Universal selector (*)
    Universal,
}

impl SelectorGroup {
    /// Parse a comma-separated selector string. Unparsable members are dropped.
    pub fn parse(input: &str) -> Self {
        let selectors = input
            .split(',')
            .filter_map(|s| parse_selector(s.trim()))
            .collect();
        Self { selectors }
    }

    /// Check whether `node` matches, given its ancestors from outermost to parent.
    pub fn matches(&self, node: &DomNode, ancestors: &[&DomNode]) -> bool {
        self.selectors
            .iter()
            .any(|s| matches_element(s, node, ancestors))
    }
}

impl DomNode {
    /// All elements at or below this node matching `selectors`, in document order.
    pub fn select(&self, selectors: &str) -> Vec<&DomNode> {
        let group = SelectorGroup::parse(selectors);
        let mut found = Vec::new();
        let mut ancestors = Vec::new();
        collect_matches(self, &group, &mut ancestors, &mut found, usize::MAX);
        found
    }

    /// First element at or below this node matching `selectors`.
    pub fn select_first(&self, selectors: &str) -> Option<&DomNode> {
        let group = SelectorGroup::parse(selectors);
        let mut found = Vec::new();
        let mut ancestors = Vec::new();
        collect_matches(self, &group, &mut ancestors, &mut found, 1);
        found.into_iter().next()
    }
}

fn collect_matches<'a>(
    node: &'a DomNode,
    group: &SelectorGroup,
    ancestors: &mut Vec<&'a DomNode>,
    found: &mut Vec<&'a DomNode>,
    limit: usize,
) {
    if found.len() >= limit {
        return;
    }
    if node.is_element() && group.matches(node, ancestors) {
        found.push(node);
    }
    let pushed = node.is_element();
    if pushed {
        ancestors.push(node);
    }
    for child in node.element_children() {
        collect_matches(child, group, ancestors, found, limit);
        if found.len() >= limit {
            break;
        }
    }
    if pushed {
        ancestors.pop();
    }
}

/// Parse a single selector string into a Selector.
fn parse_selector(input: &str) -> Option<Selector> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '.' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let class_name = read_ident(&mut chars);
                if !class_name.is_empty() {
                    parts.push(SelectorPart::Class(class_name));
                }
            }
            '#' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let id_name = read_ident(&mut chars);
                if !id_name.is_empty() {
                    parts.push(SelectorPart::Id(id_name));
                }
            }
            '[' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                parts.push(read_attribute(&mut chars));
            }
            '>' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                skip_whitespace(&mut chars);
                if matches!(parts.last(), Some(SelectorPart::Descendant)) {
                    parts.pop();
                }
                parts.push(SelectorPart::Child);
            }
            ' ' | '\t' | '\n' | '\r' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                skip_whitespace(&mut chars);
                if let Some(&next) = chars.peek() {
                    if next != '>' {
                        parts.push(SelectorPart::Descendant);
                    }
                }
            }
            '*' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                parts.push(SelectorPart::Universal);
            }
            _ => {
                current.push(ch);
                chars.next();
            }
        }
    }

    flush_tag(&mut current, &mut parts);

    if parts.is_empty() {
        None
    } else {
        Some(Selector { parts })
    }
}

fn read_attribute(chars: &mut std::iter::Peekable<std::str::Chars>) -> SelectorPart {
    let mut name = String::new();
    let mut test = None;
    while let Some(&c) = chars.peek() {
        match c {
            ']' => {
                chars.next();
                break;
            }
            '*' | '^' | '$' | '=' => {
                chars.next();
                let op = match c {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::StartsWith,
                    '$' => AttrOp::EndsWith,
                    _ => AttrOp::Equals,
                };
                if op != AttrOp::Equals && chars.peek() == Some(&'=') {
                    chars.next();
                }
                test = Some((op, read_attr_value(chars)));
            }
            _ => {
                name.push(c);
                chars.next();
            }
        }
    }
    SelectorPart::Attribute(name.trim().to_string(), test)
}

fn read_attr_value(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut val = String::new();
    match chars.peek().copied() {
        Some(quote) if quote == '"' || quote == '\'' => {
            chars.next();
            for vc in chars.by_ref() {
                if vc == quote {
                    break;
                }
                val.push(vc);
            }
        }
        _ => {
            while let Some(&vc) = chars.peek() {
                if vc == ']' {
                    break;
                }
                val.push(vc);
                chars.next();
            }
        }
    }
    val.trim().to_string()
}

fn flush_tag(current: &mut String, parts: &mut Vec<SelectorPart>) {
    let tag = current.trim().to_string();
    if !tag.is_empty() {
        parts.push(SelectorPart::Tag(tag.to_lowercase()));
        current.clear();
    }
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

/// Check if a selector matches an element, given its ancestry.
/// `ancestors` runs from the outermost ancestor to the parent.
pub fn matches_element(selector: &Selector, node: &DomNode, ancestors: &[&DomNode]) -> bool {
    // Split into compound segments; each carries the combinator that links it
    // to the segment on its right.
    let mut segments: Vec<(Vec<&SelectorPart>, Option<&SelectorPart>)> = Vec::new();
    let mut current_segment: Vec<&SelectorPart> = Vec::new();

    for part in &selector.parts {
        match part {
            SelectorPart::Descendant | SelectorPart::Child => {
                if !current_segment.is_empty() {
                    segments.push((current_segment, Some(part)));
                    current_segment = Vec::new();
                }
            }
            _ => current_segment.push(part),
        }
    }
    if !current_segment.is_empty() {
        segments.push((current_segment, None));
    }

    match segments.split_last() {
        Some(((last, _), rest)) => {
            segment_matches(last, node) && ancestors_match(rest, ancestors)
        }
        None => false,
    }
}

/// Match the remaining segments (right to left) against the ancestor chain.
fn ancestors_match(
    segments: &[(Vec<&SelectorPart>, Option<&SelectorPart>)],
    ancestors: &[&DomNode],
) -> bool {
    let Some(((segment, combinator), rest)) = segments.split_last() else {
        return true;
    };
    let is_child = matches!(combinator, Some(SelectorPart::Child));

    let mut remaining = ancestors;
    while let Some((candidate, above)) = remaining.split_last() {
        if segment_matches(segment, candidate) && ancestors_match(rest, above) {
            return true;
        }
        if is_child {
            return false;
        }
        remaining = above;
    }
    false
}

fn segment_matches(segment: &[&SelectorPart], node: &DomNode) -> bool {
    segment.iter().all(|part| match part {
        SelectorPart::Tag(t) => t == &node.tag.to_lowercase(),
        SelectorPart::Class(c) => node.has_class(c),
        SelectorPart::Id(i) => node.get_attr("id") == Some(i.as_str()),
        SelectorPart::Attribute(name, test) => match (node.get_attr(name), test) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(value), Some((op, expected))) => match op {
                AttrOp::Equals => value == expected,
                AttrOp::Contains => value.contains(expected.as_str()),
                AttrOp::StartsWith => value.starts_with(expected.as_str()),
                AttrOp::EndsWith => value.ends_with(expected.as_str()),
            },
        },
        SelectorPart::Universal => true,
        SelectorPart::Descendant | SelectorPart::Child => true,
    })
}
