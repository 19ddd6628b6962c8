//! Pure content parser: extracts links, block references, tags, inline
//! properties, task markers and priorities from a block's raw text. No I/O,
//! no shared state.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ParsedContent;

/// Wiki-style page links: `[[page name]]`. Bracket content may not contain `]`.
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

/// Block references: `((uuid))`.
static BLOCK_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\(([0-9a-f-]{36})\)\)").unwrap());

/// Tags: `#tag`, where `#` sits at the start of the string or after whitespace.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z0-9_-]+)").unwrap());

/// #[[multi word tag]]
static TAG_BRACKET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\[\[([^\]]+)\]\]").unwrap());

/// Inline properties, one `key:: value` per line.
static PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9_-]*)::\s*(.+)$").unwrap());

/// Leading TODO/DOING/DONE/LATER/NOW/WAITING/CANCELLED marker.
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(TODO|DOING|DONE|LATER|NOW|WAITING|CANCELLED)\s").unwrap());

/// Priority [#A], [#B], [#C].
static PRIORITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[#([A-C])\]").unwrap());

/// Extract structured data from a block's raw content string.
pub fn parse(content: &str) -> ParsedContent {
    ParsedContent {
        links: extract_links(content),
        block_references: extract_block_refs(content),
        tags: extract_tags(content),
        properties: extract_properties(content),
        marker: MARKER_RE
            .captures(content)
            .map(|c| c[1].to_string()),
        priority: PRIORITY_RE
            .captures(content)
            .map(|c| c[1].to_string()),
    }
}

/// All `[[page name]]` targets, in order of first occurrence, deduplicated.
pub fn extract_links(content: &str) -> Vec<String> {
    dedup_captures(&LINK_RE, content)
}

/// All `((uuid))` references, in order of first occurrence, deduplicated.
pub fn extract_block_refs(content: &str) -> Vec<String> {
    dedup_captures(&BLOCK_REF_RE, content)
}

/// All `#tag` and `#[[multi word tag]]` occurrences, deduplicated.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for caps in TAG_RE.captures_iter(content) {
        let tag = caps[1].to_string();
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    for caps in TAG_BRACKET_RE.captures_iter(content) {
        let tag = caps[1].to_string();
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    tags
}

/// `key:: value` pairs, each line considered independently, values trimmed.
pub fn extract_properties(content: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    for line in content.lines() {
        if let Some(caps) = PROPERTY_RE.captures(line.trim()) {
            props.insert(caps[1].to_string(), caps[2].trim().to_string());
        }
    }
    props
}

/// Remove a leading task marker ("TODO ", "DONE ", ...) from content.
pub fn strip_marker(content: &str) -> String {
    MARKER_RE.replace(content, "").into_owned()
}

/// Remove a leading "- " bullet after trimming surrounding whitespace.
pub fn strip_bullet(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.strip_prefix("- ") {
        Some(rest) => rest.to_string(),
        None => trimmed.to_string(),
    }
}

fn dedup_captures(re: &Regex, content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in re.captures_iter(content) {
        let value = caps[1].to_string();
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}
