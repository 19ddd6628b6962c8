//! Markdown sectioner and block identity.
//!
//! A body is cut into sections at heading lines; each section becomes a
//! block whose children are the strictly deeper headings below it. Identity
//! comes from an embedded sentinel comment when present, otherwise from a
//! hash of the file path and line index so unannotated files keep stable
//! identifiers across loads.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::types::Block;

/// `<!-- id: 8-4-4-4-12 -->`, lowercase hex segments.
static SENTINEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"<!--\s*id:\s*([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\s*-->",
    )
    .unwrap()
});

/// Heading level (1-6) of a markdown line, or 0 when the line is not a
/// heading. Seven or more `#`, or `#` not followed by a space, do not count.
pub fn heading_level(line: &str) -> usize {
    let trimmed = line.trim();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return 0;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return 0;
    }
    level
}

/// Parse a body (frontmatter already stripped) into a block tree.
/// `rel_path` seeds the deterministic identity fallback.
pub fn parse_blocks(rel_path: &str, body: &str) -> Vec<Block> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    struct Section {
        level: usize,
        start_line: usize,
        lines: Vec<String>,
    }

    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section {
        level: 0,
        start_line: 0,
        lines: Vec::new(),
    };

    for (i, line) in body.split('\n').enumerate() {
        let level = heading_level(line);
        if level > 0 {
            if !current.lines.is_empty() || current.level > 0 {
                sections.push(current);
            }
            current = Section {
                level,
                start_line: i,
                lines: vec![line.to_string()],
            };
        } else {
            current.lines.push(line.to_string());
        }
    }
    if !current.lines.is_empty() || current.level > 0 {
        sections.push(current);
    }

    let mut roots: Vec<Block> = Vec::new();
    // Stack of (child index path into `roots`, heading level).
    let mut stack: Vec<(Vec<usize>, usize)> = Vec::new();

    for section in sections {
        let raw = section
            .lines
            .join("\n")
            .trim_end_matches(&['\n', ' '][..])
            .to_string();
        if raw.is_empty() && section.level == 0 {
            continue;
        }

        let (uuid, content) = resolve_identity(rel_path, section.start_line, &raw);
        let block = Block {
            uuid,
            content,
            children: Vec::new(),
        };

        if section.level == 0 {
            // Pre-heading content is always a root block.
            roots.push(block);
            continue;
        }

        while let Some((_, level)) = stack.last() {
            if *level >= section.level {
                stack.pop();
            } else {
                break;
            }
        }

        match stack.last().cloned() {
            None => {
                roots.push(block);
                stack.push((vec![roots.len() - 1], section.level));
            }
            Some((parent_path, _)) => {
                let parent = block_at_mut(&mut roots, &parent_path);
                parent.children.push(block);
                let child_idx = parent.children.len() - 1;
                let mut child_path = parent_path;
                child_path.push(child_idx);
                stack.push((child_path, section.level));
            }
        }
    }

    roots
}

fn block_at_mut<'a>(roots: &'a mut [Block], path: &[usize]) -> &'a mut Block {
    let mut block = &mut roots[path[0]];
    for &idx in &path[1..] {
        block = &mut block.children[idx];
    }
    block
}

/// Extract a sentinel identifier from content. Returns the identifier and
/// the content with every sentinel stripped (and trimmed), or `None` and the
/// content untouched.
pub fn extract_uuid(content: &str) -> (Option<String>, String) {
    match SENTINEL_RE.captures(content) {
        Some(caps) => {
            let uuid = caps[1].to_string();
            // Stripping a heading-line sentinel leaves a dangling space;
            // tidy line ends so the clean content round-trips.
            let stripped = SENTINEL_RE.replace_all(content, "");
            let clean = stripped
                .lines()
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n");
            (Some(uuid), clean.trim().to_string())
        }
        None => (None, content.to_string()),
    }
}

/// Embed an identifier sentinel into content. Heading blocks carry it at the
/// end of the heading line; anything else gets a standalone leading line.
pub fn embed_uuid(content: &str, uuid: &str) -> String {
    let comment = format!("<!-- id: {uuid} -->");
    let mut lines: Vec<&str> = content.split('\n').collect();
    if let Some(first) = lines.first() {
        if heading_level(first) > 0 {
            let annotated = format!("{} {}", first.trim(), comment);
            lines[0] = &annotated;
            return lines.join("\n");
        }
    }
    format!("{comment}\n{content}")
}

/// Sentinel identifier if present, otherwise the deterministic fallback.
pub fn resolve_identity(rel_path: &str, line_index: usize, content: &str) -> (String, String) {
    let (uuid, clean) = extract_uuid(content);
    match uuid {
        Some(uuid) => (uuid, clean),
        None => (deterministic_uuid(rel_path, line_index), clean),
    }
}

/// Stable identifier derived from `<rel_path>:<line_index>`: SHA-256, first
/// 32 hex chars formatted as 8-4-4-4-12.
pub fn deterministic_uuid(rel_path: &str, line_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{rel_path}:{line_index}").as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
