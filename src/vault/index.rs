//! Backlink reverse index: for every `[[target]]` occurrence anywhere in a
//! page's block tree, record which page and block carried it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::parser;
use crate::types::{Block, BlockSummary};

use super::CachedPage;

/// One incoming reference: the linking page (lowercased canonical name) and
/// the block the link appears in.
#[derive(Debug, Clone)]
pub(crate) struct BacklinkEntry {
    pub from_page: String,
    pub block: BlockSummary,
}

/// lowercased target name → incoming references.
pub(crate) type BacklinkMap = HashMap<String, Vec<BacklinkEntry>>;

/// Walk every distinct page's block tree and build the reverse index.
pub(crate) fn build_backlinks(pages: &HashMap<String, Arc<CachedPage>>) -> BacklinkMap {
    let mut index = BacklinkMap::new();
    let mut seen = HashSet::new();
    for page in pages.values() {
        if !seen.insert(page.lower_name.clone()) {
            continue; // alias entry for a page already scanned
        }
        scan_blocks(&page.lower_name, &page.blocks, &mut index);
    }
    index
}

/// Record one page's outgoing links into an existing index. The caller must
/// have removed the page's previous entries first.
pub(crate) fn add_page_backlinks(page: &CachedPage, index: &mut BacklinkMap) {
    scan_blocks(&page.lower_name, &page.blocks, index);
}

/// Drop every entry sourced from `lower_name`. `targets` bounds the walk to
/// the keys that page actually linked to.
pub(crate) fn remove_page_backlinks(
    lower_name: &str,
    targets: &HashSet<String>,
    index: &mut BacklinkMap,
) {
    for target in targets {
        if let Some(entries) = index.get_mut(target) {
            entries.retain(|e| e.from_page != lower_name);
            if entries.is_empty() {
                index.remove(target);
            }
        }
    }
}

/// The lowercased set of `[[target]]` names a block tree links to.
pub(crate) fn collect_link_targets(blocks: &[Block]) -> HashSet<String> {
    let mut targets = HashSet::new();
    walk_targets(blocks, &mut targets);
    targets
}

fn walk_targets(blocks: &[Block], targets: &mut HashSet<String>) {
    for block in blocks {
        for link in parser::extract_links(&block.content) {
            targets.insert(link.to_lowercase());
        }
        walk_targets(&block.children, targets);
    }
}

fn scan_blocks(source: &str, blocks: &[Block], index: &mut BacklinkMap) {
    for block in blocks {
        for link in parser::extract_links(&block.content) {
            index
                .entry(link.to_lowercase())
                .or_default()
                .push(BacklinkEntry {
                    from_page: source.to_string(),
                    block: BlockSummary::of(block),
                });
        }
        scan_blocks(source, &block.children, index);
    }
}
