//! The query surface: structured operations the transport layer exposes.
//! Handlers are thin: input validation, dispatch to the backend or the
//! graph cache, and output shaping. Missing pages and blocks come back as
//! empty structured results from reads; writes return errors.

pub mod analyze;
pub mod journal;
pub mod navigate;
pub mod search;
pub mod write;

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::Backend;
use crate::parser;
use crate::types::{Block, BlockSummary, EnrichedBlock};
use crate::Config;

pub use analyze::Analyze;
pub use journal::Journal;
pub use navigate::Navigate;
pub use search::Search;
pub use write::Write;

/// Bundles every handler over one backend. The transport layer holds one of
/// these and routes calls.
pub struct Engine {
    pub navigate: Navigate,
    pub search: Search,
    pub analyze: Analyze,
    pub journal: Journal,
    pub write: Write,
}

impl Engine {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Engine {
            navigate: Navigate::new(Arc::clone(&backend)),
            search: Search::new(Arc::clone(&backend), config.search_default_limit),
            analyze: Analyze::new(Arc::clone(&backend), config),
            journal: Journal::new(Arc::clone(&backend), config.daily_folder.clone()),
            write: Write::new(backend),
        }
    }
}

/// Recursively augment a block tree with parser output.
pub(crate) fn enrich_block_tree(blocks: &[Block]) -> Vec<EnrichedBlock> {
    blocks.iter().map(enrich_block).collect()
}

pub(crate) fn enrich_block(block: &Block) -> EnrichedBlock {
    EnrichedBlock {
        uuid: block.uuid.clone(),
        content: block.content.clone(),
        parsed: parser::parse(&block.content),
        children: enrich_block_tree(&block.children),
        ancestors: Vec::new(),
    }
}

/// Every `[[target]]` in a tree, in order of first occurrence, deduplicated.
pub(crate) fn collect_all_links(blocks: &[Block]) -> Vec<String> {
    fn walk(blocks: &[Block], seen: &mut HashSet<String>, out: &mut Vec<String>) {
        for block in blocks {
            for link in parser::extract_links(&block.content) {
                if seen.insert(link.clone()) {
                    out.push(link);
                }
            }
            walk(&block.children, seen, out);
        }
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    walk(blocks, &mut seen, &mut out);
    out
}

/// Parent chain (root first) and ±1 siblings of the block with `uuid`.
pub(crate) fn locate_context(
    blocks: &[Block],
    uuid: &str,
) -> Option<(Vec<BlockSummary>, Vec<BlockSummary>)> {
    fn walk(
        blocks: &[Block],
        uuid: &str,
        chain: &mut Vec<BlockSummary>,
    ) -> Option<Vec<BlockSummary>> {
        for (i, block) in blocks.iter().enumerate() {
            if block.uuid == uuid {
                let mut siblings = Vec::new();
                if i > 0 {
                    siblings.push(BlockSummary::of(&blocks[i - 1]));
                }
                if i + 1 < blocks.len() {
                    siblings.push(BlockSummary::of(&blocks[i + 1]));
                }
                return Some(siblings);
            }
            chain.push(BlockSummary::of(block));
            if let Some(siblings) = walk(&block.children, uuid, chain) {
                return Some(siblings);
            }
            chain.pop();
        }
        None
    }

    let mut chain = Vec::new();
    walk(blocks, uuid, &mut chain).map(|siblings| (chain, siblings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(uuid: &str, content: &str, children: Vec<Block>) -> Block {
        Block {
            uuid: uuid.to_string(),
            content: content.to_string(),
            children,
        }
    }

    #[test]
    fn test_enrich_carries_parser_output_recursively() {
        let tree = vec![block(
            "a",
            "see [[Target]]",
            vec![block("b", "#tagged child", vec![])],
        )];
        let enriched = enrich_block_tree(&tree);
        assert_eq!(enriched[0].parsed.links, vec!["Target"]);
        assert_eq!(enriched[0].children[0].parsed.tags, vec!["tagged"]);
    }

    #[test]
    fn test_collect_all_links_recurses_and_dedups() {
        let tree = vec![block(
            "a",
            "[[One]] and [[Two]]",
            vec![block("b", "[[Two]] and [[Three]]", vec![])],
        )];
        assert_eq!(collect_all_links(&tree), vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_locate_context_finds_chain_and_siblings() {
        let tree = vec![block(
            "root",
            "# Root",
            vec![
                block("first", "first child", vec![]),
                block("mid", "middle child", vec![]),
                block("last", "last child", vec![]),
            ],
        )];
        let (chain, siblings) = locate_context(&tree, "mid").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].uuid, "root");
        let sibling_uuids: Vec<&str> = siblings.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(sibling_uuids, vec!["first", "last"]);

        assert!(locate_context(&tree, "missing").is_none());
    }
}
