use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A page is one `.md` file under the vault root. The canonical name is the
/// slash-joined relative path without the extension; lookups lowercase it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub name: String,
    /// Same as `name` but preserving the on-disk casing.
    pub display_name: String,
    pub journal: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub properties: Option<BTreeMap<String, serde_yaml::Value>>,
    /// File mtime in milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Page {
    /// Aliases declared in the frontmatter `aliases` list.
    pub fn aliases(&self) -> Vec<String> {
        let Some(props) = &self.properties else {
            return Vec::new();
        };
        let Some(serde_yaml::Value::Sequence(seq)) = props.get("aliases") else {
            return Vec::new();
        };
        seq.iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect()
    }
}

/// A heading-delimited section of a page. Pre-heading content forms root
/// blocks; a heading owns everything below it down to the next heading at an
/// equal or shallower level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub uuid: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Block>,
}

impl Block {
    /// Total number of blocks in a tree, children included.
    pub fn count_tree(blocks: &[Block]) -> usize {
        blocks
            .iter()
            .map(|b| 1 + Self::count_tree(&b.children))
            .sum()
    }

    /// Depth-first search for a block by identifier.
    pub fn find<'a>(blocks: &'a [Block], uuid: &str) -> Option<&'a Block> {
        for block in blocks {
            if block.uuid == uuid {
                return Some(block);
            }
            if let Some(found) = Self::find(&block.children, uuid) {
                return Some(found);
            }
        }
        None
    }

    /// Collect every identifier in a tree, depth-first.
    pub fn collect_uuids(blocks: &[Block], out: &mut Vec<String>) {
        for block in blocks {
            out.push(block.uuid.clone());
            Self::collect_uuids(&block.children, out);
        }
    }

    /// Ancestor chain from a root down to (excluding) the block with `uuid`.
    pub fn ancestors_of(blocks: &[Block], uuid: &str) -> Option<Vec<BlockSummary>> {
        fn walk(blocks: &[Block], uuid: &str, chain: &mut Vec<BlockSummary>) -> bool {
            for block in blocks {
                if block.uuid == uuid {
                    return true;
                }
                chain.push(BlockSummary::of(block));
                if walk(&block.children, uuid, chain) {
                    return true;
                }
                chain.pop();
            }
            false
        }

        let mut chain = Vec::new();
        if walk(blocks, uuid, &mut chain) {
            Some(chain)
        } else {
            None
        }
    }
}

/// Lightweight block reference used for context (backlinks, ancestors,
/// siblings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub uuid: String,
    pub content: String,
}

impl BlockSummary {
    pub fn of(block: &Block) -> Self {
        Self {
            uuid: block.uuid.clone(),
            content: block.content.clone(),
        }
    }
}

/// Structured data extracted from a block's raw content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContent {
    pub links: Vec<String>,
    pub block_references: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority: Option<String>,
}

/// A block augmented with parser output, recursively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedBlock {
    pub uuid: String,
    pub content: String,
    pub parsed: ParsedContent,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<EnrichedBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ancestors: Vec<BlockSummary>,
}

/// An incoming link from another page, with the blocks that carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackLink {
    pub page_name: String,
    pub blocks: Vec<BlockSummary>,
}

/// A page together with its enriched block tree and link data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPage {
    #[serde(flatten)]
    pub page: Page,
    pub blocks: Vec<EnrichedBlock>,
    pub outgoing_links: Vec<String>,
    pub backlinks: Vec<BackLink>,
    pub block_count: usize,
    pub link_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(uuid: &str, children: Vec<Block>) -> Block {
        Block {
            uuid: uuid.to_string(),
            content: format!("content of {uuid}"),
            children,
        }
    }

    #[test]
    fn test_count_tree_includes_children() {
        let tree = vec![block("a", vec![block("b", vec![block("c", vec![])])]), block("d", vec![])];
        assert_eq!(Block::count_tree(&tree), 4);
    }

    #[test]
    fn test_find_descends_into_children() {
        let tree = vec![block("a", vec![block("b", vec![block("c", vec![])])])];
        assert_eq!(Block::find(&tree, "c").map(|b| b.uuid.as_str()), Some("c"));
        assert!(Block::find(&tree, "zzz").is_none());
    }

    #[test]
    fn test_ancestors_of_builds_chain_from_root() {
        let tree = vec![block("a", vec![block("b", vec![block("c", vec![])])])];
        let chain = Block::ancestors_of(&tree, "c").unwrap();
        let uuids: Vec<&str> = chain.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["a", "b"]);

        assert_eq!(Block::ancestors_of(&tree, "a").unwrap().len(), 0);
        assert!(Block::ancestors_of(&tree, "missing").is_none());
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let parsed = ParsedContent {
            links: vec!["x".into()],
            block_references: vec!["019442b1-1f30-4c8a-9c1e-8a70d2f4a111".into()],
            tags: Vec::new(),
            properties: BTreeMap::new(),
            marker: None,
            priority: Some("A".into()),
        };
        let json = serde_json::to_value(&parsed).unwrap();
        assert!(json.get("blockReferences").is_some());
        assert!(json.get("priority").is_some());
        // Absent marker and empty properties are omitted entirely.
        assert!(json.get("marker").is_none());
        assert!(json.get("properties").is_none());

        let page = Page {
            name: "n".into(),
            display_name: "N".into(),
            journal: false,
            properties: None,
            created_at: 1,
            updated_at: 2,
        };
        let enriched = EnrichedPage {
            page,
            blocks: Vec::new(),
            outgoing_links: Vec::new(),
            backlinks: Vec::new(),
            block_count: 0,
            link_count: 0,
        };
        let json = serde_json::to_value(&enriched).unwrap();
        // The page flattens into the top level.
        assert!(json.get("displayName").is_some());
        assert!(json.get("outgoingLinks").is_some());
        assert!(json.get("blockCount").is_some());
    }

    #[test]
    fn test_aliases_reads_frontmatter_sequence() {
        let yaml: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str("aliases:\n  - Roadmap\n  - The Plan\n").unwrap();
        let page = Page {
            name: "projects/roadmap".into(),
            display_name: "projects/Roadmap".into(),
            journal: false,
            properties: Some(yaml),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(page.aliases(), vec!["Roadmap".to_string(), "The Plan".to_string()]);
    }
}
