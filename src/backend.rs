//! The read/write contract every knowledge-graph backend implements, plus
//! optional capability traits a backend may support natively. The local
//! vault implements all of them; a remote backend only has to satisfy
//! `Backend` and the query surface degrades gracefully (capability lookups
//! return `None` and callers fall back to brute-force scans or report
//! `Unsupported`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::{BackLink, Block, Page};
use crate::vault::search_index::SearchHit;

/// Outcome of a page rename: link propagation is best-effort, so partial
/// failures are reported, never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameReport {
    pub pages_updated: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failed_pages: Vec<String>,
}

/// Blocks carrying a given tag, grouped by page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagResult {
    pub page: String,
    pub blocks: Vec<Block>,
}

/// A page matched by a property query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyResult {
    pub name: String,
    pub properties: BTreeMap<String, serde_yaml::Value>,
}

/// A journal page with blocks matching a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalResult {
    pub date: String,
    pub page: String,
    pub blocks: Vec<Block>,
}

/// Core read/write operations.
pub trait Backend: Send + Sync {
    /// Backend reachable and sane (vault root exists and is a directory).
    fn ping(&self, token: &CancelToken) -> Result<()>;

    /// Every distinct page, aliases deduplicated.
    fn all_pages(&self, token: &CancelToken) -> Result<Vec<Page>>;

    fn get_page(&self, token: &CancelToken, name: &str) -> Result<Option<Page>>;

    fn page_blocks(&self, token: &CancelToken, name: &str) -> Result<Option<Vec<Block>>>;

    /// Block by identifier together with its owning page's display name.
    fn get_block(&self, token: &CancelToken, uuid: &str) -> Result<Option<(String, Block)>>;

    fn backlinks(&self, token: &CancelToken, name: &str) -> Result<Vec<BackLink>>;

    // Write operations. All of them fail with `ReadOnly` when the backend is
    // configured read-only, and with `NotFound` for missing targets.

    fn create_page(
        &self,
        token: &CancelToken,
        name: &str,
        properties: Option<BTreeMap<String, serde_yaml::Value>>,
    ) -> Result<Page>;

    fn append_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block>;

    fn prepend_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block>;

    /// Insert `content` as a child of the block identified by `parent_uuid`.
    fn insert_block(&self, token: &CancelToken, parent_uuid: &str, content: &str)
        -> Result<Block>;

    fn update_block(&self, token: &CancelToken, uuid: &str, content: &str) -> Result<()>;

    fn remove_block(&self, token: &CancelToken, uuid: &str) -> Result<()>;

    /// Move a block before or after a target block, same-page or cross-page.
    fn move_block(
        &self,
        token: &CancelToken,
        uuid: &str,
        target_uuid: &str,
        before: bool,
    ) -> Result<()>;

    fn delete_page(&self, token: &CancelToken, name: &str) -> Result<()>;

    fn rename_page(&self, token: &CancelToken, old: &str, new: &str) -> Result<RenameReport>;

    /// Monotonic counter bumped by every completed mutation; lets derived
    /// caches (the link graph) invalidate without a callback channel. A
    /// backend without mutation tracking may return a constant.
    fn mutation_generation(&self) -> u64 {
        0
    }

    // Capability discovery. Defaults mean "not supported here".

    fn full_text(&self) -> Option<&dyn FullTextSearch> {
        None
    }

    fn tag_search(&self) -> Option<&dyn TagSearch> {
        None
    }

    fn property_search(&self) -> Option<&dyn PropertySearch> {
        None
    }

    fn journal_search(&self) -> Option<&dyn JournalSearch> {
        None
    }
}

/// Indexed full-text search (AND semantics over tokenized terms).
pub trait FullTextSearch: Send + Sync {
    fn full_text_search(
        &self,
        token: &CancelToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// Native tag lookup.
pub trait TagSearch: Send + Sync {
    fn find_blocks_by_tag(&self, token: &CancelToken, tag: &str) -> Result<Vec<TagResult>>;
}

/// Native frontmatter property lookup with comparison operators.
pub trait PropertySearch: Send + Sync {
    fn find_by_property(
        &self,
        token: &CancelToken,
        key: &str,
        value: &str,
        operator: &str,
    ) -> Result<Vec<PropertyResult>>;
}

/// Native search restricted to journal pages, with a date window.
pub trait JournalSearch: Send + Sync {
    fn search_journals(
        &self,
        token: &CancelToken,
        query: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<JournalResult>>;
}
