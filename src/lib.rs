//! notegraph: a local knowledge-graph engine over a markdown note vault.
//!
//! A vault is a directory of block-structured `.md` files. The engine
//! parses them into page/block trees with stable block identities, keeps
//! four in-memory indices coherent under a file watcher (pages, block ids,
//! backlinks, inverted full-text index), answers structural queries over a
//! TTL-cached link graph, and applies mutations through atomic temp-file
//! writes that preserve block identity and propagate renames.
//!
//! The transport layer (MCP, CLI, whatever fronts this) is not here: it
//! holds a [`query::Engine`] and routes calls.

pub mod backend;
pub mod cancel;
pub mod error;
pub mod graph;
pub mod parser;
pub mod query;
pub mod types;
pub mod vault;

#[cfg(test)]
mod vault_ops_test;

#[cfg(test)]
mod rename_propagation_test;



#[cfg(test)]
mod watcher_sync_test;

use std::path::PathBuf;
use std::time::Duration;

pub use backend::{Backend, RenameReport};
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use query::Engine;
pub use types::{BackLink, Block, BlockSummary, EnrichedBlock, EnrichedPage, Page, ParsedContent};
pub use vault::Vault;

/// Engine configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the vault.
    pub vault_path: PathBuf,
    /// Subfolder whose pages are treated as journals.
    pub daily_folder: String,
    /// Lifetime of the cached link graph.
    pub graph_cache_ttl: Duration,
    /// Cap on search results when the caller gives no limit.
    pub search_default_limit: usize,
    /// Cap on paths returned by BFS path enumeration.
    pub bfs_max_paths: usize,
    /// When set, every mutation fails with `Error::ReadOnly`.
    pub read_only: bool,
}

impl Config {
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Config {
            vault_path: vault_path.into(),
            daily_folder: "daily notes".to_string(),
            graph_cache_ttl: Duration::from_secs(30),
            search_default_limit: 20,
            bfs_max_paths: 10,
            read_only: false,
        }
    }
}
