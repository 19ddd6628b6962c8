//! Graph analysis operations, served from the TTL-cached link graph.

use std::sync::Arc;

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::graph::algorithms::{Cluster, ConnectionResult, GapReport, Overview};
use crate::graph::GraphCache;
use crate::Config;

pub struct Analyze {
    cache: GraphCache,
    bfs_max_paths: usize,
}

impl Analyze {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Analyze {
            cache: GraphCache::new(backend, config.graph_cache_ttl),
            bfs_max_paths: config.bfs_max_paths,
        }
    }

    /// Global statistics: totals, orphan count, namespace histogram, and
    /// the top-10 connectivity leaders.
    pub fn graph_overview(&self, token: &CancelToken) -> Result<Overview> {
        Ok(self.cache.get(token)?.overview())
    }

    /// How two pages connect: direct link, BFS paths (default depth 5),
    /// and shared neighbors.
    pub fn find_connections(
        &self,
        token: &CancelToken,
        from: &str,
        to: &str,
        max_depth: Option<usize>,
    ) -> Result<ConnectionResult> {
        let graph = self.cache.get(token)?;
        Ok(graph.find_connections(from, to, max_depth.unwrap_or(5), self.bfs_max_paths))
    }

    /// Orphans, dead-ends, and weakly-linked pages; journals excluded.
    pub fn knowledge_gaps(&self, token: &CancelToken) -> Result<GapReport> {
        Ok(self.cache.get(token)?.knowledge_gaps())
    }

    /// Undirected connected components, largest first.
    pub fn topic_clusters(&self, token: &CancelToken) -> Result<Vec<Cluster>> {
        Ok(self.cache.get(token)?.topic_clusters())
    }

    /// Drop the cached graph so the next read rebuilds.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }
}
