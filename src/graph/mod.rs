//! The link graph: a derived, transient view over the index set. Built on
//! demand from the backend, cached with a TTL, and invalidated by every
//! mutation via the backend's generation counter.

pub mod algorithms;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// The slice of page state the graph needs.
#[derive(Debug, Clone)]
pub(crate) struct GraphPage {
    pub name: String,
    pub journal: bool,
}

pub struct Graph {
    /// source (lowercased) → target (lowercased) → original casing of the
    /// target's first occurrence.
    pub(crate) forward: HashMap<String, HashMap<String, String>>,
    /// target (lowercased) → sources (lowercased) linking to it.
    pub(crate) backward: HashMap<String, HashSet<String>>,
    /// lowercased canonical name → page info. Link targets with no entry
    /// here are ghost vertices.
    pub(crate) pages: HashMap<String, GraphPage>,
    /// lowercased canonical name → recursive block count.
    pub(crate) block_counts: HashMap<String, usize>,
}

impl Graph {
    /// Fetch every page and its block tree from the backend and construct
    /// forward/backward edges in one pass.
    pub fn build(backend: &dyn Backend, token: &CancelToken) -> Result<Self> {
        let pages = backend.all_pages(token)?;

        let mut graph = Graph {
            forward: HashMap::new(),
            backward: HashMap::new(),
            pages: HashMap::new(),
            block_counts: HashMap::new(),
        };

        for page in pages {
            if page.name.is_empty() {
                continue;
            }
            token.check()?;
            let key = page.name.to_lowercase();
            graph.pages.insert(
                key.clone(),
                GraphPage {
                    name: page.display_name.clone(),
                    journal: page.journal,
                },
            );
            // Pages with no links still get a vertex.
            graph.forward.entry(key.clone()).or_default();

            let Some(blocks) = backend.page_blocks(token, &page.name)? else {
                continue;
            };
            graph
                .block_counts
                .insert(key.clone(), crate::types::Block::count_tree(&blocks));
            collect_edges(&blocks, &key, &mut graph);
        }

        Ok(graph)
    }

    pub fn out_degree(&self, name: &str) -> usize {
        self.forward
            .get(&name.to_lowercase())
            .map_or(0, HashMap::len)
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.backward
            .get(&name.to_lowercase())
            .map_or(0, HashSet::len)
    }

    pub fn total_degree(&self, name: &str) -> usize {
        self.out_degree(name) + self.in_degree(name)
    }

    /// Display name for a vertex key; ghost vertices fall back to the key.
    pub(crate) fn display_name(&self, key: &str) -> String {
        self.pages
            .get(key)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| key.to_string())
    }

    /// Undirected neighbor keys: forward targets plus backward sources.
    pub(crate) fn neighbors(&self, key: &str) -> HashSet<String> {
        let mut neighbors = HashSet::new();
        if let Some(targets) = self.forward.get(key) {
            neighbors.extend(targets.keys().cloned());
        }
        if let Some(sources) = self.backward.get(key) {
            neighbors.extend(sources.iter().cloned());
        }
        neighbors
    }
}

fn collect_edges(blocks: &[crate::types::Block], source_key: &str, graph: &mut Graph) {
    for block in blocks {
        for link in crate::parser::extract_links(&block.content) {
            let link_key = link.to_lowercase();
            graph
                .forward
                .entry(source_key.to_string())
                .or_default()
                .entry(link_key.clone())
                .or_insert(link);
            graph
                .backward
                .entry(link_key)
                .or_default()
                .insert(source_key.to_string());
        }
        collect_edges(&block.children, source_key, graph);
    }
}

struct CachedGraph {
    graph: Arc<Graph>,
    built: Instant,
    generation: u64,
}

/// TTL + generation cache around graph construction. Reads within the TTL
/// reuse the cached graph unless a mutation bumped the backend's generation
/// counter in the meantime.
pub struct GraphCache {
    backend: Arc<dyn Backend>,
    ttl: Duration,
    state: Mutex<Option<CachedGraph>>,
}

impl GraphCache {
    pub fn new(backend: Arc<dyn Backend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub fn get(&self, token: &CancelToken) -> Result<Arc<Graph>> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| cache_poisoned(&e.to_string()))?;

        let generation = self.backend.mutation_generation();
        if let Some(cached) = state.as_ref() {
            if cached.built.elapsed() < self.ttl && cached.generation == generation {
                return Ok(Arc::clone(&cached.graph));
            }
        }

        let graph = Arc::new(Graph::build(self.backend.as_ref(), token)?);
        *state = Some(CachedGraph {
            graph: Arc::clone(&graph),
            built: Instant::now(),
            generation,
        });
        Ok(graph)
    }

    /// Force the next `get` to rebuild.
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = None;
        }
    }
}

fn cache_poisoned(detail: &str) -> Error {
    Error::io(
        "graph cache lock",
        std::io::Error::new(std::io::ErrorKind::Other, detail.to_string()),
    )
}
