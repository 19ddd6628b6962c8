//! Graph analytics: overview statistics, bounded BFS path enumeration,
//! degree-based gap analysis, and undirected connected components.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::Graph;

/// Global graph statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_pages: usize,
    pub total_blocks: usize,
    /// Sum of out-degrees. Links to ghost vertices count here even though
    /// ghosts never appear in page enumerations.
    pub total_links: usize,
    pub journal_pages: usize,
    pub orphan_pages: usize,
    pub most_connected: Vec<PageStat>,
    pub most_linked_to: Vec<PageStat>,
    pub namespaces: BTreeMap<String, usize>,
}

/// A page with its connectivity numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStat {
    pub name: String,
    pub out_links: usize,
    pub in_links: usize,
    pub total_degree: usize,
    pub block_count: usize,
}

/// How two pages relate: direct link, BFS paths, shared neighbors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    pub from: String,
    pub to: String,
    pub directly_linked: bool,
    pub paths: Vec<Vec<String>>,
    pub shared_connections: Vec<String>,
}

/// Sparse areas of the graph, journal pages excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapReport {
    pub orphan_pages: Vec<String>,
    pub dead_end_pages: Vec<String>,
    pub weakly_linked: Vec<PageStat>,
}

/// A connected component of the undirected link graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub size: usize,
    pub pages: Vec<String>,
    pub hub: String,
}

impl Graph {
    /// Compute global statistics in one pass over the vertex set.
    pub fn overview(&self) -> Overview {
        let mut stats = Overview {
            total_pages: self.pages.len(),
            total_blocks: 0,
            total_links: 0,
            journal_pages: 0,
            orphan_pages: 0,
            most_connected: Vec::new(),
            most_linked_to: Vec::new(),
            namespaces: BTreeMap::new(),
        };

        let mut page_stats = Vec::with_capacity(self.pages.len());
        for (key, page) in &self.pages {
            if page.journal {
                stats.journal_pages += 1;
            }

            let out = self.out_degree(key);
            let inn = self.in_degree(key);
            stats.total_links += out;
            stats.total_blocks += self.block_counts.get(key).copied().unwrap_or(0);

            if out == 0 && inn == 0 {
                stats.orphan_pages += 1;
            }

            page_stats.push(PageStat {
                name: self.display_name(key),
                out_links: out,
                in_links: inn,
                total_degree: out + inn,
                block_count: self.block_counts.get(key).copied().unwrap_or(0),
            });

            if let Some((namespace, _)) = page.name.split_once('/') {
                *stats.namespaces.entry(namespace.to_string()).or_insert(0) += 1;
            }
        }

        // Stable sorts: ties keep insertion order.
        let mut by_degree = page_stats.clone();
        by_degree.sort_by(|a, b| b.total_degree.cmp(&a.total_degree));
        by_degree.truncate(10);
        stats.most_connected = by_degree;

        page_stats.sort_by(|a, b| b.in_links.cmp(&a.in_links));
        page_stats.truncate(10);
        stats.most_linked_to = page_stats;

        stats
    }

    /// Direct link check, BFS path enumeration (up to `max_paths`), and
    /// alphabetically sorted shared neighbors. A vertex already reported on
    /// a path is not repeated as a shared connection.
    pub fn find_connections(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
        max_paths: usize,
    ) -> ConnectionResult {
        let from_key = from.to_lowercase();
        let to_key = to.to_lowercase();
        let max_depth = if max_depth == 0 { 5 } else { max_depth };

        let directly_linked = self
            .forward
            .get(&from_key)
            .is_some_and(|targets| targets.contains_key(&to_key));

        let paths = self.bfs_paths(&from_key, &to_key, max_depth, max_paths);
        let on_paths: HashSet<String> = paths
            .iter()
            .flatten()
            .map(|name| name.to_lowercase())
            .collect();

        let from_neighbors = self.neighbors(&from_key);
        let to_neighbors = self.neighbors(&to_key);
        let mut shared: Vec<String> = from_neighbors
            .intersection(&to_neighbors)
            .filter(|n| **n != from_key && **n != to_key && !on_paths.contains(*n))
            .map(|n| self.display_name(n))
            .collect();
        shared.sort();

        ConnectionResult {
            from: self.display_name(&from_key),
            to: self.display_name(&to_key),
            directly_linked,
            paths,
            shared_connections: shared,
        }
    }

    /// Enumerate forward-edge paths from `from_key` to `to_key`. The
    /// visited set is shared across discoveries, so a vertex appears on at
    /// most one returned path; paths come out in non-decreasing length
    /// order, so the first is always a shortest.
    pub(crate) fn bfs_paths(
        &self,
        from_key: &str,
        to_key: &str,
        max_depth: usize,
        max_paths: usize,
    ) -> Vec<Vec<String>> {
        let mut queue = VecDeque::new();
        queue.push_back((from_key.to_string(), vec![self.display_name(from_key)]));
        let mut visited: HashSet<String> = HashSet::from([from_key.to_string()]);
        let mut paths = Vec::new();

        while let Some((key, path)) = queue.pop_front() {
            if path.len() > max_depth + 1 {
                break;
            }

            let Some(targets) = self.forward.get(&key) else {
                continue;
            };
            for linked_key in targets.keys() {
                if linked_key == to_key {
                    let mut found = path.clone();
                    found.push(self.display_name(linked_key));
                    paths.push(found);
                    if paths.len() >= max_paths {
                        return paths;
                    }
                    continue;
                }
                if !visited.contains(linked_key) && path.len() < max_depth {
                    visited.insert(linked_key.clone());
                    let mut next = path.clone();
                    next.push(self.display_name(linked_key));
                    queue.push_back((linked_key.clone(), next));
                }
            }
        }

        paths
    }

    /// Degree-based sparse-area report. Orphans and dead-ends are sorted
    /// alphabetically; weakly-linked pages by ascending total degree,
    /// truncated to 20.
    pub fn knowledge_gaps(&self) -> GapReport {
        let mut gaps = GapReport {
            orphan_pages: Vec::new(),
            dead_end_pages: Vec::new(),
            weakly_linked: Vec::new(),
        };

        for (key, page) in &self.pages {
            if page.journal {
                continue;
            }

            let out = self.out_degree(key);
            let inn = self.in_degree(key);
            let name = self.display_name(key);

            if out == 0 && inn == 0 {
                gaps.orphan_pages.push(name);
            } else if out == 0 && inn > 0 {
                gaps.dead_end_pages.push(name);
            } else if out + inn <= 2 {
                gaps.weakly_linked.push(PageStat {
                    name,
                    out_links: out,
                    in_links: inn,
                    total_degree: out + inn,
                    block_count: self.block_counts.get(key).copied().unwrap_or(0),
                });
            }
        }

        gaps.orphan_pages.sort();
        gaps.dead_end_pages.sort();
        gaps.weakly_linked.sort_by_key(|s| s.total_degree);
        gaps.weakly_linked.truncate(20);
        gaps
    }

    /// Connected components of the undirected link graph, journal pages and
    /// ghost vertices excluded. Singleton components are dropped; the hub
    /// is the member with the highest total degree, ties going to the
    /// first-discovered member.
    pub fn topic_clusters(&self) -> Vec<Cluster> {
        let mut visited = HashSet::new();
        let mut clusters = Vec::new();
        let mut cluster_id = 0;

        for (key, page) in &self.pages {
            if visited.contains(key) {
                continue;
            }
            if page.journal {
                visited.insert(key.clone());
                continue;
            }

            let component = self.undirected_component(key, &mut visited);
            if component.len() < 2 {
                continue;
            }

            let mut hub = component[0].clone();
            let mut hub_degree = self.total_degree(&hub);
            for member in &component[1..] {
                let degree = self.total_degree(member);
                if degree > hub_degree {
                    hub = member.clone();
                    hub_degree = degree;
                }
            }

            let mut names: Vec<String> =
                component.iter().map(|k| self.display_name(k)).collect();
            names.sort();

            clusters.push(Cluster {
                id: cluster_id,
                size: component.len(),
                pages: names,
                hub: self.display_name(&hub),
            });
            cluster_id += 1;
        }

        clusters.sort_by(|a, b| b.size.cmp(&a.size));
        clusters
    }

    /// BFS over the union of forward and backward edges, restricted to
    /// known non-journal pages. Returns members in discovery order.
    fn undirected_component(&self, start: &str, visited: &mut HashSet<String>) -> Vec<String> {
        let mut queue = VecDeque::from([start.to_string()]);
        visited.insert(start.to_string());
        let mut component = Vec::new();

        while let Some(current) = queue.pop_front() {
            component.push(current.clone());
            for neighbor in self.neighbors(&current) {
                if visited.contains(&neighbor) {
                    continue;
                }
                match self.pages.get(&neighbor) {
                    Some(page) if !page.journal => {
                        visited.insert(neighbor.clone());
                        queue.push_back(neighbor);
                    }
                    _ => {}
                }
            }
        }

        component
    }
}
