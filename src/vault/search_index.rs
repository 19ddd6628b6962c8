//! Inverted full-text index over block content.
//!
//! Terms map to posting lists of block references; a parallel page→terms map
//! makes single-page removal proportional to the page's own vocabulary. The
//! structure carries no lock of its own; it lives inside the vault's index
//! set behind the shared read-write lock.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::parser;
use crate::types::Block;

#[derive(Debug, Clone)]
struct Posting {
    page_name: String,
    uuid: String,
    content: String,
}

/// A block that matched a search query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub page: String,
    pub uuid: String,
    pub content: String,
}

#[derive(Default)]
pub struct SearchIndex {
    index: HashMap<String, Vec<Posting>>,
    page_terms: HashMap<String, HashSet<String>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and start over.
    pub fn clear(&mut self) {
        self.index.clear();
        self.page_terms.clear();
    }

    /// Index one page's block tree. Call `remove_page` first when re-indexing.
    pub fn index_page(&mut self, lower_name: &str, page_name: &str, blocks: &[Block]) {
        let mut terms = HashSet::new();
        self.index_blocks(blocks, page_name, &mut terms);
        self.page_terms.insert(lower_name.to_string(), terms);
    }

    /// Remove and re-add a single page.
    pub fn reindex_page(&mut self, lower_name: &str, page_name: &str, blocks: &[Block]) {
        self.remove_page(lower_name);
        self.index_page(lower_name, page_name, blocks);
    }

    /// Remove a page's postings. O(number of terms in the page).
    pub fn remove_page(&mut self, lower_name: &str) {
        let Some(terms) = self.page_terms.remove(lower_name) else {
            return;
        };
        for term in terms {
            if let Some(postings) = self.index.get_mut(&term) {
                postings.retain(|p| p.page_name.to_lowercase() != lower_name);
                if postings.is_empty() {
                    self.index.remove(&term);
                }
            }
        }
    }

    /// Find blocks containing ALL query terms. The rarest term's posting
    /// list drives the scan; the others are intersected as UUID sets.
    /// Ordering beyond the limit is unspecified; use `sort_by_relevance`
    /// for term-frequency ranking.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let limit = if limit == 0 { 20 } else { limit };

        let rarest = terms
            .iter()
            .min_by_key(|t| self.index.get(*t).map_or(0, Vec::len))
            .cloned()
            .unwrap_or_default();

        let Some(candidates) = self.index.get(&rarest) else {
            return Vec::new();
        };

        let other_sets: Vec<HashSet<&str>> = terms
            .iter()
            .filter(|t| **t != rarest)
            .map(|t| {
                self.index
                    .get(t)
                    .map(|postings| postings.iter().map(|p| p.uuid.as_str()).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut hits = Vec::new();
        for posting in candidates {
            if !other_sets.iter().all(|set| set.contains(posting.uuid.as_str())) {
                continue;
            }
            hits.push(SearchHit {
                page: posting.page_name.clone(),
                uuid: posting.uuid.clone(),
                content: posting.content.clone(),
            });
            if hits.len() >= limit {
                break;
            }
        }
        hits
    }

    fn index_blocks(&mut self, blocks: &[Block], page_name: &str, terms: &mut HashSet<String>) {
        for block in blocks {
            let mut block_terms = tokenize(&block.content);

            // Link targets and tags are searchable terms too.
            let parsed = parser::parse(&block.content);
            for link in &parsed.links {
                block_terms.extend(tokenize(link));
            }
            for tag in &parsed.tags {
                block_terms.extend(tokenize(tag));
            }

            let mut seen = HashSet::new();
            for term in block_terms {
                if !seen.insert(term.clone()) {
                    continue;
                }
                terms.insert(term.clone());
                self.index.entry(term).or_default().push(Posting {
                    page_name: page_name.to_string(),
                    uuid: block.uuid.clone(),
                    content: block.content.clone(),
                });
            }

            self.index_blocks(&block.children, page_name, terms);
        }
    }
}

/// Split text into lowercase search terms: markdown syntax becomes spaces,
/// words split on anything that is not a letter, digit, `-`, `_`, or a
/// non-ASCII rune, and terms shorter than two bytes are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut cleaned = text.to_string();
    for syntax in ["[[", "]]", "((", "))", "#", "::", "**", "__", "`"] {
        cleaned = cleaned.replace(syntax, " ");
    }
    let cleaned = cleaned.to_lowercase();

    cleaned
        .split(|c: char| !is_word_char(c))
        .filter(|w| w.len() >= 2)
        .map(|w| w.to_string())
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || !c.is_ascii()
}

/// Order hits by term-frequency hit count, most hits first.
pub fn sort_by_relevance(hits: &mut [SearchHit], query: &str) {
    let terms = tokenize(query);
    hits.sort_by_key(|hit| {
        let lower = hit.content.to_lowercase();
        let score: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
        std::cmp::Reverse(score)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(uuid: &str, content: &str) -> Block {
        Block {
            uuid: uuid.to_string(),
            content: content.to_string(),
            children: Vec::new(),
        }
    }

    #[test]
    fn test_tokenize_strips_markdown_syntax() {
        let terms = tokenize("see [[Graph Theory]] and #tags with `code` **bold**");
        assert!(terms.contains(&"graph".to_string()));
        assert!(terms.contains(&"theory".to_string()));
        assert!(terms.contains(&"tags".to_string()));
        assert!(terms.contains(&"code".to_string()));
        assert!(!terms.iter().any(|t| t.contains('[') || t.contains('#')));
    }

    #[test]
    fn test_tokenize_drops_single_char_terms() {
        let terms = tokenize("a is to b");
        assert_eq!(terms, vec!["is", "to"]);
    }

    #[test]
    fn test_search_requires_all_terms() {
        let mut idx = SearchIndex::new();
        idx.index_page(
            "first",
            "first",
            &[block("u1", "Hello world this is a test")],
        );
        idx.index_page("second", "second", &[block("u2", "Hello from the second page")]);

        let hits = idx.search("hello world", 20);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "u1");

        let hits = idx.search("hello", 20);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_search_finds_link_targets_as_terms() {
        let mut idx = SearchIndex::new();
        idx.index_page("notes", "notes", &[block("u1", "see [[Quantum Computing]]")]);
        let hits = idx.search("quantum", 20);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_remove_page_clears_postings() {
        let mut idx = SearchIndex::new();
        idx.index_page("gone", "gone", &[block("u1", "ephemeral content here")]);
        assert_eq!(idx.search("ephemeral", 20).len(), 1);
        idx.remove_page("gone");
        assert!(idx.search("ephemeral", 20).is_empty());
        assert!(idx.index.is_empty());
    }

    #[test]
    fn test_reindex_replaces_old_terms() {
        let mut idx = SearchIndex::new();
        idx.index_page("p", "p", &[block("u1", "old wording")]);
        idx.reindex_page("p", "p", &[block("u1", "new wording")]);
        assert!(idx.search("old", 20).is_empty());
        assert_eq!(idx.search("new", 20).len(), 1);
    }

    #[test]
    fn test_search_respects_limit() {
        let mut idx = SearchIndex::new();
        let blocks: Vec<Block> = (0..30)
            .map(|i| block(&format!("u{i}"), "repeated phrase"))
            .collect();
        idx.index_page("p", "p", &blocks);
        assert_eq!(idx.search("repeated phrase", 5).len(), 5);
    }

    #[test]
    fn test_children_are_indexed() {
        let mut idx = SearchIndex::new();
        let mut parent = block("u1", "# Heading");
        parent.children.push(block("u2", "nested insight"));
        idx.index_page("p", "p", &[parent]);
        let hits = idx.search("nested insight", 20);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, "u2");
    }

    #[test]
    fn test_sort_by_relevance_orders_by_hit_count() {
        let mut hits = vec![
            SearchHit { page: "a".into(), uuid: "u1".into(), content: "term".into() },
            SearchHit { page: "b".into(), uuid: "u2".into(), content: "term term term".into() },
        ];
        sort_by_relevance(&mut hits, "term");
        assert_eq!(hits[0].uuid, "u2");
    }
}
