//! Search operations: full-text (indexed or brute-force), tag lookup, and
//! property queries.

use std::sync::Arc;

use serde::Serialize;

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::parser;
use crate::types::{Block, BlockSummary, ParsedContent};

use super::locate_context;

/// One search hit with enough context to orient the reader: the chain of
/// parent blocks and the immediate siblings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub page: String,
    pub uuid: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedContent>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parent_chain: Vec<BlockSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub siblings: Vec<BlockSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagMatch {
    pub page: String,
    pub uuid: String,
    pub content: String,
    pub parsed: ParsedContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagSearchResponse {
    pub tag: String,
    pub count: usize,
    pub results: Vec<TagMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyQueryResponse {
    pub property: String,
    pub value: String,
    pub operator: String,
    pub count: usize,
    pub results: Vec<crate::backend::PropertyResult>,
}

pub struct Search {
    backend: Arc<dyn Backend>,
    default_limit: usize,
}

impl Search {
    pub fn new(backend: Arc<dyn Backend>, default_limit: usize) -> Self {
        Self {
            backend,
            default_limit,
        }
    }

    /// Full-text search with AND semantics. Dispatches to the backend's
    /// inverted index when present, otherwise scans every page's block
    /// tree. Both paths produce the same schema.
    pub fn search(
        &self,
        token: &CancelToken,
        query: &str,
        limit: Option<usize>,
        compact: bool,
    ) -> Result<SearchResponse> {
        let limit = limit.unwrap_or(self.default_limit).max(1);

        let results = match self.backend.full_text() {
            Some(index) => self.search_indexed(token, index, query, limit, compact)?,
            None => self.search_brute_force(token, query, limit, compact)?,
        };

        Ok(SearchResponse {
            query: query.to_string(),
            count: results.len(),
            results,
        })
    }

    fn search_indexed(
        &self,
        token: &CancelToken,
        index: &dyn crate::backend::FullTextSearch,
        query: &str,
        limit: usize,
        compact: bool,
    ) -> Result<Vec<SearchMatch>> {
        let hits = index.full_text_search(token, query, limit)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let (parent_chain, siblings) = self
                .backend
                .page_blocks(token, &hit.page)?
                .and_then(|blocks| locate_context(&blocks, &hit.uuid))
                .unwrap_or_default();
            results.push(SearchMatch {
                parsed: (!compact).then(|| parser::parse(&hit.content)),
                page: hit.page,
                uuid: hit.uuid,
                content: hit.content,
                parent_chain,
                siblings,
            });
        }
        Ok(results)
    }

    /// Depth-first scan of every page with AND semantics over
    /// whitespace-split query terms.
    fn search_brute_force(
        &self,
        token: &CancelToken,
        query: &str,
        limit: usize,
        compact: bool,
    ) -> Result<Vec<SearchMatch>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        let mut results = Vec::new();
        for page in self.backend.all_pages(token)? {
            if results.len() >= limit {
                break;
            }
            if page.name.is_empty() {
                continue;
            }
            let Some(blocks) = self.backend.page_blocks(token, &page.name)? else {
                continue;
            };
            scan_blocks(
                &blocks,
                &terms,
                &page.display_name,
                &mut Vec::new(),
                compact,
                limit,
                &mut results,
            );
        }
        Ok(results)
    }

    /// Blocks carrying a tag, via the backend's tag capability when present,
    /// otherwise a brute-force scan.
    pub fn find_by_tag(&self, token: &CancelToken, tag: &str) -> Result<TagSearchResponse> {
        let grouped = match self.backend.tag_search() {
            Some(capability) => capability.find_blocks_by_tag(token, tag)?,
            None => self.tag_scan(token, tag)?,
        };

        let mut results = Vec::new();
        for group in grouped {
            for block in group.blocks {
                results.push(TagMatch {
                    page: group.page.clone(),
                    parsed: parser::parse(&block.content),
                    uuid: block.uuid,
                    content: block.content,
                });
            }
        }

        Ok(TagSearchResponse {
            tag: tag.to_string(),
            count: results.len(),
            results,
        })
    }

    /// Pages matched by a frontmatter property comparison. Requires the
    /// property-search capability.
    pub fn query_properties(
        &self,
        token: &CancelToken,
        property: &str,
        value: &str,
        operator: &str,
    ) -> Result<PropertyQueryResponse> {
        let operator = if operator.is_empty() { "eq" } else { operator };

        let Some(capability) = self.backend.property_search() else {
            return Err(Error::Unsupported("property queries"));
        };
        let results = capability.find_by_property(token, property, value, operator)?;

        Ok(PropertyQueryResponse {
            property: property.to_string(),
            value: value.to_string(),
            operator: operator.to_string(),
            count: results.len(),
            results,
        })
    }

    fn tag_scan(
        &self,
        token: &CancelToken,
        tag: &str,
    ) -> Result<Vec<crate::backend::TagResult>> {
        let tag_lower = tag.to_lowercase();
        let mut grouped = Vec::new();
        for page in self.backend.all_pages(token)? {
            let Some(blocks) = self.backend.page_blocks(token, &page.name)? else {
                continue;
            };
            let mut matches = Vec::new();
            collect_tagged(&blocks, &tag_lower, &mut matches);
            if !matches.is_empty() {
                grouped.push(crate::backend::TagResult {
                    page: page.display_name.clone(),
                    blocks: matches,
                });
            }
        }
        Ok(grouped)
    }
}

fn collect_tagged(blocks: &[Block], tag_lower: &str, matches: &mut Vec<Block>) {
    for block in blocks {
        if parser::extract_tags(&block.content)
            .iter()
            .any(|t| t.to_lowercase() == *tag_lower)
        {
            matches.push(block.clone());
        }
        collect_tagged(&block.children, tag_lower, matches);
    }
}

fn matches_all_terms(content: &str, terms: &[String]) -> bool {
    if terms.is_empty() {
        return false;
    }
    let lower = content.to_lowercase();
    terms.iter().all(|t| lower.contains(t.as_str()))
}

#[allow(clippy::too_many_arguments)]
fn scan_blocks(
    blocks: &[Block],
    terms: &[String],
    page_name: &str,
    parent_chain: &mut Vec<BlockSummary>,
    compact: bool,
    limit: usize,
    results: &mut Vec<SearchMatch>,
) {
    for (i, block) in blocks.iter().enumerate() {
        if results.len() >= limit {
            return;
        }
        if matches_all_terms(&block.content, terms) {
            let mut siblings = Vec::new();
            if i > 0 {
                siblings.push(BlockSummary::of(&blocks[i - 1]));
            }
            if i + 1 < blocks.len() {
                siblings.push(BlockSummary::of(&blocks[i + 1]));
            }
            results.push(SearchMatch {
                page: page_name.to_string(),
                uuid: block.uuid.clone(),
                content: block.content.clone(),
                parsed: (!compact).then(|| parser::parse(&block.content)),
                parent_chain: parent_chain.clone(),
                siblings,
            });
        }

        parent_chain.push(BlockSummary::of(block));
        scan_blocks(
            &block.children,
            terms,
            page_name,
            parent_chain,
            compact,
            limit,
            results,
        );
        parent_chain.pop();
    }
}
