//! Navigation operations: pages, blocks, links, and raw BFS traversal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::graph::Graph;
use crate::parser;
use crate::types::{BackLink, Block, EnrichedBlock, EnrichedPage, Page};

use super::{collect_all_links, enrich_block_tree};

/// Filters and ordering for `list_pages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListPagesOptions {
    /// Keep only pages whose name starts with this prefix.
    pub namespace: Option<String>,
    /// Keep only pages carrying this frontmatter key.
    pub has_property: Option<String>,
    /// Keep only pages with a block carrying this tag.
    pub has_tag: Option<String>,
    pub sort_by: SortBy,
    /// Default 50.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Modified,
    Created,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    Forward,
    Backward,
    #[default]
    Both,
}

/// Projection of a page for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub name: String,
    pub journal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<std::collections::BTreeMap<String, serde_yaml::Value>>,
    pub updated_at: i64,
}

/// A block with its owning page and optional ancestor chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDetail {
    pub page: String,
    #[serde(flatten)]
    pub block: EnrichedBlock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksResult {
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outgoing_links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlinks: Option<Vec<BackLink>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraverseResult {
    pub from: String,
    pub to: String,
    pub paths_found: usize,
    pub paths: Vec<Vec<String>>,
}

pub struct Navigate {
    backend: Arc<dyn Backend>,
}

impl Navigate {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// A page with its enriched block tree, outgoing links, and backlinks.
    /// Unknown names yield `Ok(None)`.
    pub fn get_page(&self, token: &CancelToken, name: &str) -> Result<Option<EnrichedPage>> {
        let Some(page) = self.backend.get_page(token, name)? else {
            return Ok(None);
        };
        let blocks = self.backend.page_blocks(token, name)?.unwrap_or_default();

        let enriched = enrich_block_tree(&blocks);
        let outgoing = collect_all_links(&blocks);
        let backlinks = self.backend.backlinks(token, name)?;
        let block_count = Block::count_tree(&blocks);
        let link_count = outgoing.len() + backlinks.len();

        Ok(Some(EnrichedPage {
            page,
            blocks: enriched,
            outgoing_links: outgoing,
            backlinks,
            block_count,
            link_count,
        }))
    }

    /// A block by identifier, optionally with its ancestor chain walked
    /// back to the page root.
    pub fn get_block(
        &self,
        token: &CancelToken,
        uuid: &str,
        include_ancestors: bool,
    ) -> Result<Option<BlockDetail>> {
        let Some((page_name, block)) = self.backend.get_block(token, uuid)? else {
            return Ok(None);
        };

        let mut enriched = super::enrich_block(&block);
        if include_ancestors {
            if let Some(blocks) = self.backend.page_blocks(token, &page_name)? {
                if let Some(chain) = Block::ancestors_of(&blocks, uuid) {
                    enriched.ancestors = chain;
                }
            }
        }

        Ok(Some(BlockDetail {
            page: page_name,
            block: enriched,
        }))
    }

    /// Paginated, filtered page listing. Default limit 50.
    pub fn list_pages(
        &self,
        token: &CancelToken,
        options: &ListPagesOptions,
    ) -> Result<Vec<PageSummary>> {
        let limit = options.limit.unwrap_or(50);
        let pages = self.backend.all_pages(token)?;

        let mut filtered: Vec<Page> = Vec::new();
        for page in pages {
            if page.name.is_empty() {
                continue;
            }
            if let Some(ns) = &options.namespace {
                if !page.name.to_lowercase().starts_with(&ns.to_lowercase()) {
                    continue;
                }
            }
            if let Some(key) = &options.has_property {
                let has = page
                    .properties
                    .as_ref()
                    .is_some_and(|props| props.contains_key(key));
                if !has {
                    continue;
                }
            }
            if let Some(tag) = &options.has_tag {
                if !self.page_has_tag(token, &page.name, tag)? {
                    continue;
                }
            }
            filtered.push(page);
        }

        match options.sort_by {
            SortBy::Name => {
                filtered.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            }
            SortBy::Modified => filtered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            SortBy::Created => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        filtered.truncate(limit);

        Ok(filtered
            .into_iter()
            .map(|p| PageSummary {
                name: p.display_name.clone(),
                journal: p.journal,
                properties: p.properties,
                updated_at: p.updated_at,
            })
            .collect())
    }

    /// Forward links, backlinks, or both for a page.
    pub fn get_links(
        &self,
        token: &CancelToken,
        name: &str,
        direction: LinkDirection,
    ) -> Result<LinksResult> {
        let mut result = LinksResult {
            page: name.to_string(),
            outgoing_links: None,
            backlinks: None,
        };

        if matches!(direction, LinkDirection::Forward | LinkDirection::Both) {
            let blocks = self.backend.page_blocks(token, name)?.unwrap_or_default();
            result.outgoing_links = Some(collect_all_links(&blocks));
        }
        if matches!(direction, LinkDirection::Backward | LinkDirection::Both) {
            result.backlinks = Some(self.backend.backlinks(token, name)?);
        }
        Ok(result)
    }

    /// Raw BFS over forward edges with a per-call hop bound (default 4),
    /// returning every enumerated path.
    pub fn traverse(
        &self,
        token: &CancelToken,
        from: &str,
        to: &str,
        max_hops: Option<usize>,
    ) -> Result<TraverseResult> {
        let max_hops = max_hops.unwrap_or(4).max(1);
        let graph = Graph::build(self.backend.as_ref(), token)?;
        let paths = graph.bfs_paths(&from.to_lowercase(), &to.to_lowercase(), max_hops, usize::MAX);

        Ok(TraverseResult {
            from: from.to_string(),
            to: to.to_string(),
            paths_found: paths.len(),
            paths,
        })
    }

    fn page_has_tag(&self, token: &CancelToken, name: &str, tag: &str) -> Result<bool> {
        let Some(blocks) = self.backend.page_blocks(token, name)? else {
            return Ok(false);
        };
        let tag_lower = tag.to_lowercase();
        fn walk(blocks: &[Block], tag_lower: &str) -> bool {
            blocks.iter().any(|b| {
                parser::extract_tags(&b.content)
                    .iter()
                    .any(|t| t.to_lowercase() == *tag_lower)
                    || walk(&b.children, tag_lower)
            })
        }
        Ok(walk(&blocks, &tag_lower))
    }
}
