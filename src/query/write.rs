//! Mutation operations. Every one of them runs the atomic write pipeline in
//! the backend: validate, write via temp-file rename, re-index, bump the
//! mutation generation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, RenameReport};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::types::{Block, Page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    Before,
    #[default]
    After,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPage {
    #[serde(flatten)]
    pub page: Page,
    pub blocks_added: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateReport {
    pub property: String,
    pub value: String,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Write {
    backend: Arc<dyn Backend>,
}

impl Write {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Create a page with optional frontmatter and initial blocks.
    pub fn create_page(
        &self,
        token: &CancelToken,
        name: &str,
        properties: Option<BTreeMap<String, serde_yaml::Value>>,
        blocks: &[String],
    ) -> Result<CreatedPage> {
        let page = self.backend.create_page(token, name, properties)?;

        let mut blocks_added = 0;
        for content in blocks {
            self.backend.append_block(token, name, content)?;
            blocks_added += 1;
        }

        Ok(CreatedPage { page, blocks_added })
    }

    /// Append a block at the end of a page, creating the page when absent.
    pub fn append_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block> {
        self.backend.append_block(token, page, content)
    }

    /// Insert a block right after the frontmatter, before all other content.
    pub fn prepend_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block> {
        self.backend.prepend_block(token, page, content)
    }

    /// Insert a block as a child of an existing block.
    pub fn insert_block(
        &self,
        token: &CancelToken,
        parent_uuid: &str,
        content: &str,
    ) -> Result<Block> {
        self.backend.insert_block(token, parent_uuid, content)
    }

    /// Replace a block's content; its identifier survives the edit.
    pub fn update_block(&self, token: &CancelToken, uuid: &str, content: &str) -> Result<()> {
        self.backend.update_block(token, uuid, content)
    }

    pub fn remove_block(&self, token: &CancelToken, uuid: &str) -> Result<()> {
        self.backend.remove_block(token, uuid)
    }

    /// Move a block before or after a target block, within or across pages.
    pub fn move_block(
        &self,
        token: &CancelToken,
        uuid: &str,
        target_uuid: &str,
        position: MovePosition,
    ) -> Result<()> {
        self.backend
            .move_block(token, uuid, target_uuid, position == MovePosition::Before)
    }

    pub fn delete_page(&self, token: &CancelToken, name: &str) -> Result<()> {
        self.backend.delete_page(token, name)
    }

    /// Rename a page and rewrite `[[old]]` references across the vault.
    /// Propagation is best-effort; the report carries partial failures.
    pub fn rename_page(
        &self,
        token: &CancelToken,
        old: &str,
        new: &str,
    ) -> Result<RenameReport> {
        self.backend.rename_page(token, old, new)
    }

    /// Set `property:: value` on the first block of each listed page.
    /// Pages that cannot be updated are reported, not fatal.
    pub fn bulk_update_properties(
        &self,
        token: &CancelToken,
        pages: &[String],
        property: &str,
        value: &str,
    ) -> Result<BulkUpdateReport> {
        let mut report = BulkUpdateReport {
            property: property.to_string(),
            value: value.to_string(),
            updated: Vec::new(),
            failed: Vec::new(),
        };

        let prop_line = format!("{property}:: {value}");
        let prop_prefix = format!("{property}:: ");

        for page_name in pages {
            let first = match self.backend.page_blocks(token, page_name)? {
                Some(blocks) if !blocks.is_empty() => blocks[0].clone(),
                _ => {
                    report.failed.push(page_name.clone());
                    continue;
                }
            };

            let mut lines: Vec<String> =
                first.content.split('\n').map(str::to_string).collect();
            match lines.iter_mut().find(|l| l.starts_with(&prop_prefix)) {
                Some(line) => *line = prop_line.clone(),
                None => lines.push(prop_line.clone()),
            }

            let updated = lines.join("\n");
            match self.backend.update_block(token, &first.uuid, &updated) {
                Ok(()) => report.updated.push(page_name.clone()),
                Err(e) => {
                    log::warn!("[write] bulk property update failed for {page_name}: {e}");
                    report.failed.push(page_name.clone());
                }
            }
        }

        Ok(report)
    }
}
