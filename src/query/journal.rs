//! Journal operations over the daily-notes subfolder: date-range listing
//! and journal-scoped search.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::backend::Backend;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::parser;
use crate::types::{Block, EnrichedBlock, ParsedContent};

use super::enrich_block_tree;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub date: String,
    pub page_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<EnrichedBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRangeResponse {
    pub from: String,
    pub to: String,
    pub entries_found: usize,
    pub journals: Vec<JournalEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalSearchMatch {
    pub date: String,
    pub page: String,
    pub uuid: String,
    pub content: String,
    pub parsed: ParsedContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalSearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<JournalSearchMatch>,
}

pub struct Journal {
    backend: Arc<dyn Backend>,
    daily_folder: String,
}

impl Journal {
    pub fn new(backend: Arc<dyn Backend>, daily_folder: String) -> Self {
        Self {
            backend,
            daily_folder,
        }
    }

    /// Journal entries across an inclusive `YYYY-MM-DD` date range. Days
    /// without a journal page are skipped.
    pub fn journal_range(
        &self,
        token: &CancelToken,
        from: &str,
        to: &str,
        include_blocks: bool,
    ) -> Result<JournalRangeResponse> {
        let from_date = parse_date(from)?;
        let to_date = parse_date(to)?;
        if to_date < from_date {
            return Err(Error::InvalidInput(format!(
                "'to' date {to} precedes 'from' date {from}"
            )));
        }

        let mut journals = Vec::new();
        let mut day = from_date;
        while day <= to_date {
            token.check()?;
            let date = day.format(DATE_FORMAT).to_string();
            let page_name = format!("{}/{}", self.daily_folder, date);

            if let Some(page) = self.backend.get_page(token, &page_name)? {
                let mut entry = JournalEntry {
                    date,
                    page_name: page.display_name,
                    blocks: None,
                    block_count: None,
                };
                if include_blocks {
                    let blocks = self
                        .backend
                        .page_blocks(token, &page.name)?
                        .unwrap_or_default();
                    entry.block_count = Some(Block::count_tree(&blocks));
                    entry.blocks = Some(enrich_block_tree(&blocks));
                }
                journals.push(entry);
            }

            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        Ok(JournalRangeResponse {
            from: from.to_string(),
            to: to.to_string(),
            entries_found: journals.len(),
            journals,
        })
    }

    /// Search journal pages only, with an optional date window. Empty
    /// `from`/`to` leave that side of the window open.
    pub fn journal_search(
        &self,
        token: &CancelToken,
        query: &str,
        from: &str,
        to: &str,
    ) -> Result<JournalSearchResponse> {
        if !from.is_empty() {
            parse_date(from)?;
        }
        if !to.is_empty() {
            parse_date(to)?;
        }

        let Some(capability) = self.backend.journal_search() else {
            return Err(Error::Unsupported("journal search"));
        };
        let grouped = capability.search_journals(token, query, from, to)?;

        let mut results = Vec::new();
        for group in grouped {
            for block in group.blocks {
                results.push(JournalSearchMatch {
                    date: group.date.clone(),
                    page: group.page.clone(),
                    parsed: parser::parse(&block.content),
                    uuid: block.uuid,
                    content: block.content,
                });
            }
        }

        Ok(JournalSearchResponse {
            query: query.to_string(),
            count: results.len(),
            results,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| Error::InvalidInput(format!("invalid date '{s}': use YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_iso_dates() {
        assert!(parse_date("2026-02-14").is_ok());
    }

    #[test]
    fn test_parse_date_rejects_malformed() {
        assert!(matches!(parse_date("02/14/2026"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_date("2026-13-01"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_date(""), Err(Error::InvalidInput(_))));
    }
}
