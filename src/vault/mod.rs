//! The vault store: loads a directory tree of `.md` files into an in-memory
//! index set, keeps it coherent under a file watcher, and applies mutations
//! through atomic temp-file writes.
//!
//! Four structures share one read-write lock: the page map (aliases
//! included), the block identifier map, the backlink reverse index, and the
//! inverted full-text index. Every mutation writes the file first, then
//! updates the indices before releasing the lock, so readers never observe
//! an index entry that disagrees with durable state.

pub mod frontmatter;
mod index;
pub mod markdown;
pub mod search_index;
pub mod watcher;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::UNIX_EPOCH;

use rayon::prelude::*;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::backend::{
    Backend, FullTextSearch, JournalResult, JournalSearch, PropertyResult, PropertySearch,
    RenameReport, TagResult, TagSearch,
};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::parser;
use crate::types::{BackLink, Block, Page};
use crate::Config;

use frontmatter::{parse_frontmatter, render_frontmatter, Properties};
use index::BacklinkMap;
use search_index::{SearchHit, SearchIndex};

/// Suffix for atomic-write temp files; the watcher ignores these.
pub(crate) const TMP_SUFFIX: &str = ".notegraph-tmp";

/// A parsed markdown file held in memory.
pub(crate) struct CachedPage {
    pub page: Page,
    pub lower_name: String,
    /// Relative slash-joined path including the `.md` extension.
    pub file_path: String,
    pub blocks: Vec<Block>,
}

/// The index set. All four structures stay pairwise consistent: any
/// mutation installs or removes a whole page at a time.
#[derive(Default)]
struct Indexes {
    /// lowercased canonical name (and aliases) → page.
    pages: HashMap<String, Arc<CachedPage>>,
    /// block uuid → owning page's lowercased canonical name.
    blocks: HashMap<String, String>,
    /// lowercased `[[target]]` → incoming references.
    backlinks: BacklinkMap,
    /// lowercased page name → targets it links to, bounding backlink removal.
    page_link_targets: HashMap<String, HashSet<String>>,
    search: SearchIndex,
}

pub struct Vault {
    config: Config,
    root: PathBuf,
    indexes: RwLock<Indexes>,
    /// Bumped by every completed mutation; derived caches key off it.
    generation: AtomicU64,
    watcher: Mutex<Option<watcher::VaultWatcher>>,
}

impl Vault {
    /// Load every `.md` file under the configured root and build the index
    /// set. Unreadable files are logged and skipped, never fatal.
    pub fn open(config: Config) -> Result<Self> {
        let root = fs::canonicalize(&config.vault_path)
            .map_err(|e| Error::io(format!("resolve vault root {:?}", config.vault_path), e))?;
        if !root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "vault path is not a directory: {}",
                root.display()
            )));
        }

        let vault = Vault {
            config,
            root,
            indexes: RwLock::new(Indexes::default()),
            generation: AtomicU64::new(0),
            watcher: Mutex::new(None),
        };

        let indexes = vault.scan_and_parse();
        *vault.write_indexes()? = indexes;
        Ok(vault)
    }

    /// Discard the index set and rebuild it from disk.
    pub fn reload(&self) -> Result<()> {
        let fresh = self.scan_and_parse();
        *self.write_indexes()? = fresh;
        self.bump();
        Ok(())
    }

    /// Start the background file watcher. Idempotent.
    pub fn watch(self: &Arc<Self>) -> Result<()> {
        let mut slot = self
            .watcher
            .lock()
            .map_err(|e| lock_poisoned(&e.to_string()))?;
        if slot.is_none() {
            *slot = Some(watcher::VaultWatcher::start(Arc::clone(self))?);
        }
        Ok(())
    }

    /// Stop the watcher and join its event thread. The remaining event
    /// queue is drained before the thread exits.
    pub fn close(&self) {
        let taken = self.watcher.lock().ok().and_then(|mut w| w.take());
        if let Some(watcher) = taken {
            watcher.stop();
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Loading ---

    fn scan_and_parse(&self) -> Indexes {
        let files = self.collect_md_files();
        log::info!("[vault] loading {} markdown files", files.len());

        // Parse in parallel, then install sequentially.
        let parsed: Vec<CachedPage> = files
            .par_iter()
            .filter_map(|abs| match fs::read_to_string(abs) {
                Ok(content) => {
                    let rel = self.rel_path(abs)?;
                    Some(parse_file(&self.config, &rel, &content, mtime_millis(abs)))
                }
                Err(e) => {
                    log::warn!("[vault] skipping unreadable file {}: {e}", abs.display());
                    None
                }
            })
            .collect();

        let mut indexes = Indexes::default();
        for page in parsed {
            install_page(&mut indexes, page);
        }
        indexes
    }

    fn collect_md_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.depth() > 0 && entry.file_type().is_dir() && name.starts_with('.'))
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                entry.file_type().is_file()
                    && name.ends_with(".md")
                    && !name.starts_with('.')
                    && !name.ends_with(TMP_SUFFIX)
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    fn rel_path(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        Some(slash_path(rel))
    }

    // --- Path safety ---

    /// Join a caller-supplied relative path with the vault root and verify
    /// it cannot escape it. Rejects null bytes outright.
    fn safe_path(&self, rel: &str) -> Result<PathBuf> {
        if rel.contains('\0') {
            return Err(Error::InvalidInput("path contains a null byte".into()));
        }
        let mut resolved = self.root.clone();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                    if !resolved.starts_with(&self.root) {
                        return Err(Error::PathEscape(PathBuf::from(rel)));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::PathEscape(PathBuf::from(rel)));
                }
            }
        }
        if !resolved.starts_with(&self.root) {
            return Err(Error::PathEscape(PathBuf::from(rel)));
        }
        Ok(resolved)
    }

    // --- Lock helpers ---

    fn read_indexes(&self) -> Result<RwLockReadGuard<'_, Indexes>> {
        self.indexes
            .read()
            .map_err(|e| lock_poisoned(&e.to_string()))
    }

    fn write_indexes(&self) -> Result<RwLockWriteGuard<'_, Indexes>> {
        self.indexes
            .write()
            .map_err(|e| lock_poisoned(&e.to_string()))
    }

    fn require_writable(&self) -> Result<()> {
        if self.config.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Parse `content` as the current state of `rel_path` and swap it into
    /// the index set. Caller holds the write lock.
    fn install_content(&self, indexes: &mut Indexes, rel_path: &str, content: &str, abs: &Path) {
        let page = parse_file(&self.config, rel_path, content, mtime_millis(abs));
        install_page(indexes, page);
    }

    // --- Watcher entry points ---

    /// A file appeared or changed on disk: re-parse and re-index it. Also
    /// fires for the engine's own atomic renames; re-parsing identical bytes
    /// is idempotent because identifiers are sentinel-pinned.
    pub(crate) fn handle_file_changed(&self, abs: &Path) {
        let Some(rel) = self.rel_path(abs) else {
            return;
        };
        let content = match fs::read_to_string(abs) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[vault] failed to read changed file {}: {e}", abs.display());
                return;
            }
        };
        match self.write_indexes() {
            Ok(mut indexes) => {
                self.install_content(&mut indexes, &rel, &content, abs);
                self.bump();
                log::debug!("[vault] reindexed {rel}");
            }
            Err(e) => log::error!("[vault] reindex of {rel} failed: {e}"),
        }
    }

    /// A file disappeared (delete, or the old half of a rename): purge its
    /// page. The new name of a rename arrives as a separate create event.
    pub(crate) fn handle_file_removed(&self, abs: &Path) {
        let Some(rel) = self.rel_path(abs) else {
            return;
        };
        let lower = page_name_of(&rel).to_lowercase();
        match self.write_indexes() {
            Ok(mut indexes) => {
                remove_page_entries(&mut indexes, &lower);
                self.bump();
                log::debug!("[vault] removed {rel} from index");
            }
            Err(e) => log::error!("[vault] purge of {rel} failed: {e}"),
        }
    }

    // --- Shared write plumbing ---

    /// Create an empty page file and index it. Caller holds the write lock
    /// and has verified the page does not exist.
    fn create_page_file(
        &self,
        indexes: &mut Indexes,
        name: &str,
        initial: &str,
    ) -> Result<(String, PathBuf)> {
        let rel = format!("{name}.md");
        let abs = self.safe_path(&rel)?;
        if let Some(dir) = abs.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io(format!("create directory {}", dir.display()), e))?;
        }
        atomic_write(&abs, initial)?;
        self.install_content(indexes, &rel, initial, &abs);
        Ok((rel, abs))
    }

    /// Remove now-empty directories from `dir` up to (excluding) the vault
    /// root. Failures are logged only.
    fn remove_empty_dirs(&self, mut dir: PathBuf) {
        while dir != self.root && dir.starts_with(&self.root) {
            match fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(_) => break,
            }
            if let Err(e) = fs::remove_dir(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("[vault] failed to remove empty dir {}: {e}", dir.display());
                }
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
    }

    /// Rewrite `[[old]]` to `[[new]]` across every other page. Best-effort:
    /// per-file failures are logged and reported, the rest continue.
    fn update_links_across_vault(
        &self,
        indexes: &mut Indexes,
        old_name: &str,
        new_name: &str,
    ) -> (usize, Vec<String>) {
        let old_link = format!("[[{old_name}]]");
        let new_link = format!("[[{new_name}]]");
        let lower_old = old_name.to_lowercase();

        let mut seen = HashSet::new();
        let candidates: Vec<(String, String)> = indexes
            .pages
            .values()
            .filter(|p| seen.insert(p.lower_name.clone()) && p.lower_name != lower_old)
            .map(|p| (p.lower_name.clone(), p.file_path.clone()))
            .collect();

        let mut updated = 0;
        let mut failed = Vec::new();
        for (lower, file_path) in candidates {
            let abs = match self.safe_path(&file_path) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("[vault] rename: skipping {file_path}: {e}");
                    failed.push(lower);
                    continue;
                }
            };
            let content = match fs::read_to_string(&abs) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("[vault] rename: failed to read {file_path}: {e}");
                    failed.push(lower);
                    continue;
                }
            };
            if !content.contains(&old_link) {
                continue;
            }
            let rewritten = content.replace(&old_link, &new_link);
            if let Err(e) = atomic_write(&abs, &rewritten) {
                log::warn!("[vault] rename: failed to write {file_path}: {e}");
                failed.push(lower);
                continue;
            }
            self.install_content(indexes, &file_path, &rewritten, &abs);
            updated += 1;
        }
        (updated, failed)
    }
}

impl Backend for Vault {
    fn ping(&self, token: &CancelToken) -> Result<()> {
        token.check()?;
        let meta = fs::metadata(&self.root)
            .map_err(|e| Error::io(format!("stat vault root {}", self.root.display()), e))?;
        if !meta.is_dir() {
            return Err(Error::InvalidInput(format!(
                "vault path is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn all_pages(&self, token: &CancelToken) -> Result<Vec<Page>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        let mut seen = HashSet::new();
        Ok(indexes
            .pages
            .values()
            .filter(|p| seen.insert(p.lower_name.clone()))
            .map(|p| p.page.clone())
            .collect())
    }

    fn get_page(&self, token: &CancelToken, name: &str) -> Result<Option<Page>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        Ok(indexes
            .pages
            .get(&name.to_lowercase())
            .map(|p| p.page.clone()))
    }

    fn page_blocks(&self, token: &CancelToken, name: &str) -> Result<Option<Vec<Block>>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        Ok(indexes
            .pages
            .get(&name.to_lowercase())
            .map(|p| p.blocks.clone()))
    }

    fn get_block(&self, token: &CancelToken, uuid: &str) -> Result<Option<(String, Block)>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        let Some(lower) = indexes.blocks.get(uuid) else {
            return Ok(None);
        };
        let Some(cached) = indexes.pages.get(lower) else {
            return Ok(None);
        };
        Ok(Block::find(&cached.blocks, uuid)
            .map(|b| (cached.page.display_name.clone(), b.clone())))
    }

    fn backlinks(&self, token: &CancelToken, name: &str) -> Result<Vec<BackLink>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        let Some(entries) = indexes.backlinks.get(&name.to_lowercase()) else {
            return Ok(Vec::new());
        };

        // Group by source page; BTreeMap keeps the output deterministic.
        let mut grouped: BTreeMap<String, Vec<crate::types::BlockSummary>> = BTreeMap::new();
        for entry in entries {
            grouped
                .entry(entry.from_page.clone())
                .or_default()
                .push(entry.block.clone());
        }

        Ok(grouped
            .into_iter()
            .map(|(lower, blocks)| {
                let page_name = indexes
                    .pages
                    .get(&lower)
                    .map(|p| p.page.display_name.clone())
                    .unwrap_or(lower);
                BackLink { page_name, blocks }
            })
            .collect())
    }

    fn create_page(
        &self,
        token: &CancelToken,
        name: &str,
        properties: Option<Properties>,
    ) -> Result<Page> {
        self.require_writable()?;
        token.check()?;
        validate_page_name(name)?;

        let mut indexes = self.write_indexes()?;
        let lower = name.to_lowercase();
        if indexes.pages.contains_key(&lower) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let content = properties
            .as_ref()
            .map(render_frontmatter)
            .unwrap_or_default();
        token.check()?;
        self.create_page_file(&mut indexes, name, &content)?;
        self.bump();

        indexes
            .pages
            .get(&lower)
            .map(|p| p.page.clone())
            .ok_or_else(|| internal_io(format!("indexing failed for new page {name}")))
    }

    fn append_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let lower = page.to_lowercase();
        let (rel, abs) = match indexes.pages.get(&lower) {
            Some(cached) => {
                let rel = cached.file_path.clone();
                let abs = self.safe_path(&rel)?;
                (rel, abs)
            }
            None => {
                validate_page_name(page)?;
                token.check()?;
                self.create_page_file(&mut indexes, page, "")?
            }
        };

        token.check()?;
        let existing = read_file(&abs)?;

        let (uuid, clean) = adopt_or_mint_uuid(content);
        let embedded = markdown::embed_uuid(&clean, &uuid);

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&embedded);
        updated.push('\n');

        atomic_write(&abs, &updated)?;
        self.install_content(&mut indexes, &rel, &updated, &abs);
        self.bump();

        Ok(indexes
            .pages
            .get(&lower)
            .and_then(|p| last_block(&p.blocks).cloned())
            .unwrap_or(Block {
                uuid,
                content: clean,
                children: Vec::new(),
            }))
    }

    fn prepend_block(&self, token: &CancelToken, page: &str, content: &str) -> Result<Block> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let lower = page.to_lowercase();

        let (uuid, clean) = adopt_or_mint_uuid(content);
        let embedded = markdown::embed_uuid(&clean, &uuid);

        let fallback = Block {
            uuid,
            content: clean,
            children: Vec::new(),
        };

        match indexes.pages.get(&lower) {
            None => {
                validate_page_name(page)?;
                token.check()?;
                self.create_page_file(&mut indexes, page, &format!("{embedded}\n"))?;
                self.bump();
            }
            Some(cached) => {
                let rel = cached.file_path.clone();
                let abs = self.safe_path(&rel)?;
                token.check()?;
                let existing = read_file(&abs)?;
                let (props, body) = parse_frontmatter(&existing);
                let updated = match props {
                    Some(props) => format!("{}{embedded}\n{body}", render_frontmatter(&props)),
                    None => format!("{embedded}\n{existing}"),
                };
                atomic_write(&abs, &updated)?;
                self.install_content(&mut indexes, &rel, &updated, &abs);
                self.bump();
            }
        }

        Ok(indexes
            .pages
            .get(&lower)
            .and_then(|p| p.blocks.first().cloned())
            .unwrap_or(fallback))
    }

    fn insert_block(
        &self,
        token: &CancelToken,
        parent_uuid: &str,
        content: &str,
    ) -> Result<Block> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let lower = indexes
            .blocks
            .get(parent_uuid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("parent block {parent_uuid}")))?;
        let cached = indexes
            .pages
            .get(&lower)
            .ok_or_else(|| Error::NotFound(format!("page owning block {parent_uuid}")))?;
        let parent = Block::find(&cached.blocks, parent_uuid)
            .ok_or_else(|| Error::NotFound(format!("parent block {parent_uuid}")))?
            .clone();
        let rel = cached.file_path.clone();
        let abs = self.safe_path(&rel)?;

        token.check()?;
        let file = read_file(&abs)?;
        let parent_form = locate_block_form(&file, &parent.content, parent_uuid)
            .ok_or_else(|| internal_io("parent block content not found in file".into()))?;
        let insert_pos = file
            .find(&parent_form)
            .map(|idx| idx + parent_form.len())
            .ok_or_else(|| internal_io("parent block content not found in file".into()))?;

        // A plain-text child under a heading becomes a one-level-deeper
        // heading so the sectioner nests it.
        let parent_level = markdown::heading_level(first_line(&parent.content));
        let mut child = content.to_string();
        if (1..6).contains(&parent_level) && markdown::heading_level(first_line(content)) == 0 {
            child = format!("{} {content}", "#".repeat(parent_level + 1));
        }

        let (uuid, clean) = adopt_or_mint_uuid(&child);
        let embedded = markdown::embed_uuid(&clean, &uuid);

        let updated = format!("{}\n{embedded}{}", &file[..insert_pos], &file[insert_pos..]);
        atomic_write(&abs, &updated)?;
        self.install_content(&mut indexes, &rel, &updated, &abs);
        self.bump();

        Ok(indexes
            .pages
            .get(&lower)
            .and_then(|p| Block::find(&p.blocks, &uuid).cloned())
            .unwrap_or(Block {
                uuid,
                content: clean,
                children: Vec::new(),
            }))
    }

    fn update_block(&self, token: &CancelToken, uuid: &str, content: &str) -> Result<()> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let (rel, old_block) = resolve_block(&indexes, uuid)?;
        let abs = self.safe_path(&rel)?;

        token.check()?;
        let file = read_file(&abs)?;
        let old_form = locate_block_form(&file, &old_block.content, uuid).ok_or_else(|| {
            internal_io("block content not found in file (modified externally?)".into())
        })?;

        // Preserve the block's identity unless the caller embedded a
        // different one on purpose.
        let (provided, clean) = markdown::extract_uuid(content);
        let keep = match provided {
            Some(p) if p != uuid => p,
            _ => uuid.to_string(),
        };
        let new_form = markdown::embed_uuid(&clean, &keep);

        let updated = file.replacen(&old_form, &new_form, 1);
        atomic_write(&abs, &updated)?;
        self.install_content(&mut indexes, &rel, &updated, &abs);
        self.bump();
        Ok(())
    }

    fn remove_block(&self, token: &CancelToken, uuid: &str) -> Result<()> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let (rel, block) = resolve_block(&indexes, uuid)?;
        let abs = self.safe_path(&rel)?;

        token.check()?;
        let file = read_file(&abs)?;
        let form = locate_block_form(&file, &block.content, uuid)
            .ok_or_else(|| internal_io("block content not found in file".into()))?;

        let with_newline = format!("{form}\n");
        let updated = if file.contains(&with_newline) {
            file.replacen(&with_newline, "", 1)
        } else {
            file.replacen(&form, "", 1)
        };

        atomic_write(&abs, &updated)?;
        self.install_content(&mut indexes, &rel, &updated, &abs);
        self.bump();
        Ok(())
    }

    fn move_block(
        &self,
        token: &CancelToken,
        uuid: &str,
        target_uuid: &str,
        before: bool,
    ) -> Result<()> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let (src_rel, src_block) = resolve_block(&indexes, uuid)?;
        let (tgt_rel, tgt_block) = resolve_block(&indexes, target_uuid)?;
        let src_abs = self.safe_path(&src_rel)?;
        let tgt_abs = self.safe_path(&tgt_rel)?;

        token.check()?;
        if src_rel == tgt_rel {
            let file = read_file(&src_abs)?;
            let src_form = locate_block_form(&file, &src_block.content, uuid)
                .ok_or_else(|| internal_io("source block content not found in file".into()))?;
            let without_src = remove_form(&file, &src_form);
            let tgt_form = locate_block_form(&without_src, &tgt_block.content, target_uuid)
                .ok_or_else(|| internal_io("target block content not found in file".into()))?;
            let updated = splice_relative(&without_src, &tgt_form, &src_form, before);

            atomic_write(&src_abs, &updated)?;
            self.install_content(&mut indexes, &src_rel, &updated, &src_abs);
            self.bump();
            return Ok(());
        }

        // Cross-page move: cut from the source file, splice into the target.
        let src_file = read_file(&src_abs)?;
        let src_form = locate_block_form(&src_file, &src_block.content, uuid)
            .ok_or_else(|| internal_io("source block content not found in file".into()))?;
        let src_updated = remove_form(&src_file, &src_form);
        atomic_write(&src_abs, &src_updated)?;

        let tgt_file = read_file(&tgt_abs)?;
        let tgt_form = locate_block_form(&tgt_file, &tgt_block.content, target_uuid)
            .ok_or_else(|| internal_io("target block content not found in file".into()))?;
        let tgt_updated = splice_relative(&tgt_file, &tgt_form, &src_form, before);
        atomic_write(&tgt_abs, &tgt_updated)?;

        self.install_content(&mut indexes, &src_rel, &src_updated, &src_abs);
        self.install_content(&mut indexes, &tgt_rel, &tgt_updated, &tgt_abs);
        self.bump();
        Ok(())
    }

    fn delete_page(&self, token: &CancelToken, name: &str) -> Result<()> {
        self.require_writable()?;
        token.check()?;

        let mut indexes = self.write_indexes()?;
        let lower = name.to_lowercase();
        let cached = indexes
            .pages
            .get(&lower)
            .ok_or_else(|| Error::NotFound(format!("page {name}")))?;
        let abs = self.safe_path(&cached.file_path)?;

        token.check()?;
        fs::remove_file(&abs).map_err(|e| Error::io(format!("delete {}", abs.display()), e))?;
        remove_page_entries(&mut indexes, &lower);
        self.bump();

        if let Some(dir) = abs.parent() {
            self.remove_empty_dirs(dir.to_path_buf());
        }
        Ok(())
    }

    fn rename_page(&self, token: &CancelToken, old: &str, new: &str) -> Result<RenameReport> {
        self.require_writable()?;
        token.check()?;
        validate_page_name(new)?;

        let mut indexes = self.write_indexes()?;
        let lower_old = old.to_lowercase();
        let lower_new = new.to_lowercase();

        let cached = indexes
            .pages
            .get(&lower_old)
            .ok_or_else(|| Error::NotFound(format!("page {old}")))?;
        if lower_new != lower_old && indexes.pages.contains_key(&lower_new) {
            return Err(Error::AlreadyExists(new.to_string()));
        }

        let old_abs = self.safe_path(&cached.file_path)?;
        let new_rel = format!("{new}.md");
        let new_abs = self.safe_path(&new_rel)?;
        if let Some(dir) = new_abs.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("create directory {}", dir.display()), e))?;
        }

        token.check()?;
        fs::rename(&old_abs, &new_abs).map_err(|e| {
            Error::io(
                format!("rename {} -> {}", old_abs.display(), new_abs.display()),
                e,
            )
        })?;

        // Past the rename there is no going back: propagate, re-index, and
        // report partial failures instead of rolling back.
        let (pages_updated, failed_pages) =
            self.update_links_across_vault(&mut indexes, old, new);

        remove_page_entries(&mut indexes, &lower_old);
        match fs::read_to_string(&new_abs) {
            Ok(content) => self.install_content(&mut indexes, &new_rel, &content, &new_abs),
            Err(e) => log::warn!(
                "[vault] rename: failed to re-read {}: {e}",
                new_abs.display()
            ),
        }
        self.bump();

        if let Some(dir) = old_abs.parent() {
            self.remove_empty_dirs(dir.to_path_buf());
        }

        Ok(RenameReport {
            pages_updated,
            failed_pages,
        })
    }

    fn mutation_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn full_text(&self) -> Option<&dyn FullTextSearch> {
        Some(self)
    }

    fn tag_search(&self) -> Option<&dyn TagSearch> {
        Some(self)
    }

    fn property_search(&self) -> Option<&dyn PropertySearch> {
        Some(self)
    }

    fn journal_search(&self) -> Option<&dyn JournalSearch> {
        Some(self)
    }
}

impl FullTextSearch for Vault {
    fn full_text_search(
        &self,
        token: &CancelToken,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        Ok(indexes.search.search(query, limit))
    }
}

impl TagSearch for Vault {
    fn find_blocks_by_tag(&self, token: &CancelToken, tag: &str) -> Result<Vec<TagResult>> {
        token.check()?;
        let indexes = self.read_indexes()?;
        let tag_lower = tag.to_lowercase();

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for cached in indexes.pages.values() {
            if !seen.insert(cached.lower_name.clone()) {
                continue;
            }
            let mut matches = Vec::new();
            find_tag_in_blocks(&cached.blocks, &tag_lower, &mut matches);
            if !matches.is_empty() {
                results.push(TagResult {
                    page: cached.page.display_name.clone(),
                    blocks: matches,
                });
            }
        }
        Ok(results)
    }
}

impl PropertySearch for Vault {
    fn find_by_property(
        &self,
        token: &CancelToken,
        key: &str,
        value: &str,
        operator: &str,
    ) -> Result<Vec<PropertyResult>> {
        token.check()?;
        if !matches!(operator, "" | "eq" | "contains" | "gt" | "lt") {
            return Err(Error::InvalidInput(format!("unknown operator: {operator}")));
        }

        let indexes = self.read_indexes()?;
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for cached in indexes.pages.values() {
            if !seen.insert(cached.lower_name.clone()) {
                continue;
            }
            let Some(props) = &cached.page.properties else {
                continue;
            };
            let Some(prop_value) = props.get(key) else {
                continue;
            };

            let matched = if value.is_empty() {
                true // existence check
            } else {
                let prop_str = yaml_value_string(prop_value);
                match operator {
                    "" | "eq" => prop_str.eq_ignore_ascii_case(value),
                    "contains" => prop_str.to_lowercase().contains(&value.to_lowercase()),
                    "gt" => prop_str.as_str() > value,
                    "lt" => prop_str.as_str() < value,
                    _ => unreachable!(),
                }
            };

            if matched {
                results.push(PropertyResult {
                    name: cached.page.display_name.clone(),
                    properties: props.clone(),
                });
            }
        }
        Ok(results)
    }
}

impl JournalSearch for Vault {
    fn search_journals(
        &self,
        token: &CancelToken,
        query: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<JournalResult>> {
        token.check()?;
        let query_lower = query.to_lowercase();
        let indexes = self.read_indexes()?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for cached in indexes.pages.values() {
            if !seen.insert(cached.lower_name.clone()) || !cached.page.journal {
                continue;
            }

            // The date is the final path segment of the page name.
            let date = cached
                .page
                .display_name
                .rsplit('/')
                .next()
                .unwrap_or(&cached.page.display_name)
                .to_string();
            if !from.is_empty() && date.as_str() < from {
                continue;
            }
            if !to.is_empty() && date.as_str() > to {
                continue;
            }

            let mut matches = Vec::new();
            find_text_in_blocks(&cached.blocks, &query_lower, &mut matches);
            if !matches.is_empty() {
                results.push(JournalResult {
                    date,
                    page: cached.page.display_name.clone(),
                    blocks: matches,
                });
            }
        }
        Ok(results)
    }
}

// --- Free helpers ---

/// Parse a file's full content into a cached page.
fn parse_file(config: &Config, rel_path: &str, content: &str, mtime: i64) -> CachedPage {
    let name = page_name_of(rel_path).to_string();
    let lower_name = name.to_lowercase();

    let (properties, body) = parse_frontmatter(content);

    let journal = if config.daily_folder.is_empty() {
        false
    } else {
        lower_name.starts_with(&format!("{}/", config.daily_folder.to_lowercase()))
    };

    let blocks = markdown::parse_blocks(rel_path, &body);

    CachedPage {
        page: Page {
            name: name.clone(),
            display_name: name,
            journal,
            properties,
            created_at: mtime,
            updated_at: mtime,
        },
        lower_name,
        file_path: rel_path.to_string(),
        blocks,
    }
}

/// Swap a freshly parsed page into the index set, replacing any previous
/// state for the same canonical name.
fn install_page(indexes: &mut Indexes, page: CachedPage) {
    remove_page_entries(indexes, &page.lower_name);

    let cached = Arc::new(page);
    let mut uuids = Vec::new();
    Block::collect_uuids(&cached.blocks, &mut uuids);
    for uuid in uuids {
        indexes.blocks.insert(uuid, cached.lower_name.clone());
    }

    for alias in cached.page.aliases() {
        let key = alias.to_lowercase();
        if key != cached.lower_name {
            indexes.pages.insert(key, Arc::clone(&cached));
        }
    }

    let targets = index::collect_link_targets(&cached.blocks);
    index::add_page_backlinks(&cached, &mut indexes.backlinks);
    indexes
        .page_link_targets
        .insert(cached.lower_name.clone(), targets);
    indexes
        .search
        .reindex_page(&cached.lower_name, &cached.page.display_name, &cached.blocks);

    indexes.pages.insert(cached.lower_name.clone(), cached);
}

/// Remove every trace of a page from the index set.
fn remove_page_entries(indexes: &mut Indexes, lower_name: &str) {
    let Some(old) = indexes.pages.get(lower_name).cloned() else {
        return;
    };

    let mut uuids = Vec::new();
    Block::collect_uuids(&old.blocks, &mut uuids);
    for uuid in &uuids {
        indexes.blocks.remove(uuid);
    }

    // Drop alias keys pointing at the same page.
    indexes
        .pages
        .retain(|key, page| !(page.lower_name == lower_name && key != lower_name));
    indexes.pages.remove(lower_name);

    if let Some(targets) = indexes.page_link_targets.remove(lower_name) {
        index::remove_page_backlinks(lower_name, &targets, &mut indexes.backlinks);
    }
    indexes.search.remove_page(lower_name);
}

/// Resolve a block uuid to its page's relative file path and the block
/// itself. Caller holds a lock.
fn resolve_block(indexes: &Indexes, uuid: &str) -> Result<(String, Block)> {
    let lower = indexes
        .blocks
        .get(uuid)
        .ok_or_else(|| Error::NotFound(format!("block {uuid}")))?;
    let cached = indexes
        .pages
        .get(lower)
        .ok_or_else(|| Error::NotFound(format!("page owning block {uuid}")))?;
    let block = Block::find(&cached.blocks, uuid)
        .ok_or_else(|| Error::NotFound(format!("block {uuid}")))?;
    Ok((cached.file_path.clone(), block.clone()))
}

fn first_line(s: &str) -> &str {
    s.split('\n').next().unwrap_or("")
}

/// The exact text a block occupies in its file: with its sentinel embedded
/// when the file carries one, otherwise the plain content.
fn locate_block_form(file: &str, content: &str, uuid: &str) -> Option<String> {
    let embedded = markdown::embed_uuid(content, uuid);
    if file.contains(&embedded) {
        return Some(embedded);
    }
    if file.contains(content) {
        return Some(content.to_string());
    }
    None
}

/// Remove one occurrence of a block's text, taking the trailing newline
/// with it when present.
fn remove_form(file: &str, form: &str) -> String {
    let with_newline = format!("{form}\n");
    if file.contains(&with_newline) {
        file.replacen(&with_newline, "", 1)
    } else {
        file.replacen(form, "", 1)
    }
}

/// Insert `moved` immediately before or after `anchor`.
fn splice_relative(file: &str, anchor: &str, moved: &str, before: bool) -> String {
    if before {
        file.replacen(anchor, &format!("{moved}\n{anchor}"), 1)
    } else {
        file.replacen(anchor, &format!("{anchor}\n{moved}"), 1)
    }
}

/// Adopt a sentinel the caller embedded, or mint a fresh random identifier.
fn adopt_or_mint_uuid(content: &str) -> (String, String) {
    let (provided, clean) = markdown::extract_uuid(content);
    match provided {
        Some(uuid) => (uuid, clean),
        None => (Uuid::new_v4().to_string(), clean),
    }
}

/// Last block of a tree, depth-first.
fn last_block(blocks: &[Block]) -> Option<&Block> {
    let last = blocks.last()?;
    last_block(&last.children).or(Some(last))
}

fn find_tag_in_blocks(blocks: &[Block], tag_lower: &str, matches: &mut Vec<Block>) {
    for block in blocks {
        let parsed = parser::parse(&block.content);
        if parsed.tags.iter().any(|t| t.to_lowercase() == tag_lower) {
            matches.push(block.clone());
        }
        find_tag_in_blocks(&block.children, tag_lower, matches);
    }
}

fn find_text_in_blocks(blocks: &[Block], query_lower: &str, matches: &mut Vec<Block>) {
    for block in blocks {
        if block.content.to_lowercase().contains(query_lower) {
            matches.push(block.clone());
        }
        find_text_in_blocks(&block.children, query_lower, matches);
    }
}

/// Write via a sibling temp file and rename, so concurrent readers observe
/// either the full pre-image or the full post-image.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}{TMP_SUFFIX}"));

    let mut file = fs::File::create(&tmp)
        .map_err(|e| Error::io(format!("create temp file {}", tmp.display()), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::io(format!("write temp file {}", tmp.display()), e))?;
    file.sync_all()
        .map_err(|e| Error::io(format!("sync temp file {}", tmp.display()), e))?;
    drop(file);

    fs::rename(&tmp, path)
        .map_err(|e| Error::io(format!("rename {} -> {}", tmp.display(), path.display()), e))
}

fn read_file(abs: &Path) -> Result<String> {
    fs::read_to_string(abs).map_err(|e| Error::io(format!("read {}", abs.display()), e))
}

fn validate_page_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("page name is empty".into()));
    }
    if name.len() > 255 {
        return Err(Error::InvalidInput(format!(
            "page name longer than 255 code units: {} bytes",
            name.len()
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidInput("page name contains a null byte".into()));
    }
    Ok(())
}

/// Canonical page name of a relative file path: extension stripped.
fn page_name_of(rel_path: &str) -> &str {
    rel_path.strip_suffix(".md").unwrap_or(rel_path)
}

fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn mtime_millis(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn yaml_value_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

fn lock_poisoned(detail: &str) -> Error {
    internal_io(format!("index lock poisoned: {detail}"))
}

fn internal_io(message: String) -> Error {
    Error::io(
        "index consistency",
        std::io::Error::new(std::io::ErrorKind::Other, message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_name_of_strips_extension() {
        assert_eq!(page_name_of("projects/roadmap.md"), "projects/roadmap");
        assert_eq!(page_name_of("plain"), "plain");
    }

    #[test]
    fn test_locate_block_form_prefers_embedded() {
        let uuid = "0a1b2c3d-0000-1111-2222-333344445555";
        let content = "# Title\nbody";
        let file = format!("{}\nrest", markdown::embed_uuid(content, uuid));
        assert_eq!(
            locate_block_form(&file, content, uuid).unwrap(),
            markdown::embed_uuid(content, uuid)
        );

        let bare = "# Title\nbody\nrest";
        assert_eq!(locate_block_form(bare, content, uuid).unwrap(), content);
        assert!(locate_block_form("unrelated", content, uuid).is_none());
    }

    #[test]
    fn test_validate_page_name_limits() {
        assert!(validate_page_name("fine/name").is_ok());
        assert!(matches!(
            validate_page_name(&"x".repeat(256)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_page_name("bad\0name"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(validate_page_name(""), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_yaml_value_string_forms() {
        assert_eq!(
            yaml_value_string(&serde_yaml::Value::String("plain".into())),
            "plain"
        );
        assert_eq!(
            yaml_value_string(&serde_yaml::Value::Number(7.into())),
            "7"
        );
    }
}
