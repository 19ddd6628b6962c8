//! Background file watcher: keeps the index set coherent with external
//! edits. Events are batched with a short debounce so editors and sync
//! tools that write in bursts trigger one re-index per file, not dozens.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};

use super::{Vault, TMP_SUFFIX};

/// How long the event loop sleeps between batch sweeps.
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// A path must be quiet this long before it is re-indexed.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub(crate) struct VaultWatcher {
    // Held so the notify backend stays registered; dropping it closes the
    // event channel and lets the thread drain and exit.
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl VaultWatcher {
    /// Watch the vault root recursively and feed changes back into the
    /// index. Watcher errors are logged, never fatal.
    pub fn start(vault: Arc<Vault>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            tx,
            NotifyConfig::default().with_poll_interval(Duration::from_millis(300)),
        )
        .map_err(|e| watcher_error("create watcher", e))?;

        watcher
            .watch(vault.root(), RecursiveMode::Recursive)
            .map_err(|e| watcher_error("register vault root", e))?;

        let thread = thread::spawn(move || event_loop(vault, rx));
        Ok(VaultWatcher {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }

    /// Close the watcher and join the event thread. Pending events are
    /// drained before the thread exits.
    pub fn stop(mut self) {
        self.watcher.take(); // closes the channel
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("[watcher] event thread panicked during shutdown");
            }
        }
    }
}

fn event_loop(vault: Arc<Vault>, rx: mpsc::Receiver<notify::Result<notify::Event>>) {
    // Paths with their last-seen event time, awaiting stability.
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(event)) => {
                let now = Instant::now();

                if matches!(event.kind, EventKind::Remove(_)) {
                    for path in &event.paths {
                        if !should_process(path, vault.root()) {
                            continue;
                        }
                        pending.remove(path);
                        vault.handle_file_removed(path);
                    }
                    continue;
                }

                for path in &event.paths {
                    if should_process(path, vault.root()) {
                        pending.insert(path.clone(), now);
                    }
                }
            }
            Ok(Err(e)) => {
                log::warn!("[watcher] error: {e}");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                sweep_stable(&vault, &mut pending, SETTLE_DELAY);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Shutdown: flush whatever is still pending, then exit.
                sweep_stable(&vault, &mut pending, Duration::ZERO);
                log::debug!("[watcher] event channel closed, exiting");
                return;
            }
        }
    }
}

/// Process every pending path that has been quiet for at least `settle`.
fn sweep_stable(vault: &Vault, pending: &mut HashMap<PathBuf, Instant>, settle: Duration) {
    let now = Instant::now();
    let mut ready = Vec::new();
    pending.retain(|path, last_event| {
        if now.duration_since(*last_event) >= settle {
            ready.push(path.clone());
            false
        } else {
            true
        }
    });

    if !ready.is_empty() {
        log::debug!("[watcher] processing {} stable paths", ready.len());
    }
    for path in ready {
        if path.exists() && path.is_file() {
            vault.handle_file_changed(&path);
        } else {
            // The old half of a rename, or a deletion that surfaced as a
            // modify event. The new name arrives as its own create event.
            vault.handle_file_removed(&path);
        }
    }
}

/// Markdown files only, skipping atomic-write temp files and anything under
/// a hidden directory.
fn should_process(path: &Path, vault_root: &Path) -> bool {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if file_name.ends_with(TMP_SUFFIX) || file_name.starts_with('.') {
        return false;
    }
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return false;
    }

    let relative = path.strip_prefix(vault_root).unwrap_or(path);
    for component in relative.components() {
        if let std::path::Component::Normal(name) = component {
            if name.to_string_lossy().starts_with('.') {
                return false;
            }
        }
    }
    true
}

fn watcher_error(context: &str, e: notify::Error) -> Error {
    Error::io(
        format!("watcher: {context}"),
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processes_md_files() {
        let vault = PathBuf::from("/vault");
        assert!(should_process(&PathBuf::from("/vault/note.md"), &vault));
        assert!(should_process(&PathBuf::from("/vault/deep/nested/note.md"), &vault));
    }

    #[test]
    fn test_skips_tmp_files() {
        let vault = PathBuf::from("/vault");
        let tmp = PathBuf::from(format!("/vault/note.md{TMP_SUFFIX}"));
        assert!(!should_process(&tmp, &vault));
    }

    #[test]
    fn test_skips_hidden_directories_and_files() {
        let vault = PathBuf::from("/vault");
        assert!(!should_process(&PathBuf::from("/vault/.obsidian/cache.md"), &vault));
        assert!(!should_process(&PathBuf::from("/vault/.hidden.md"), &vault));
    }

    #[test]
    fn test_skips_non_markdown() {
        let vault = PathBuf::from("/vault");
        assert!(!should_process(&PathBuf::from("/vault/image.png"), &vault));
        assert!(!should_process(&PathBuf::from("/vault/data.json"), &vault));
    }
}
