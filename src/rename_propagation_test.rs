// Rename pipeline tests: link rewriting across the vault, backlink
// integrity, and directory cleanup.

#[cfg(test)]
mod rename_propagation_tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::backend::Backend;
    use crate::cancel::CancelToken;
    use crate::error::Error;
    use crate::vault::Vault;
    use crate::Config;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        let vault = Vault::open(Config::new(dir.path())).unwrap();
        (dir, vault)
    }

    fn token() -> CancelToken {
        CancelToken::new()
    }

    #[test]
    fn test_rename_rewrites_referring_pages() {
        let (dir, vault) = vault_with(&[
            ("projects/engine.md", "# Engine\nthe project"),
            ("linker.md", "See [[projects/engine]] for details"),
            ("other.md", "Unrelated content"),
        ]);
        let tok = token();

        let report = vault
            .rename_page(&tok, "projects/engine", "tools/engine")
            .unwrap();
        assert_eq!(report.pages_updated, 1);
        assert!(report.failed_pages.is_empty());

        // The old page is gone, the new one exists.
        assert!(vault.get_page(&tok, "projects/engine").unwrap().is_none());
        assert!(vault.get_page(&tok, "tools/engine").unwrap().is_some());

        // Referring files carry only the new link.
        let linker = fs::read_to_string(dir.path().join("linker.md")).unwrap();
        assert!(linker.contains("[[tools/engine]]"));
        assert!(!linker.contains("[[projects/engine]]"));

        // No file anywhere still holds the old literal.
        for entry in walkdir::WalkDir::new(dir.path()) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let content = fs::read_to_string(entry.path()).unwrap();
                assert!(
                    !content.contains("[[projects/engine]]"),
                    "stale link in {}",
                    entry.path().display()
                );
            }
        }
    }

    #[test]
    fn test_rename_moves_backlinks_to_new_name() {
        let (_dir, vault) = vault_with(&[
            ("hub.md", "# Hub"),
            ("fan-one.md", "links to [[hub]] here"),
            ("fan-two.md", "also [[hub]]"),
        ]);
        let tok = token();

        let before = vault.backlinks(&tok, "hub").unwrap();
        assert_eq!(before.len(), 2);

        vault.rename_page(&tok, "hub", "core").unwrap();

        let old = vault.backlinks(&tok, "hub").unwrap();
        assert!(old.is_empty());
        let after = vault.backlinks(&tok, "core").unwrap();
        let mut sources: Vec<String> = after.iter().map(|b| b.page_name.clone()).collect();
        sources.sort();
        assert_eq!(sources, vec!["fan-one", "fan-two"]);
    }

    #[test]
    fn test_rename_into_occupied_name_fails() {
        let (_dir, vault) = vault_with(&[("a.md", "page a"), ("b.md", "page b")]);
        let err = vault.rename_page(&token(), "a", "B").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        // Nothing changed.
        assert!(vault.get_page(&token(), "a").unwrap().is_some());
    }

    #[test]
    fn test_rename_missing_page_is_not_found() {
        let (_dir, vault) = vault_with(&[]);
        assert!(matches!(
            vault.rename_page(&token(), "ghost", "anything"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_cleans_up_empty_source_directory() {
        let (dir, vault) = vault_with(&[("old/place/note.md", "# Note")]);
        vault
            .rename_page(&token(), "old/place/note", "new/spot/note")
            .unwrap();
        assert!(!dir.path().join("old").exists());
        assert!(dir.path().join("new/spot/note.md").exists());
    }

    #[test]
    fn test_rename_preserves_block_identity() {
        let (_dir, vault) = vault_with(&[]);
        let tok = token();
        let block = vault
            .append_block(&tok, "before", "## Stable\ncontent")
            .unwrap();

        vault.rename_page(&tok, "before", "after").unwrap();

        let (owner, found) = vault.get_block(&tok, &block.uuid).unwrap().unwrap();
        assert_eq!(owner, "after");
        assert_eq!(found.content, "## Stable\ncontent");
    }

    #[test]
    fn test_rename_updates_search_index() {
        let (_dir, vault) = vault_with(&[
            ("subject.md", "# Subject\ndistinctive wording"),
            ("pointer.md", "see [[subject]]"),
        ]);
        let tok = token();
        vault.rename_page(&tok, "subject", "renamed").unwrap();

        use crate::backend::FullTextSearch;
        let hits = vault.full_text_search(&tok, "distinctive wording", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page, "renamed");

        // The rewritten pointer file is searchable under the new target.
        let hits = vault.full_text_search(&tok, "renamed", 10).unwrap();
        assert!(hits.iter().any(|h| h.page == "pointer"));
    }
}
