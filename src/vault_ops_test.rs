// Vault store tests: loading, block identity, and the mutation pipeline.

#[cfg(test)]
mod vault_ops_tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::backend::Backend;
    use crate::cancel::CancelToken;
    use crate::error::Error;
    use crate::types::Block;
    use crate::vault::Vault;
    use crate::Config;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, Vault) {
        let dir = TempDir::new().unwrap();
        write_files(&dir, files);
        let vault = Vault::open(Config::new(dir.path())).unwrap();
        (dir, vault)
    }

    fn write_files(dir: &TempDir, files: &[(&str, &str)]) {
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
    }

    fn token() -> CancelToken {
        CancelToken::new()
    }

    #[test]
    fn test_load_registers_pages_by_relative_path() {
        let (_dir, vault) = vault_with(&[
            ("top.md", "top content"),
            ("projects/alpha.md", "# Alpha"),
        ]);
        let pages = vault.all_pages(&token()).unwrap();
        let mut names: Vec<String> = pages.iter().map(|p| p.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["projects/alpha", "top"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (_dir, vault) = vault_with(&[("Projects/Alpha.md", "# Alpha")]);
        let page = vault.get_page(&token(), "projects/alpha").unwrap().unwrap();
        assert_eq!(page.display_name, "Projects/Alpha");
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let (_dir, vault) = vault_with(&[
            ("note.md", "visible"),
            (".obsidian/cache.md", "hidden"),
        ]);
        assert_eq!(vault.all_pages(&token()).unwrap().len(), 1);
    }

    #[test]
    fn test_journal_flag_from_daily_folder() {
        let (_dir, vault) = vault_with(&[
            ("daily notes/2026-03-01.md", "journal entry"),
            ("regular.md", "note"),
        ]);
        let journal = vault
            .get_page(&token(), "daily notes/2026-03-01")
            .unwrap()
            .unwrap();
        assert!(journal.journal);
        let regular = vault.get_page(&token(), "regular").unwrap().unwrap();
        assert!(!regular.journal);
    }

    #[test]
    fn test_aliases_resolve_but_do_not_enumerate() {
        let (_dir, vault) = vault_with(&[(
            "plan.md",
            "---\naliases:\n  - Roadmap\n  - The Big Plan\n---\ncontent",
        )]);
        assert_eq!(vault.all_pages(&token()).unwrap().len(), 1);
        let via_alias = vault.get_page(&token(), "roadmap").unwrap().unwrap();
        assert_eq!(via_alias.name, "plan");
        let via_other = vault.get_page(&token(), "the big plan").unwrap().unwrap();
        assert_eq!(via_other.name, "plan");
    }

    #[test]
    fn test_block_identity_survives_reload() {
        let dir = TempDir::new().unwrap();
        write_files(&dir, &[("note.md", "# One\nbody\n## Two\nmore")]);

        let first = Vault::open(Config::new(dir.path())).unwrap();
        let blocks_a = first.page_blocks(&token(), "note").unwrap().unwrap();
        let mut uuids_a = Vec::new();
        Block::collect_uuids(&blocks_a, &mut uuids_a);

        let second = Vault::open(Config::new(dir.path())).unwrap();
        let blocks_b = second.page_blocks(&token(), "note").unwrap().unwrap();
        let mut uuids_b = Vec::new();
        Block::collect_uuids(&blocks_b, &mut uuids_b);

        assert_eq!(uuids_a, uuids_b);
    }

    #[test]
    fn test_uuid_map_matches_block_trees() {
        let (_dir, vault) = vault_with(&[
            ("a.md", "# Heading\ntext\n## Child\nnested"),
            ("b.md", "plain preamble"),
        ]);
        let tok = token();
        for page in vault.all_pages(&tok).unwrap() {
            let blocks = vault.page_blocks(&tok, &page.name).unwrap().unwrap();
            let mut uuids = Vec::new();
            Block::collect_uuids(&blocks, &mut uuids);
            for uuid in uuids {
                let (owner, block) = vault.get_block(&tok, &uuid).unwrap().unwrap();
                assert_eq!(owner, page.display_name);
                assert_eq!(block.uuid, uuid);
            }
        }
    }

    #[test]
    fn test_backlink_index_matches_block_links() {
        let (_dir, vault) = vault_with(&[
            ("source.md", "mentions [[Target One]] and [[other/two]]"),
            ("Target One.md", "# Target"),
            ("other/two.md", "# Two"),
        ]);
        let tok = token();

        // Keys are lowercased; entries name the linking page.
        let one = vault.backlinks(&tok, "target one").unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].page_name, "source");
        assert!(one[0].blocks[0].content.contains("[[Target One]]"));

        let two = vault.backlinks(&tok, "OTHER/TWO").unwrap();
        assert_eq!(two.len(), 1);
        assert_eq!(two[0].page_name, "source");

        assert!(vault.backlinks(&tok, "unlinked").unwrap().is_empty());
    }

    #[test]
    fn test_create_page_with_properties() {
        let (dir, vault) = vault_with(&[]);
        let props = serde_yaml::from_str("status: active").unwrap();
        let page = vault
            .create_page(&token(), "projects/new", Some(props))
            .unwrap();
        assert_eq!(page.name, "projects/new");

        let on_disk = fs::read_to_string(dir.path().join("projects/new.md")).unwrap();
        assert!(on_disk.starts_with("---\n"));
        assert!(on_disk.contains("status: active"));
    }

    #[test]
    fn test_create_page_rejects_duplicates() {
        let (_dir, vault) = vault_with(&[("existing.md", "here")]);
        let err = vault.create_page(&token(), "Existing", None).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_path_escape_rejected_and_nothing_written() {
        let (dir, vault) = vault_with(&[]);
        let err = vault
            .create_page(&token(), "../outside", None)
            .unwrap_err();
        assert!(matches!(err, Error::PathEscape(_)));
        assert!(!dir.path().parent().unwrap().join("outside.md").exists());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let (_dir, vault) = vault_with(&[]);
        let long = "x".repeat(256);
        assert!(matches!(
            vault.create_page(&token(), &long, None),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            vault.create_page(&token(), "nul\0name", None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_read_only_blocks_every_mutation() {
        let dir = TempDir::new().unwrap();
        write_files(&dir, &[("note.md", "# Note\ncontent")]);
        let mut config = Config::new(dir.path());
        config.read_only = true;
        let vault = Vault::open(config).unwrap();
        let tok = token();

        assert!(matches!(vault.create_page(&tok, "x", None), Err(Error::ReadOnly)));
        assert!(matches!(vault.append_block(&tok, "note", "y"), Err(Error::ReadOnly)));
        assert!(matches!(vault.update_block(&tok, "u", "z"), Err(Error::ReadOnly)));
        assert!(matches!(vault.delete_page(&tok, "note"), Err(Error::ReadOnly)));
        assert!(matches!(
            vault.rename_page(&tok, "note", "other"),
            Err(Error::ReadOnly)
        ));
        // The file is untouched.
        assert_eq!(
            fs::read_to_string(dir.path().join("note.md")).unwrap(),
            "# Note\ncontent"
        );
    }

    #[test]
    fn test_append_embeds_sentinel_and_indexes() {
        let (dir, vault) = vault_with(&[]);
        let block = vault
            .append_block(&token(), "inbox", "## Task A\ndetails")
            .unwrap();
        assert_eq!(block.content, "## Task A\ndetails");

        let on_disk = fs::read_to_string(dir.path().join("inbox.md")).unwrap();
        assert!(on_disk.contains(&format!("<!-- id: {} -->", block.uuid)));

        let (owner, found) = vault.get_block(&token(), &block.uuid).unwrap().unwrap();
        assert_eq!(owner, "inbox");
        assert_eq!(found.content, "## Task A\ndetails");
    }

    #[test]
    fn test_append_creates_missing_page() {
        let (dir, vault) = vault_with(&[]);
        vault
            .append_block(&token(), "fresh/page", "## New\nhello")
            .unwrap();
        assert!(dir.path().join("fresh/page.md").exists());
        assert!(vault.get_page(&token(), "fresh/page").unwrap().is_some());
    }

    #[test]
    fn test_prepend_respects_frontmatter() {
        let (dir, vault) = vault_with(&[(
            "note.md",
            "---\ntitle: Keep\n---\n# Existing\nbody",
        )]);
        vault
            .prepend_block(&token(), "note", "## First\nprepended")
            .unwrap();

        let on_disk = fs::read_to_string(dir.path().join("note.md")).unwrap();
        assert!(on_disk.starts_with("---\n"));
        let fm_end = on_disk[3..].find("\n---").unwrap() + 3;
        let body = &on_disk[fm_end..];
        let first_pos = body.find("## First").unwrap();
        let existing_pos = body.find("# Existing").unwrap();
        assert!(first_pos < existing_pos);
    }

    #[test]
    fn test_insert_block_nests_under_parent() {
        let (_dir, vault) = vault_with(&[]);
        let parent = vault
            .append_block(&token(), "note", "## Parent\nparent body")
            .unwrap();
        let child = vault
            .insert_block(&token(), &parent.uuid, "child text")
            .unwrap();
        assert!(child.content.starts_with("### child text"));

        let blocks = vault.page_blocks(&token(), "note").unwrap().unwrap();
        let parent_block = Block::find(&blocks, &parent.uuid).unwrap();
        assert_eq!(parent_block.children.len(), 1);
        assert_eq!(parent_block.children[0].uuid, child.uuid);
    }

    #[test]
    fn test_insert_block_unknown_parent() {
        let (_dir, vault) = vault_with(&[]);
        let err = vault
            .insert_block(&token(), "no-such-uuid", "content")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_update_block_preserves_identity() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(Config::new(dir.path())).unwrap();
        let tok = token();
        let block = vault.append_block(&tok, "note", "## Title\nversion one").unwrap();

        vault
            .update_block(&tok, &block.uuid, "## Title\nversion two")
            .unwrap();
        let (_, updated) = vault.get_block(&tok, &block.uuid).unwrap().unwrap();
        assert_eq!(updated.content, "## Title\nversion two");

        // A full re-parse from disk yields the same identifier.
        let reopened = Vault::open(Config::new(dir.path())).unwrap();
        let (_, again) = reopened.get_block(&tok, &block.uuid).unwrap().unwrap();
        assert_eq!(again.content, "## Title\nversion two");
    }

    #[test]
    fn test_remove_block_purges_file_and_index() {
        let (dir, vault) = vault_with(&[]);
        let tok = token();
        let keep = vault.append_block(&tok, "note", "## Keep\nstays").unwrap();
        let gone = vault.append_block(&tok, "note", "## Gone\nleaves").unwrap();

        vault.remove_block(&tok, &gone.uuid).unwrap();
        assert!(vault.get_block(&tok, &gone.uuid).unwrap().is_none());
        assert!(vault.get_block(&tok, &keep.uuid).unwrap().is_some());
        let on_disk = fs::read_to_string(dir.path().join("note.md")).unwrap();
        assert!(!on_disk.contains("## Gone"));
    }

    #[test]
    fn test_move_block_within_page() {
        let (dir, vault) = vault_with(&[]);
        let tok = token();
        let first = vault.append_block(&tok, "note", "## First\none").unwrap();
        let second = vault.append_block(&tok, "note", "## Second\ntwo").unwrap();

        vault.move_block(&tok, &second.uuid, &first.uuid, true).unwrap();
        let on_disk = fs::read_to_string(dir.path().join("note.md")).unwrap();
        assert!(on_disk.find("## Second").unwrap() < on_disk.find("## First").unwrap());
    }

    #[test]
    fn test_move_block_across_pages_keeps_identity() {
        let (_dir, vault) = vault_with(&[]);
        let tok = token();
        let moved = vault.append_block(&tok, "source", "## Moved\npayload").unwrap();
        let anchor = vault.append_block(&tok, "target", "## Anchor\nhere").unwrap();

        vault.move_block(&tok, &moved.uuid, &anchor.uuid, false).unwrap();

        let (owner, block) = vault.get_block(&tok, &moved.uuid).unwrap().unwrap();
        assert_eq!(owner, "target");
        assert_eq!(block.content, "## Moved\npayload");
        let source_blocks = vault.page_blocks(&tok, "source").unwrap().unwrap();
        assert!(Block::find(&source_blocks, &moved.uuid).is_none());
    }

    #[test]
    fn test_delete_page_removes_empty_ancestors() {
        let (dir, vault) = vault_with(&[("deep/nested/leaf.md", "content")]);
        vault.delete_page(&token(), "deep/nested/leaf").unwrap();
        assert!(vault.get_page(&token(), "deep/nested/leaf").unwrap().is_none());
        assert!(!dir.path().join("deep").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_delete_missing_page_is_not_found() {
        let (_dir, vault) = vault_with(&[]);
        assert!(matches!(
            vault.delete_page(&token(), "ghost"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cancelled_token_stops_before_write() {
        let (dir, vault) = vault_with(&[]);
        let tok = CancelToken::new();
        tok.cancel();
        let err = vault.create_page(&tok, "never", None).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!dir.path().join("never.md").exists());
    }

    #[test]
    fn test_reload_reflects_external_changes() {
        let (dir, vault) = vault_with(&[("note.md", "before")]);
        fs::write(dir.path().join("other.md"), "added externally").unwrap();
        vault.reload().unwrap();
        assert!(vault.get_page(&token(), "other").unwrap().is_some());
    }

    #[test]
    fn test_ping_checks_root() {
        let (_dir, vault) = vault_with(&[]);
        assert!(vault.ping(&token()).is_ok());
    }
}
