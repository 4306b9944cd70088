#[cfg(test)]
mod tests {
    use alloc::{string::String, sync::Arc, vec::Vec};

    use crate::{
        store::doubles::FailingStore, Access, Action, BlobStore, Block, FatConfig, FatError,
        FatFs, FatResult, MemBlobStore, PermissionChange, Role, StaticUsers, StepClock,
    };

    type TestFs = FatFs<MemBlobStore, StaticUsers>;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn users() -> StaticUsers {
        StaticUsers::new()
            .with("root", Role::Admin)
            .with("alice", Role::User)
            .with("bob", Role::User)
            .with("carol", Role::User)
    }

    fn engine<S: BlobStore>(store: Arc<S>, config: FatConfig) -> FatResult<FatFs<S, StaticUsers>> {
        init_log();
        FatFs::new(store, users(), Arc::new(StepClock::starting_at(1_000)), config)
    }

    fn fixture() -> (Arc<MemBlobStore>, TestFs) {
        let store = Arc::new(MemBlobStore::new());
        let fs = engine(store.clone(), FatConfig::default()).unwrap();
        (store, fs)
    }

    fn block_keys(store: &MemBlobStore) -> Vec<String> {
        store
            .keys()
            .into_iter()
            .filter(|k| k.starts_with("block.") && k != "block.seq")
            .collect()
    }

    #[test]
    fn test_notes_scenario() {
        let (_, fs) = fixture();
        let text = "hello world this is a longer text";
        fs.create("notes", text, "alice").unwrap();

        let opened = fs.open("notes", "alice").unwrap();
        assert_eq!(opened.content, text);
        assert_eq!(opened.entry.size, text.chars().count());
        assert_eq!(opened.entry.owner, "alice");
        assert!(opened.entry.permissions.is_empty());
        assert_eq!(opened.entry.created_at, opened.entry.modified_at);

        let blocks = fs.block_store();
        let ids = blocks.chain_blocks(opened.entry.head).unwrap();
        let payloads: Vec<String> = ids
            .iter()
            .map(|id| blocks.load_block(*id).unwrap().unwrap().payload)
            .collect();
        assert_eq!(payloads, ["hello world this is ", "a longer text"]);
    }

    #[test]
    fn test_create_rejects_empty_input() {
        let (store, fs) = fixture();
        assert_eq!(fs.create("", "content", "alice"), Err(FatError::EmptyInput));
        assert_eq!(fs.create("name", "", "alice"), Err(FatError::EmptyInput));
        assert!(store.is_empty());
    }

    #[test]
    fn test_names_are_never_reused() {
        let (store, fs) = fixture();
        fs.create("f", "first", "alice").unwrap();
        assert_eq!(
            fs.create("f", "second", "bob"),
            Err(FatError::NameTaken("f".into()))
        );

        fs.delete("f", "alice").unwrap();
        assert_eq!(
            fs.create("f", "third", "root"),
            Err(FatError::NameTaken("f".into()))
        );
        // the failed creates left no blocks behind
        assert_eq!(block_keys(&store).len(), 1);
    }

    #[test]
    fn test_trash_roundtrip_preserves_content() {
        let (store, fs) = fixture();
        let text = "content that survives a trip through the trash";
        fs.create("doc", text, "alice").unwrap();
        let before = block_keys(&store);

        fs.delete("doc", "alice").unwrap();
        assert_eq!(fs.open("doc", "alice"), Err(FatError::InTrash("doc".into())));
        assert_eq!(
            fs.delete("doc", "alice"),
            Err(FatError::AlreadyTrashed("doc".into()))
        );
        let trashed = fs.snapshot().unwrap().get("doc").cloned().unwrap();
        assert!(trashed.trashed);
        assert!(trashed.trashed_at.is_some());
        assert_eq!(block_keys(&store), before);

        fs.recover("doc", "alice").unwrap();
        assert_eq!(
            fs.recover("doc", "alice"),
            Err(FatError::NotTrashed("doc".into()))
        );
        let opened = fs.open("doc", "alice").unwrap();
        assert_eq!(opened.content, text);
        assert!(!opened.entry.trashed);
        assert_eq!(opened.entry.trashed_at, None);
    }

    #[test]
    fn test_trashed_file_rejects_content_ops() {
        let (_, fs) = fixture();
        fs.create("doc", "text", "alice").unwrap();
        fs.delete("doc", "alice").unwrap();
        assert_eq!(
            fs.modify("doc", "new", "alice"),
            Err(FatError::InTrash("doc".into()))
        );
        assert_eq!(
            fs.manage_permission("doc", "alice", "bob", Action::Read, true),
            Err(FatError::InTrash("doc".into()))
        );
    }

    #[test]
    fn test_missing_file() {
        let (_, fs) = fixture();
        let missing = || FatError::NotFound("nope".into());
        assert_eq!(fs.open("nope", "alice"), Err(missing()));
        assert_eq!(fs.modify("nope", "x", "alice"), Err(missing()));
        assert_eq!(fs.delete("nope", "alice"), Err(missing()));
        assert_eq!(fs.recover("nope", "alice"), Err(missing()));
        assert_eq!(
            fs.manage_permission("nope", "alice", "bob", Action::Read, true),
            Err(missing())
        );
    }

    #[test]
    fn test_authorization_matrix() {
        let (_, fs) = fixture();
        fs.create("f", "shared text", "alice").unwrap();
        fs.manage_permission("f", "alice", "bob", Action::Read, true)
            .unwrap();

        assert!(fs.open("f", "alice").is_ok());
        assert!(fs.open("f", "bob").is_ok());
        assert_eq!(fs.modify("f", "bob was here", "bob"), Err(FatError::Forbidden));
        assert_eq!(fs.open("f", "carol"), Err(FatError::Forbidden));

        // grants never cover delete or permission management
        assert_eq!(fs.delete("f", "bob"), Err(FatError::Forbidden));
        assert_eq!(
            fs.manage_permission("f", "bob", "carol", Action::Read, true),
            Err(FatError::Forbidden)
        );

        fs.modify("f", "root edit", "root").unwrap();
        assert_eq!(fs.open("f", "root").unwrap().content, "root edit");
        fs.manage_permission("f", "root", "carol", Action::Write, true)
            .unwrap();
        fs.delete("f", "root").unwrap();
        fs.recover("f", "root").unwrap();
    }

    #[test]
    fn test_write_grant_allows_modify() {
        let (_, fs) = fixture();
        fs.create("f", "v1", "alice").unwrap();
        fs.manage_permission("f", "alice", "bob", Action::Write, true)
            .unwrap();
        fs.modify("f", "v2 by bob", "bob").unwrap();
        // write does not imply read
        assert_eq!(fs.open("f", "bob"), Err(FatError::Forbidden));
        assert_eq!(fs.open("f", "alice").unwrap().content, "v2 by bob");
    }

    #[test]
    fn test_permission_changes_are_idempotent() {
        let (_, fs) = fixture();
        fs.create("f", "text", "alice").unwrap();

        let grant = || fs.manage_permission("f", "alice", "bob", Action::Read, true);
        assert_eq!(grant(), Ok(PermissionChange::Granted));
        let after_first = fs.snapshot().unwrap();
        assert_eq!(grant(), Ok(PermissionChange::AlreadyGranted));
        assert_eq!(fs.snapshot().unwrap(), after_first);
        assert_eq!(
            after_first.get("f").unwrap().granted("bob"),
            Access::READ
        );

        let revoke = || fs.manage_permission("f", "alice", "bob", Action::Read, false);
        assert_eq!(revoke(), Ok(PermissionChange::Revoked));
        assert_eq!(revoke(), Ok(PermissionChange::NotGranted));
        assert!(fs.snapshot().unwrap().get("f").unwrap().permissions.is_empty());
    }

    #[test]
    fn test_manage_permission_validation() {
        let (_, fs) = fixture();
        fs.create("f", "text", "alice").unwrap();
        assert_eq!(
            fs.manage_permission("f", "alice", "mallory", Action::Read, true),
            Err(FatError::UnknownTarget("mallory".into()))
        );
        assert_eq!(
            fs.manage_permission("f", "alice", "bob", Action::Manage, true),
            Err(FatError::InvalidPermission("manage".into()))
        );
    }

    #[test]
    fn test_modify_replaces_chain() {
        let (store, fs) = fixture();
        fs.create("f", "a short text", "alice").unwrap();
        let old = fs.snapshot().unwrap().get("f").cloned().unwrap();

        let text = "a much longer replacement text spanning three blocks";
        fs.modify("f", text, "alice").unwrap();
        let new = fs.open("f", "alice").unwrap();
        assert_eq!(new.content, text);
        assert_eq!(new.entry.size, text.chars().count());
        assert_ne!(new.entry.head, old.head);
        assert!(new.entry.modified_at > old.modified_at);
        assert_eq!(new.entry.created_at, old.created_at);
        assert_eq!(block_keys(&store).len(), 3);

        assert_eq!(fs.modify("f", "", "alice"), Err(FatError::EmptyInput));
    }

    #[test]
    fn test_modify_tolerates_broken_old_chain() {
        let (store, fs) = fixture();
        fs.create("f", "old content spanning two blocks", "alice")
            .unwrap();
        let head = fs.snapshot().unwrap().get("f").unwrap().head.unwrap();
        store.delete(&head.key()).unwrap();

        fs.modify("f", "fresh", "alice").unwrap();
        assert_eq!(fs.open("f", "alice").unwrap().content, "fresh");
    }

    #[test]
    fn test_open_detects_corrupt_chain() {
        let (store, fs) = fixture();
        fs.create("f", "hello world this is a longer text", "alice")
            .unwrap();
        let head = fs.snapshot().unwrap().get("f").unwrap().head.unwrap();
        store.delete(&head.key()).unwrap();
        assert_eq!(fs.open("f", "alice"), Err(FatError::CorruptChain(head)));
    }

    #[test]
    fn test_list_filters_and_marks_restricted() {
        let (_, fs) = fixture();
        fs.create("a", "alice's", "alice").unwrap();
        fs.create("b", "bob's", "bob").unwrap();
        fs.create("c", "to be trashed", "alice").unwrap();
        fs.delete("c", "alice").unwrap();

        let rows = fs.list(false, "alice").unwrap();
        let names: Vec<(&str, bool)> = rows
            .iter()
            .map(|r| (r.name.as_str(), r.readable))
            .collect();
        assert_eq!(names, [("a", true), ("b", false)]);

        let trash = fs.list(true, "bob").unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].name, "c");
        assert!(!trash[0].readable);

        assert!(fs.list(false, "root").unwrap().iter().all(|r| r.readable));
    }

    #[test]
    fn test_state_persists_across_instances() {
        let (store, fs) = fixture();
        fs.create("f", "persistent text", "alice").unwrap();
        fs.manage_permission("f", "alice", "bob", Action::Read, true)
            .unwrap();
        drop(fs);

        let users = StaticUsers::new()
            .with("alice", Role::User)
            .with("bob", Role::User);
        let reopened = FatFs::new(
            store.clone(),
            users,
            Arc::new(StepClock::starting_at(5_000)),
            FatConfig::default(),
        )
        .unwrap();
        assert_eq!(reopened.open("f", "bob").unwrap().content, "persistent text");
        reopened.create("g", "more", "bob").unwrap();
        assert_eq!(reopened.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_writer_conflict() {
        let (store, fs) = fixture();
        fs.create("f", "text", "alice").unwrap();

        // another process saved behind our back
        let other = crate::FatTable::new(store.clone(), crate::BLOCK_SIZE);
        let mut stale = other.load().unwrap();
        fs.create("g", "more", "alice").unwrap();
        assert!(matches!(
            other.save(&mut stale),
            Err(FatError::Conflict { expected: 1, found: 2 })
        ));
        assert!(store.get("fat.table").unwrap().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FatConfig {
            block_size: 0,
            ..FatConfig::default()
        };
        let built = FatFs::new(
            Arc::new(MemBlobStore::new()),
            StaticUsers::new(),
            Arc::new(StepClock::default()),
            config,
        );
        assert!(matches!(built, Err(FatError::Codec(_))));
    }

    #[test]
    fn test_threads_share_engine() {
        let (_, fs) = fixture();
        let fs = Arc::new(fs);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let fs = fs.clone();
                std::thread::spawn(move || {
                    let name = alloc::format!("file-{}", i);
                    fs.create(&name, "written from a worker thread", "alice")
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(fs.list(false, "alice").unwrap().len(), 4);
    }

    #[test]
    fn test_reopen_with_other_block_size_is_refused() {
        let store = Arc::new(MemBlobStore::new());
        let small = FatConfig {
            block_size: 8,
            ..FatConfig::default()
        };
        let fs = engine(store.clone(), small).unwrap();
        fs.create("f", "twenty five characters!!!", "alice").unwrap();
        drop(fs);

        assert!(matches!(
            engine(store.clone(), FatConfig::default()),
            Err(FatError::BlockSizeMismatch {
                stored: 8,
                configured: 20
            })
        ));
        let reopened = engine(store, small).unwrap();
        assert_eq!(
            reopened.open("f", "alice").unwrap().content,
            "twenty five characters!!!"
        );
    }

    #[test]
    fn test_failed_table_save_releases_new_chain_on_create() {
        let store = Arc::new(FailingStore::default());
        let fs = engine(store.clone(), FatConfig::default()).unwrap();
        store.arm("fat.table");

        assert!(matches!(
            fs.create("f", "content spanning two blocks", "alice"),
            Err(FatError::Io(_))
        ));
        assert!(block_keys(&store.inner).is_empty());
        assert!(store.get("fat.table").unwrap().is_none());

        store.disarm();
        fs.create("f", "content spanning two blocks", "alice").unwrap();
        assert_eq!(block_keys(&store.inner).len(), 2);
    }

    #[test]
    fn test_failed_table_save_keeps_old_content_on_modify() {
        let store = Arc::new(FailingStore::default());
        let fs = engine(store.clone(), FatConfig::default()).unwrap();
        fs.create("f", "old content spanning two blocks", "alice")
            .unwrap();
        let before = block_keys(&store.inner);
        let generation = fs.snapshot().unwrap().generation();

        store.arm("fat.table");
        assert!(matches!(
            fs.modify("f", "replacement text that is also long", "alice"),
            Err(FatError::Io(_))
        ));
        store.disarm();

        assert_eq!(block_keys(&store.inner), before);
        assert_eq!(fs.snapshot().unwrap().generation(), generation);
        assert_eq!(
            fs.open("f", "alice").unwrap().content,
            "old content spanning two blocks"
        );
    }

    #[test]
    fn test_modify_frees_only_the_recorded_length() {
        let (store, fs) = fixture();
        fs.create("a", "short", "alice").unwrap();
        fs.create("b", "a neighbour that must survive", "bob").unwrap();
        let table = fs.snapshot().unwrap();
        let a_head = table.get("a").unwrap().head.unwrap();
        let b_head = table.get("b").unwrap().head;

        // a's only block now links into b's chain
        let linked = Block {
            payload: String::from("short"),
            next: b_head,
            is_last: false,
        };
        store
            .put(&a_head.key(), &serde_json::to_vec(&linked).unwrap())
            .unwrap();

        fs.modify("a", "new", "alice").unwrap();
        assert_eq!(
            fs.open("b", "bob").unwrap().content,
            "a neighbour that must survive"
        );
        assert_eq!(fs.open("a", "alice").unwrap().content, "new");
    }
}
