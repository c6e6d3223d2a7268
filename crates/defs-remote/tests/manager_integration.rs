//! End-to-end behavior of the directory manager over the in-memory backend.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use defs_core::{
    DirectoryNode, FileEntry, OperationKind, OperationOutcome, OperationStatus, Role, Signer,
    VfsError,
};
use defs_remote::backends::{CallPhase, CallRecord};
use defs_remote::{DirectoryManager, ManagerOptions, MemoryBackend, WalkItem, WalkOptions};

const MUTATIONS: [&str; 6] = [
    "create_directory",
    "delete_file",
    "delete_directory",
    "upload_file",
    "reserve_space",
    "grant_allocator_role",
];

fn manager(backend: &Arc<MemoryBackend>) -> DirectoryManager {
    DirectoryManager::new(
        backend.clone(),
        "dfs://0xabc",
        Some(Signer::new("0xabc")),
        ManagerOptions::default(),
    )
}

async fn dir(manager: &DirectoryManager, depath: &str) -> Arc<DirectoryNode> {
    manager
        .resolve_path(depath)
        .await
        .unwrap()
        .and_then(|entry| entry.as_directory().cloned())
        .unwrap_or_else(|| panic!("no directory at {}", depath))
}

async fn file(manager: &DirectoryManager, depath: &str) -> FileEntry {
    manager
        .resolve_path(depath)
        .await
        .unwrap()
        .and_then(|entry| entry.as_file().cloned())
        .unwrap_or_else(|| panic!("no file at {}", depath))
}

fn mutation_records(backend: &MemoryBackend) -> Vec<CallRecord> {
    backend
        .journal()
        .into_iter()
        .filter(|r| MUTATIONS.contains(&r.op))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_mutations_reach_backend_in_submission_order() {
    let backend = Arc::new(MemoryBackend::with_latency(Duration::from_millis(20)));
    let manager = manager(&backend);
    let root = manager.root_directory();

    let uploads = (0..5).map(|i| {
        let root = Arc::clone(&root);
        let manager = &manager;
        async move {
            manager
                .upload_file(&root, &format!("f{}.txt", i), vec![b'x'; i + 1])
                .await
        }
    });
    let results = futures::future::join_all(uploads).await;

    let ids: Vec<u64> = results.into_iter().map(|r| r.unwrap().id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    // Every mutation settles before the next one starts
    let records = mutation_records(&backend);
    assert_eq!(records.len(), 10);
    for (i, pair) in records.chunks(2).enumerate() {
        let expected = format!("0xabc/f{}.txt", i);
        assert_eq!(pair[0].phase, CallPhase::Start);
        assert_eq!(pair[1].phase, CallPhase::Finish);
        assert_eq!(pair[0].path, expected);
        assert_eq!(pair[1].path, expected);
    }
}

#[tokio::test]
async fn test_load_after_upload_sees_new_file() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/x.txt", b"x");
    let manager = manager(&backend);

    let before = manager.load("0xabc/a", false).await.unwrap();
    let names: Vec<_> = before.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["x.txt"]);

    let a = dir(&manager, "a").await;
    let event = manager.upload_file(&a, "y.txt", b"y".to_vec()).await.unwrap();
    assert_eq!(event.kind, OperationKind::UploadFile);
    assert_eq!(event.result.destination.as_deref(), Some("a"));
    assert_eq!(
        event.result.outcome,
        OperationOutcome::Uploaded {
            path: "a/y.txt".to_string()
        }
    );

    let after = manager.load("0xabc/a", false).await.unwrap();
    let names: Vec<_> = after.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["x.txt", "y.txt"]);
}

#[tokio::test]
async fn test_failed_mutation_still_invalidates_destination() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/x.txt", b"x");
    let manager = manager(&backend);
    let a = dir(&manager, "a").await;
    manager.load("0xabc/a", false).await.unwrap();

    // Changed behind the cache's back
    backend.seed_file("0xabc/a/z.txt", b"z");
    backend.fail_on("upload_file", None);

    let err = manager
        .upload_file(&a, "y.txt", b"y".to_vec())
        .await
        .unwrap_err();
    let event = err.event().unwrap();
    assert_eq!(event.status, OperationStatus::Error);
    assert!(matches!(event.result.outcome, OperationOutcome::Failed { .. }));

    let names: Vec<_> = manager
        .load("0xabc/a", false)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert!(names.contains(&"z.txt".to_string()));
}

#[tokio::test]
async fn test_error_does_not_halt_queue_and_reaches_subscribers() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = manager(&backend);
    let root = manager.root_directory();
    let mut events = manager.subscribe();

    backend.fail_on("create_directory", Some("0xabc/broken"));
    let failed = manager.create_directory(&root, "broken").await;
    let created = manager.create_directory(&root, "fine").await;

    let failed_id = match failed {
        Err(VfsError::OperationFailed(event)) => event.id,
        other => panic!("expected failed operation, got {:?}", other),
    };
    let created = created.unwrap();

    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    assert_eq!(first.id, failed_id);
    assert_eq!(first.status, OperationStatus::Error);
    assert_eq!(second.id, created.id);
    assert_eq!(second.status, OperationStatus::Success);
    assert!(backend.dir_exists("0xabc/fine"));
}

#[tokio::test]
async fn test_resolve_path() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/b/c.txt", b"c");
    backend.seed_file("0xabc/d.txt", b"d");
    let manager = manager(&backend);

    let root = manager.resolve_path("").await.unwrap().unwrap();
    assert!(Arc::ptr_eq(root.as_directory().unwrap(), &manager.root_directory()));

    let mut seen = Vec::new();
    manager
        .walk(manager.root_directory(), WalkOptions::default(), |item| {
            if let WalkItem::Entry(entry) = item {
                seen.push(entry.path().to_string());
            }
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(seen.len(), 4);

    for path in seen {
        let resolved = manager.resolve_path(&path).await.unwrap().unwrap();
        assert_eq!(resolved.path(), path);
    }
    assert!(manager.resolve_path("a/nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_recursive_delete_removes_descendants_first() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/x.txt", b"x");
    backend.seed_file("0xabc/a/b/y.txt", b"y");
    backend.seed_dir("0xabc/a/c");
    backend.seed_file("0xabc/keep.txt", b"k");
    let manager = manager(&backend);
    let a = dir(&manager, "a").await;
    let b = dir(&manager, "a/b").await;

    let event = manager.delete_directory(&a).await.unwrap();
    assert_eq!(event.kind, OperationKind::DeleteDirectory);

    assert_eq!(
        backend.mutations(),
        vec![
            "delete_file 0xabc/a/b/y.txt",
            "delete_directory 0xabc/a/b",
            "delete_directory 0xabc/a/c",
            "delete_file 0xabc/a/x.txt",
            "delete_directory 0xabc/a",
        ]
    );
    assert!(!backend.dir_exists("0xabc/a"));
    assert!(backend.file_exists("0xabc/keep.txt"));

    // Evicted from the index; the stale node is not handed back
    assert!(manager.tree().index().get("a/b").is_none());
    assert!(manager.resolve_path(b.path()).await.unwrap().is_none());
    assert!(manager.resolve_path("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_recursive_delete_stops_at_first_failure() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/x.txt", b"x");
    backend.seed_file("0xabc/a/y.txt", b"y");
    let manager = manager(&backend);
    let a = dir(&manager, "a").await;

    backend.fail_on("delete_file", Some("0xabc/a/x.txt"));
    let err = manager.delete_directory(&a).await.unwrap_err();

    assert_eq!(err.event().map(|e| e.kind), Some(OperationKind::DeleteFile));
    assert_eq!(backend.mutations(), vec!["delete_file 0xabc/a/x.txt"]);
    assert!(backend.file_exists("0xabc/a/y.txt"));
}

#[tokio::test]
async fn test_deleting_root_is_rejected_before_queueing() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a.txt", b"a");
    let manager = manager(&backend);
    let mut events = manager.subscribe();

    let err = manager
        .delete_directory(&manager.root_directory())
        .await
        .unwrap_err();

    assert!(matches!(err, VfsError::Unknown(_)));
    assert!(backend.journal().is_empty());
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn test_max_depth_zero_never_lists_subdirectories() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a/x.txt", b"x");
    backend.seed_dir("0xabc/b");
    backend.seed_file("0xabc/c.txt", b"c");
    let manager = manager(&backend);

    let mut walker = manager.walker(manager.root_directory(), WalkOptions::default().max_depth(0));
    let mut names = Vec::new();
    while let Some(item) = walker.next().await.unwrap() {
        if let WalkItem::Entry(entry) = item {
            names.push(entry.name().to_string());
        }
    }

    assert_eq!(names, vec!["a", "b", "c.txt"]);
    assert_eq!(backend.calls("list_directory"), vec!["0xabc"]);
}

#[tokio::test]
async fn test_search() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/docs/report.pdf", b"r");
    backend.seed_file("0xabc/docs/notes.txt", b"n");
    backend.seed_file("0xabc/photo.png", b"p");
    let manager = manager(&backend);
    let root = manager.root_directory();

    assert!(manager.search(Arc::clone(&root), "").await.unwrap().is_empty());
    assert!(manager
        .search(Arc::clone(&root), "zzzz")
        .await
        .unwrap()
        .is_empty());

    let found = manager.search(Arc::clone(&root), "photo.png").await.unwrap();
    assert_eq!(found.first().map(|f| f.path()), Some("photo.png"));

    let docs = dir(&manager, "docs").await;
    let scoped = manager.search(docs, "notes").await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].path(), "docs/notes.txt");
}

#[tokio::test]
async fn test_mutations_require_signer_and_ownership() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = DirectoryManager::new(
        backend.clone(),
        "0xabc",
        None,
        ManagerOptions::default(),
    );
    let root = manager.root_directory();

    assert!(matches!(
        manager.create_directory(&root, "a").await,
        Err(VfsError::NoAccount)
    ));

    manager.set_signer(Some(Signer::new("0xdef")));
    assert!(matches!(
        manager.upload_file(&root, "a.txt", Vec::new()).await,
        Err(VfsError::NotAuthorized(_))
    ));

    manager.set_signer(Some(Signer::new("dfs://0xABC")));
    assert!(matches!(
        manager.upload_file(&root, "bad/name", Vec::new()).await,
        Err(VfsError::Unknown(_))
    ));
    assert!(manager.upload_file(&root, "a.txt", Vec::new()).await.is_ok());
    assert_eq!(backend.mutations(), vec!["upload_file 0xabc/a.txt"]);
}

#[tokio::test]
async fn test_roles_gate_space_operations() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/a.txt", b"12345");
    let manager = manager(&backend);

    assert!(matches!(
        manager.reserve_space(100).await,
        Err(VfsError::NotAuthorized(_))
    ));
    assert!(matches!(
        manager.grant_allocator_role("0xdef").await,
        Err(VfsError::NotAuthorized(_))
    ));
    assert!(backend.mutations().is_empty());

    backend.grant_role(Role::Admin, "0xabc");
    let granted = manager.grant_allocator_role("dfs://0xabc").await.unwrap();
    assert_eq!(granted.result.destination, None);
    assert_eq!(
        granted.result.outcome,
        OperationOutcome::RoleGranted {
            address: "0xabc".to_string()
        }
    );

    manager.reserve_space(100).await.unwrap();
    assert_eq!(manager.reserved_space().await.unwrap(), 100);
    assert_eq!(manager.occupied_space().await.unwrap(), 5);
    assert_eq!(manager.available_space().await.unwrap(), 95);

    // No destination: the whole cache was purged
    assert!(manager.cache_stats().await.purges >= 2);
}

#[tokio::test]
async fn test_download_and_delete_file() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed_file("0xabc/docs/a.txt", b"contents");
    let manager = manager(&backend);

    let a = file(&manager, "docs/a.txt").await;
    assert_eq!(a.media_type(), "text/plain");
    assert_eq!(manager.download_file(&a).await.unwrap(), b"contents");

    let event = manager.delete_file(&a).await.unwrap();
    assert_eq!(event.result.destination.as_deref(), Some("docs"));
    assert!(!backend.file_exists("0xabc/docs/a.txt"));

    let docs = dir(&manager, "docs").await;
    assert!(manager.load_directory(&docs, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_directory_then_navigate() {
    let backend = Arc::new(MemoryBackend::new());
    let manager = manager(&backend);
    let root = manager.root_directory();

    manager.create_directory(&root, "projects").await.unwrap();
    let children = manager.load_directory(&root, false).await.unwrap();
    assert_eq!(children.len(), 1);
    let projects = children[0].as_directory().unwrap();
    assert_eq!(projects.path(), "projects");

    manager
        .upload_file(projects, "plan.md", b"# plan".to_vec())
        .await
        .unwrap();
    let plan = file(&manager, "projects/plan.md").await;
    assert_eq!(plan.size(), 6);
    assert_eq!(plan.parent_path(), "projects");
}

#[tokio::test(start_paused = true)]
async fn test_preload_keeps_listings_across_unrelated_mutation() {
    let backend = Arc::new(MemoryBackend::with_latency(Duration::from_millis(20)));
    backend.seed_file("0xabc/a/s1/f.txt", b"f");
    backend.seed_dir("0xabc/b");
    let manager = manager(&backend);
    let b = dir(&manager, "b").await;

    // The upload settles while the listing of a/s1 is still in flight
    let (listed, uploaded) = tokio::join!(manager.preload(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.upload_file(&b, "y.txt", b"y".to_vec()).await
    });
    uploaded.unwrap();
    assert_eq!(listed.unwrap(), 4);

    let cache = manager.tree().cache();
    for path in ["0xabc", "0xabc/a", "0xabc/a/s1", "0xabc/b"] {
        assert!(cache.contains(path).await, "{} missing from cache", path);
    }
    assert_eq!(manager.cache_stats().await.stale_discards, 0);

    let names: Vec<_> = manager
        .load("0xabc/b", false)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["y.txt"]);
}
