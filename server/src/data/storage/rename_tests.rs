use std::sync::Arc;

use reqwest::{Method, StatusCode};

use super::*;
use crate::data::storage::memory::{Fault, MemoryStorage};
use crate::data::storage::testing::{CDN_BASE, store_with};

fn engine(storage: Arc<MemoryStorage>, policy: CopyPolicy) -> RenameEngine {
    let (store, _) = store_with(storage);
    RenameEngine::new(store, policy)
}

fn seeded_client_folder() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("clientA/", Vec::new());
    storage.insert("clientA/one.txt", b"1".to_vec());
    storage.insert("clientA/two.pdf", b"22".to_vec());
    storage.insert("clientA/three.png", b"333".to_vec());
    storage.insert("clientA/empty/", Vec::new());
    storage
}

#[tokio::test]
async fn test_rename_file_moves_bytes() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("documents/a.txt", b"original".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.rename_file("documents/a.txt", "b.txt").await.unwrap();

    assert_eq!(outcome.destination, "documents/b.txt");
    assert_eq!(outcome.public_url, format!("{}/documents/b.txt", CDN_BASE));
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        storage.object_body("documents/b.txt").as_deref(),
        Some(&b"original"[..])
    );
    assert!(!storage.contains("documents/a.txt"));
}

#[tokio::test]
async fn test_rename_file_uses_new_extension_content_type() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("notes.txt", b"# hi".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    engine.rename_file("notes.txt", "notes.md").await.unwrap();
    let headers = storage.object_headers("notes.md").unwrap();
    assert_eq!(headers.content_type.as_deref(), Some("text/markdown"));
}

#[tokio::test]
async fn test_rename_file_failed_upload_leaves_source() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("docs/a.txt", b"a".to_vec());
    storage.fail_on(
        Method::PUT,
        "docs/b.txt",
        Fault::Status(StatusCode::INTERNAL_SERVER_ERROR),
    );
    let engine = engine(storage.clone(), CopyPolicy::default());

    let err = engine.rename_file("docs/a.txt", "b.txt").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(storage.contains("docs/a.txt"));
    assert_eq!(storage.count(&Method::DELETE, "docs/a.txt"), 0);
}

#[tokio::test]
async fn test_rename_file_unconfirmed_destination_leaves_source() {
    let storage = Arc::new(MemoryStorage::new().with_visibility_lag(10));
    storage.insert("docs/a.txt", b"a".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    let err = engine.rename_file("docs/a.txt", "b.txt").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::VerificationTimeout {
            operation: "copy",
            ..
        }
    ));
    assert!(storage.contains("docs/a.txt"));
    assert_eq!(storage.count(&Method::DELETE, "docs/a.txt"), 0);
}

#[tokio::test]
async fn test_rename_file_cleanup_failure_is_warning() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("docs/a.txt", b"a".to_vec());
    storage.fail_on(
        Method::DELETE,
        "docs/a.txt",
        Fault::Status(StatusCode::SERVICE_UNAVAILABLE),
    );
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.rename_file("docs/a.txt", "b.txt").await.unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("docs/a.txt"));
    assert!(storage.contains("docs/b.txt"));
}

#[tokio::test]
async fn test_rename_file_missing_source_is_not_found() {
    let engine = engine(Arc::new(MemoryStorage::new()), CopyPolicy::default());
    let err = engine.rename_file("docs/nope.txt", "b.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn test_rename_file_rejects_bad_names_and_existing_target() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("a.txt", b"a".to_vec());
    storage.insert("b.txt", b"b".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    assert!(matches!(
        engine.rename_file("a.txt", "x/y.txt").await,
        Err(StorageError::InvalidPath(_))
    ));
    assert!(matches!(
        engine.rename_file("a.txt", "a.txt").await,
        Err(StorageError::InvalidPath(_))
    ));
    assert!(matches!(
        engine.rename_file("a.txt", "b.txt").await,
        Err(StorageError::Conflict { .. })
    ));
    assert_eq!(storage.object_body("b.txt").as_deref(), Some(&b"b"[..]));
}

#[tokio::test]
async fn test_move_file_creates_destination_folder() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("a/x.txt", b"x".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.move_file("a/x.txt", "b/x.txt").await.unwrap();
    assert_eq!(outcome.destination, "b/x.txt");

    let listed = engine.store.list("b").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "x.txt");
    assert!(storage.keys().contains(&"b/".to_string()));
    assert!(!storage.contains("a/x.txt"));
}

#[tokio::test]
async fn test_move_file_into_directory_keeps_name() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("inbox/scan.pdf", b"pdf".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.move_file("inbox/scan.pdf", "archive/").await.unwrap();
    assert_eq!(outcome.destination, "archive/scan.pdf");
}

#[tokio::test]
async fn test_rename_folder_copies_everything() {
    let storage = seeded_client_folder();
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.rename_folder("clientA/", "clientB").await.unwrap();
    assert_eq!(outcome.destination, "clientB/");
    assert_eq!(outcome.entries_copied, Some(4));
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let mut listed: Vec<_> = engine
        .store
        .list("clientB")
        .await
        .unwrap()
        .into_iter()
        .map(|o| (o.name, o.is_directory, o.size_bytes))
        .collect();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            ("empty".to_string(), true, 0),
            ("one.txt".to_string(), false, 1),
            ("three.png".to_string(), false, 3),
            ("two.pdf".to_string(), false, 2),
        ]
    );

    let root = engine.store.list("").await.unwrap();
    assert!(root.iter().all(|o| o.name != "clientA"));
    assert!(storage.keys().iter().all(|k| !k.starts_with("clientA/")));
}

#[tokio::test]
async fn test_rename_folder_nested_files_arrive() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("p/", Vec::new());
    storage.insert("p/a/b/deep.txt", b"deep".to_vec());
    storage.insert("p/top.txt", b"top".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    engine.rename_folder("p", "q").await.unwrap();
    assert_eq!(
        storage.object_body("q/a/b/deep.txt").as_deref(),
        Some(&b"deep"[..])
    );
    assert!(!storage.contains("p/"));
}

#[tokio::test]
async fn test_rename_empty_folder() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("lonely/", Vec::new());
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.rename_folder("lonely/", "company").await.unwrap();
    assert_eq!(outcome.entries_copied, Some(0));
    assert_eq!(storage.keys(), vec!["company/".to_string()]);
}

#[tokio::test]
async fn test_strict_policy_aborts_and_keeps_source() {
    let storage = seeded_client_folder();
    storage.fail_on(Method::GET, "clientA/two.pdf", Fault::Network);
    let engine = engine(storage.clone(), CopyPolicy::Strict);

    let err = engine.rename_folder("clientA/", "clientB").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::PartialCopy {
            expected: 4,
            copied: 3
        }
    ));
    assert!(err.is_retryable());
    assert!(storage.contains("clientA/two.pdf"));
    assert!(storage.contains("clientA/one.txt"));
}

#[tokio::test]
async fn test_tolerant_policy_warns_and_keeps_uncopied() {
    let storage = seeded_client_folder();
    storage.fail_on(Method::GET, "clientA/two.pdf", Fault::Network);
    let engine = engine(storage.clone(), CopyPolicy::Tolerant);

    let outcome = engine.rename_folder("clientA/", "clientB").await.unwrap();
    assert_eq!(outcome.entries_copied, Some(3));
    assert!(outcome.warnings.iter().any(|w| w.contains("3 of 4")));

    assert!(storage.contains("clientA/two.pdf"));
    assert!(!storage.contains("clientA/one.txt"));
    assert!(!storage.contains("clientA/empty/"));
    assert!(storage.contains("clientB/one.txt"));
}

#[tokio::test]
async fn test_nothing_copied_never_deletes_source() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("src/only.txt", b"o".to_vec());
    storage.fail_on(Method::GET, "src/only.txt", Fault::Network);
    let engine = engine(storage.clone(), CopyPolicy::Tolerant);

    let err = engine.rename_folder("src", "dst").await.unwrap_err();
    assert!(matches!(err, StorageError::PartialCopy { copied: 0, .. }));
    assert!(storage.contains("src/only.txt"));
}

#[tokio::test]
async fn test_move_folder_conflicts() {
    let storage = seeded_client_folder();
    storage.insert("clientB/", Vec::new());
    let engine = engine(storage.clone(), CopyPolicy::default());

    assert!(matches!(
        engine.move_folder("clientA/", "clientB/").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(matches!(
        engine.move_folder("clientA/", "clientA/inner/").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(matches!(
        engine.move_folder("", "x/").await,
        Err(StorageError::InvalidPath(_))
    ));
}

#[tokio::test]
async fn test_file_transfer_onto_folder_name_conflicts() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("docs/a.txt", b"a".to_vec());
    storage.insert("docs/sub/inner.txt", b"inner".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    assert!(matches!(
        engine.rename_file("docs/a.txt", "sub").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(matches!(
        engine.move_file("docs/a.txt", "docs/sub").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(storage.contains("docs/a.txt"));
    assert!(!storage.contains("docs/sub"));
}

#[tokio::test]
async fn test_folder_move_onto_file_name_conflicts() {
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("a/x.txt", b"x".to_vec());
    storage.insert("b.txt", b"b".to_vec());
    let engine = engine(storage.clone(), CopyPolicy::default());

    assert!(matches!(
        engine.move_folder("a/", "b.txt").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(matches!(
        engine.rename_folder("a/", "b.txt").await,
        Err(StorageError::Conflict { .. })
    ));
    assert!(storage.contains("a/x.txt"));
    assert!(!storage.contains("b.txt/"));
    assert!(!storage.contains("b.txt/x.txt"));
}

#[tokio::test]
async fn test_move_file_dispatches_directories() {
    let storage = seeded_client_folder();
    let engine = engine(storage.clone(), CopyPolicy::default());

    let outcome = engine.move_file("clientA/", "archive/2024/clientA").await.unwrap();
    assert_eq!(outcome.destination, "archive/2024/clientA/");
    assert!(storage.contains("archive/2024/clientA/three.png"));
    assert!(!storage.contains("clientA/"));
}

#[tokio::test]
async fn test_move_folder_missing_source_is_not_found() {
    let engine = engine(Arc::new(MemoryStorage::new()), CopyPolicy::default());
    assert!(matches!(
        engine.move_folder("ghost/", "other/").await,
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn test_copy_policy_parse() {
    assert_eq!("strict".parse::<CopyPolicy>(), Ok(CopyPolicy::Strict));
    assert_eq!(" Tolerant ".parse::<CopyPolicy>(), Ok(CopyPolicy::Tolerant));
    assert!("lenient".parse::<CopyPolicy>().is_err());
}
