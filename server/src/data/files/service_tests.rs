use std::sync::Arc;

use reqwest::{Method, StatusCode};

use super::*;
use crate::data::storage::memory::{Fault, MemoryCdn, MemoryStorage};
use crate::data::storage::paths::CacheCategory;
use crate::data::storage::testing::{CDN_BASE, RecordingSleeper, store_with};

struct Fixture {
    files: FileService,
    storage: Arc<MemoryStorage>,
    cdn: Arc<MemoryCdn>,
    sleeper: Arc<RecordingSleeper>,
}

fn fixture_with(storage: MemoryStorage, pull_zone: Option<&str>) -> Fixture {
    let storage = Arc::new(storage);
    let cdn = Arc::new(MemoryCdn::new());
    let (store, sleeper) = store_with(storage.clone());
    let cache = CacheControl::new(cdn.clone(), pull_zone.map(str::to_string));
    Fixture {
        files: FileService::new(store, cache, CopyPolicy::Tolerant),
        storage,
        cdn,
        sleeper,
    }
}

fn fixture() -> Fixture {
    fixture_with(MemoryStorage::new(), Some("42"))
}

fn names(listing: &DirectoryListing) -> Vec<&str> {
    listing.entries.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test]
async fn test_upload_then_list() {
    let f = fixture();

    let result = f
        .files
        .upload_file("documents/report.pdf", vec![7u8; 500], None)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert!(result.warnings.is_empty());
    let uploaded = result.data.unwrap();
    assert_eq!(
        uploaded.public_url,
        format!("{}/documents/report.pdf", CDN_BASE)
    );
    assert_eq!(uploaded.size_bytes, 500);
    assert_eq!(uploaded.content_type, "application/pdf");
    assert_eq!(uploaded.cache_category, CacheCategory::Document);

    let listing = f.files.list_files("documents").await.data.unwrap();
    let entry = listing
        .entries
        .iter()
        .find(|e| e.name == "report.pdf")
        .unwrap();
    assert!(!entry.is_directory);
    assert_eq!(entry.size_bytes, 500);
    assert!(f.storage.contains("documents/"));
}

#[tokio::test]
async fn test_upload_not_yet_visible_warns() {
    let f = fixture_with(MemoryStorage::new().with_visibility_lag(5), None);

    let result = f.files.upload_file("slow.txt", b"x".to_vec(), None).await;
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("slow.txt"));
    assert_eq!(f.sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_upload_rejected_is_failure() {
    let f = fixture();
    f.storage.fail_on(
        Method::PUT,
        "a.txt",
        Fault::Status(StatusCode::SERVICE_UNAVAILABLE),
    );

    let result = f.files.upload_file("a.txt", b"x".to_vec(), None).await;
    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(result.kind, Some(FailureKind::Unavailable));

    let result = f.files.upload_file("dir/", b"x".to_vec(), None).await;
    assert_eq!(result.kind, Some(FailureKind::InvalidInput));
    assert!(!result.retryable);
}

#[tokio::test]
async fn test_list_missing_directory_is_not_found() {
    let f = fixture();
    let result = f.files.list_files("nowhere").await;
    assert!(!result.success);
    assert_eq!(result.kind, Some(FailureKind::NotFound));

    let root = f.files.list_files("/").await;
    assert!(root.success);
    assert_eq!(root.data.unwrap().path, "");
}

#[tokio::test]
async fn test_download_returns_bytes_and_type() {
    let f = fixture();
    f.storage.insert("img/logo.png", b"png".to_vec());

    let download = f.files.download_file("/img//logo.png").await.data.unwrap();
    assert_eq!(download.path, "img/logo.png");
    assert_eq!(download.bytes, b"png");
    assert_eq!(download.content_type, "image/png");

    let missing = f.files.download_file("img/none.png").await;
    assert_eq!(missing.kind, Some(FailureKind::NotFound));
    let folder = f.files.download_file("img/").await;
    assert_eq!(folder.kind, Some(FailureKind::InvalidInput));
}

#[tokio::test]
async fn test_rename_file_keeps_bytes() {
    let f = fixture();
    f.storage.insert("documents/a.txt", b"original".to_vec());

    let result = f.files.rename_path("documents/a.txt", "b.txt").await;
    assert!(result.success, "{:?}", result.error);
    let outcome = result.data.unwrap();
    assert_eq!(outcome.destination, "documents/b.txt");

    let download = f.files.download_file("documents/b.txt").await.data.unwrap();
    assert_eq!(download.bytes, b"original");
    let listing = f.files.list_files("documents").await.data.unwrap();
    assert_eq!(names(&listing), vec!["b.txt"]);
}

#[tokio::test]
async fn test_rename_keeps_source_when_destination_fails() {
    let f = fixture();
    f.storage.insert("documents/a.txt", b"keep me".to_vec());
    f.storage.fail_on(
        Method::PUT,
        "documents/b.txt",
        Fault::Status(StatusCode::BAD_GATEWAY),
    );

    let result = f.files.rename_path("documents/a.txt", "b.txt").await;
    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(
        f.storage.object_body("documents/a.txt").as_deref(),
        Some(&b"keep me"[..])
    );
    assert!(!f.storage.contains("documents/b.txt"));
}

#[tokio::test]
async fn test_rename_preconditions() {
    let f = fixture();
    f.storage.insert("a.txt", b"a".to_vec());
    f.storage.insert("b.txt", b"b".to_vec());

    let missing = f.files.rename_path("ghost.txt", "x.txt").await;
    assert_eq!(missing.kind, Some(FailureKind::NotFound));

    let taken = f.files.rename_path("a.txt", "b.txt").await;
    assert_eq!(taken.kind, Some(FailureKind::Conflict));
    assert_eq!(f.storage.object_body("b.txt").as_deref(), Some(&b"b"[..]));

    let bad = f.files.rename_path("a.txt", "x/y.txt").await;
    assert_eq!(bad.kind, Some(FailureKind::InvalidInput));

    let root = f.files.rename_path("/", "x").await;
    assert_eq!(root.kind, Some(FailureKind::InvalidInput));
}

#[tokio::test]
async fn test_delete_missing_succeeds_twice() {
    let f = fixture();
    f.storage.insert("documents/a.txt", b"a".to_vec());

    let missing = f.files.delete_path("documents/missing.txt").await;
    assert!(missing.success);
    assert!(!missing.data.unwrap().existed);

    let first = f.files.delete_path("documents/a.txt").await;
    assert!(first.success);
    assert!(first.data.unwrap().existed);
    let second = f.files.delete_path("documents/a.txt").await;
    assert!(second.success);
    assert!(!second.data.unwrap().existed);
    assert!(!f.storage.contains("documents/a.txt"));
}

#[tokio::test]
async fn test_delete_folder_removes_everything() {
    let f = fixture();
    f.storage.insert("Acme/", Vec::new());
    f.storage.insert("Acme/a.txt", b"a".to_vec());
    f.storage.insert("Acme/sub/b.txt", b"b".to_vec());
    f.storage.insert("keep.txt", b"k".to_vec());

    let result = f.files.delete_path("Acme").await;
    assert!(result.success, "{:?}", result.error);
    let deleted = result.data.unwrap();
    assert!(deleted.is_directory);
    assert_eq!(deleted.path, "Acme/");
    assert_eq!(f.storage.keys(), vec!["keep.txt"]);

    let resolved = f.files.resolve_document_path("acme/x.pdf").await.data.unwrap();
    assert!(!resolved.corrected);
}

#[tokio::test]
async fn test_delete_still_visible_is_retryable() {
    let f = fixture();
    f.storage.insert("stuck.txt", b"s".to_vec());
    f.storage
        .fail_on(Method::HEAD, "stuck.txt", Fault::Status(StatusCode::OK));

    let result = f.files.delete_path("stuck.txt").await;
    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(result.kind, Some(FailureKind::Unavailable));
}

#[tokio::test]
async fn test_delete_root_is_refused() {
    let f = fixture();
    f.storage.insert("a.txt", b"a".to_vec());
    let result = f.files.delete_path("/").await;
    assert_eq!(result.kind, Some(FailureKind::InvalidInput));
    assert!(f.storage.contains("a.txt"));
}

#[tokio::test]
async fn test_move_creates_destination_folder() {
    let f = fixture();
    f.storage.insert("a/x.txt", b"x".to_vec());

    let result = f.files.move_path("a/x.txt", "b/x.txt").await;
    assert!(result.success, "{:?}", result.error);
    assert!(f.storage.contains("b/"));

    let listing = f.files.list_files("b").await.data.unwrap();
    assert_eq!(names(&listing), vec!["x.txt"]);
    assert!(!f.storage.contains("a/x.txt"));
}

#[tokio::test]
async fn test_move_folder_to_new_parent() {
    let f = fixture();
    f.storage.insert("src/one.txt", b"1".to_vec());
    f.storage.insert("dst/", Vec::new());

    let result = f.files.move_path("src", "dst/src").await;
    assert!(result.success, "{:?}", result.error);
    let outcome = result.data.unwrap();
    assert_eq!(outcome.destination, "dst/src/");
    assert_eq!(outcome.entries_copied, Some(1));
    assert_eq!(
        f.storage.object_body("dst/src/one.txt").as_deref(),
        Some(&b"1"[..])
    );
    assert!(!f.storage.contains("src/"));
}

#[tokio::test]
async fn test_rename_folder_moves_all_entries() {
    let f = fixture();
    f.storage.insert("clientA/", Vec::new());
    f.storage.insert("clientA/one.txt", b"1".to_vec());
    f.storage.insert("clientA/two.pdf", b"22".to_vec());
    f.storage.insert("clientA/three.png", b"333".to_vec());
    f.storage.insert("clientA/empty/", Vec::new());

    let result = f.files.rename_path("clientA/", "clientB").await;
    assert!(result.success, "{:?}", result.error);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let listing = f.files.list_files("clientB").await.data.unwrap();
    assert_eq!(
        names(&listing),
        vec!["empty", "one.txt", "three.png", "two.pdf"]
    );
    let sizes: Vec<u64> = listing.entries.iter().map(|e| e.size_bytes).collect();
    assert_eq!(sizes, vec![0, 1, 3, 2]);

    let root = f.files.list_files("").await.data.unwrap();
    assert_eq!(names(&root), vec!["clientB"]);
    let gone = f.files.list_files("clientA").await;
    assert_eq!(gone.kind, Some(FailureKind::NotFound));
}

#[tokio::test]
async fn test_rename_folder_refreshes_client_folders() {
    let f = fixture();
    f.storage.insert("Acme/report.pdf", b"r".to_vec());

    let before = f.files.resolve_document_path("acme/report.pdf").await;
    assert_eq!(before.data.unwrap().resolved, "Acme/report.pdf");

    assert!(f.files.rename_path("Acme", "Globex").await.success);
    let after = f.files.resolve_document_path("globex/report.pdf").await;
    let after = after.data.unwrap();
    assert!(after.corrected);
    assert_eq!(after.resolved, "Globex/report.pdf");
}

#[tokio::test]
async fn test_create_folder() {
    let f = fixture();

    let result = f.files.create_folder("projects/2024").await;
    assert!(result.success, "{:?}", result.error);
    let created = result.data.unwrap();
    assert_eq!(created.path, "projects/2024/");
    assert_eq!(created.public_url, format!("{}/projects/2024/", CDN_BASE));
    assert!(f.storage.contains("projects/"));
    assert!(f.storage.contains("projects/2024/"));

    let again = f.files.create_folder("projects/2024/").await;
    assert_eq!(again.kind, Some(FailureKind::Conflict));

    f.storage.insert("notes", b"n".to_vec());
    let clash = f.files.create_folder("notes").await;
    assert_eq!(clash.kind, Some(FailureKind::Conflict));

    let root = f.files.create_folder("").await;
    assert_eq!(root.kind, Some(FailureKind::InvalidInput));
}

#[tokio::test]
async fn test_create_top_level_folder_is_resolvable() {
    let f = fixture();
    f.storage.insert("Acme/", Vec::new());
    assert!(f.files.resolve_document_path("acme/a.pdf").await.success);

    assert!(f.files.create_folder("Initech").await.success);
    let resolved = f
        .files
        .resolve_document_path("initech/a.pdf")
        .await
        .data
        .unwrap();
    assert_eq!(resolved.resolved, "Initech/a.pdf");
}

#[tokio::test]
async fn test_check_cache_miss_then_hit() {
    let f = fixture();
    f.storage.insert("img/logo.png", b"png".to_vec());

    let first = f.files.check_cache("img/logo.png").await.data.unwrap();
    assert_eq!(first.url, format!("{}/img/logo.png", CDN_BASE));
    assert!(!first.cached);
    let second = f.files.check_cache("img/logo.png").await.data.unwrap();
    assert!(second.cached);

    let folder = f.files.check_cache("img/").await;
    assert_eq!(folder.kind, Some(FailureKind::InvalidInput));
}

#[tokio::test]
async fn test_purge_cache() {
    let f = fixture();

    let result = f.files.purge_cache("img/logo.png").await;
    assert!(result.success);
    assert_eq!(
        f.cdn.purges(),
        vec![("42".to_string(), vec!["/img/logo.png".to_string()])]
    );

    f.cdn.set_purge_status(StatusCode::BAD_GATEWAY);
    let failed = f.files.purge_cache("img/logo.png").await;
    assert!(!failed.success);
    assert!(failed.retryable);
}

#[tokio::test]
async fn test_purge_without_pull_zone_is_not_retryable() {
    let f = fixture_with(MemoryStorage::new(), None);
    let result = f.files.purge_cache("img/logo.png").await;
    assert!(!result.success);
    assert!(!result.retryable);
    assert_eq!(result.kind, Some(FailureKind::Internal));
    assert!(f.cdn.purges().is_empty());
}

#[tokio::test]
async fn test_failure_envelope_serializes_retry_hint() {
    let f = fixture();
    f.storage
        .fail_on(Method::GET, "docs/", Fault::Status(StatusCode::BAD_GATEWAY));

    let result = f.files.list_files("docs").await;
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["retryable"], true);
    assert!(value["error"].as_str().unwrap().contains("docs/"));
    assert!(value.as_object().unwrap().contains_key("data"));
    assert!(value["data"].is_null());
}
