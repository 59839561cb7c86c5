use std::io::Write;
use std::sync::Mutex;

use beacon_domain::{core_collection_id, ContentPack, EntryType, PackEntry};
use beacon_engine::infrastructure::config::EngineConfig;
use beacon_engine::infrastructure::ports::{DocumentFilter, DocumentStore};
use beacon_engine::use_cases::ImportError;
use beacon_engine::App;
use pretty_assertions::assert_eq;
use serde_json::json;

fn long_rim() -> ContentPack {
    ContentPack::new("long-rim", "Long Rim")
        .with_entry(EntryType::Frame, PackEntry::new("mf_white_witch", "White Witch", json!({})))
        .with_entry(EntryType::Frame, PackEntry::new("mf_kidd", "Kidd", json!({})))
        .with_entry(EntryType::Talent, PackEntry::new("t_spaceborn", "Spaceborn", json!({})))
        .with_entry(EntryType::Tag, PackEntry::new("tg_smart", "Smart", json!({})))
        .with_entry(EntryType::Tag, PackEntry::new("tg_smart", "Smart (again)", json!({})))
}

async fn app(batch_size: usize) -> App {
    App::in_memory(EngineConfig {
        import_batch_size: batch_size,
        ..EngineConfig::default()
    })
    .await
    .unwrap()
}

async fn core_document_count(app: &App) -> usize {
    let mut count = 0;
    for entry_type in EntryType::all() {
        count += app
            .store
            .list(&DocumentFilter::all().in_collection(core_collection_id(entry_type)))
            .await
            .unwrap()
            .len();
    }
    count
}

#[tokio::test]
async fn import_is_idempotent_by_lid() {
    let app = app(2).await;

    let first = app.import.import(&long_rim(), None).await.unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.duplicates, 1);
    assert_eq!(first.created, 4);
    assert_eq!(core_document_count(&app).await, 4);

    let second = app.import.import(&long_rim(), None).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped_existing, 4);
    assert_eq!(core_document_count(&app).await, 4);
}

#[tokio::test]
async fn core_collections_are_relocked_after_import() {
    let app = app(50).await;

    app.import.import(&long_rim(), None).await.unwrap();

    assert!(!app.import.lock().is_importing());
    let collections = app.store.collections().await.unwrap();
    assert!(collections.iter().filter(|c| c.id.is_core()).all(|c| c.locked));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_total() {
    let app = app(1).await;
    let calls = Mutex::new(Vec::new());
    let mut on_progress = |done: usize, total: usize| calls.lock().unwrap().push((done, total));

    let report = app.import.import(&long_rim(), Some(&mut on_progress)).await.unwrap();

    let calls = calls.into_inner().unwrap();
    assert_eq!(calls.last(), Some(&(report.total, report.total)));
    assert!(calls.iter().all(|(done, total)| done <= total && *total == 4));
    assert!(calls.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn held_lock_rejects_import_and_clear() {
    let app = app(50).await;
    let guard = app.import.lock().acquire().await.unwrap();

    assert!(matches!(
        app.import.import(&long_rim(), None).await,
        Err(ImportError::AlreadyImporting)
    ));
    assert!(matches!(
        app.import.clear_all().await,
        Err(ImportError::AlreadyImporting)
    ));

    guard.release().await;
    assert!(app.import.import(&long_rim(), None).await.unwrap().is_success());
}

#[tokio::test]
async fn clear_all_allows_a_fresh_import() {
    let app = app(50).await;
    app.import.import(&long_rim(), None).await.unwrap();

    assert_eq!(app.import.clear_all().await.unwrap(), 4);
    assert_eq!(core_document_count(&app).await, 0);

    let again = app.import.import(&long_rim(), None).await.unwrap();
    assert_eq!(again.created, 4);
}

#[tokio::test]
async fn pack_file_imports_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({
            "id": "ktb",
            "name": "Karrakin Trade Baronies",
            "entries": {
                "frame": [{ "lid": "mf_sunzi", "name": "Sunzi", "data": { "license": "SUNZI" } }],
                "license": [{ "lid": "lic_sunzi", "name": "Sunzi", "data": { "key": "SUNZI" } }]
            }
        })
    )
    .unwrap();

    let app = app(50).await;
    let report = app.import.import_file(file.path(), None).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.created, 2);
    let frames = app
        .store
        .list(&DocumentFilter::of_type(EntryType::Frame))
        .await
        .unwrap();
    assert_eq!(frames[0].payload["license"], "SUNZI");
    assert_eq!(frames[0].payload["lid"], "mf_sunzi");
}

#[tokio::test]
async fn missing_pack_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(50).await;

    let err = app
        .import
        .import_file(dir.path().join("absent.json"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Load(_)));
    assert!(!app.import.lock().is_importing());
}
