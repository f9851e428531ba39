use std::sync::Arc;
use std::time::Duration;

use crate::app::{AppError, Vault};
use crate::eid::Eid;
use crate::services::{Enrichment, RecordStore};
use crate::storage::BackendLocal;

use super::{MemoryBlobStore, MemoryStore, StubCaptioning, OWNER};

fn vault_with(
    captioner: StubCaptioning,
) -> (tempfile::TempDir, Arc<MemoryStore>, Arc<MemoryBlobStore>, Vault) {
    let dir = tempfile::tempdir().unwrap();
    let storage = BackendLocal::new(dir.path().to_str().unwrap()).unwrap();

    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());

    let vault = Vault::new(
        OWNER,
        store.clone(),
        blobs.clone(),
        Arc::new(captioner),
        Arc::new(storage),
        Duration::from_millis(1),
    );

    (dir, store, blobs, vault)
}

const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
];

#[tokio::test]
async fn upload_flow_enriches_in_sequence() {
    let enrichment = Enrichment {
        caption: "a dog in the park".to_string(),
        tags: vec!["dog".to_string(), "park".to_string()],
        colors: vec!["green".to_string()],
        embedding: Some(vec![0.1, 0.2]),
        ..Default::default()
    };
    let (_dir, store, blobs, vault) = vault_with(StubCaptioning::with_enrichment(enrichment));

    let record = vault.add_photo(JPEG_BYTES.to_vec(), "dog.jpeg").await.unwrap();

    assert_eq!(record.caption, "a dog in the park");
    assert!(!record.is_pending());
    assert_eq!(record.embedding, Some(vec![0.1, 0.2]));

    // every step left its mark: blob, store row, snapshot entry
    assert_eq!(blobs.blobs.lock().unwrap().len(), 1);
    let row = store.fetch(&record.id).await.unwrap().unwrap();
    assert_eq!(row.caption, "a dog in the park");
    assert!(!vault.snapshot().get(&record.id).unwrap().is_pending());
}

#[tokio::test]
async fn upload_flow_survives_enrichment_failure() {
    let (_dir, store, blobs, vault) = vault_with(StubCaptioning::failing());

    let record = vault.add_photo(JPEG_BYTES.to_vec(), "dog.jpeg").await.unwrap();

    // soft failure: the upload and the insert stand, the photo is pending
    assert!(record.is_pending());
    assert_eq!(blobs.blobs.lock().unwrap().len(), 1);
    assert!(store.fetch(&record.id).await.unwrap().unwrap().is_pending());
    assert_eq!(vault.snapshot().pending_ids(), vec![record.id]);
}

#[tokio::test]
async fn upload_path_is_content_addressed() {
    let (_dir, _store, blobs, vault) = vault_with(StubCaptioning::failing());

    vault.add_photo(JPEG_BYTES.to_vec(), "dog.jpeg").await.unwrap();

    let blobs = blobs.blobs.lock().unwrap();
    let path = blobs.keys().next().unwrap();
    assert!(path.starts_with(&format!("{OWNER}/")));
    assert!(path.ends_with(".jpg")); // sniffed from the bytes, not the name
}

#[tokio::test]
async fn notes_are_never_pending() {
    let (_dir, _store, _blobs, vault) = vault_with(StubCaptioning::failing());

    let record = vault.add_note("remember the milk").await.unwrap();
    assert!(!record.is_pending());
    assert_eq!(vault.snapshot().len(), 1);
}

#[tokio::test]
async fn delete_removes_snapshot_entry_and_pin() {
    let (_dir, store, _blobs, vault) = vault_with(StubCaptioning::failing());

    let note = vault.add_note("pin me").await.unwrap();
    assert!(vault.pin(&note.id).unwrap());

    vault.delete(&note.id).await.unwrap();

    assert!(vault.snapshot().is_empty());
    assert!(store.fetch(&note.id).await.unwrap().is_none());
    // pinning again after re-adding starts clean
    assert!(!vault.unpin(&note.id).unwrap());
}

#[tokio::test]
async fn only_notes_can_be_pinned() {
    let (_dir, _store, _blobs, vault) = vault_with(StubCaptioning::failing());

    let photo = vault.add_photo(JPEG_BYTES.to_vec(), "dog.jpeg").await.unwrap();
    let err = vault.pin(&photo.id).unwrap_err();
    assert!(matches!(err, AppError::NotANote(_)));

    let err = vault.pin(&Eid::from("01-missing")).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn reembed_stores_the_new_vector() {
    let (_dir, store, _blobs, vault) = vault_with(StubCaptioning::with_reembedding(vec![0.5, 0.5]));

    let photo = vault.add_photo(JPEG_BYTES.to_vec(), "dog.jpeg").await.unwrap();
    assert!(photo.embedding.is_none()); // analyze failed in this stub

    let updated = vault.reembed(&photo.id).await.unwrap();
    assert_eq!(updated.embedding, Some(vec![0.5, 0.5]));

    let row = store.fetch(&photo.id).await.unwrap().unwrap();
    assert_eq!(row.embedding, Some(vec![0.5, 0.5]));
}

#[tokio::test]
async fn reembed_rejects_notes_and_missing_records() {
    let (_dir, _store, _blobs, vault) = vault_with(StubCaptioning::with_reembedding(vec![0.5]));

    let note = vault.add_note("not a photo").await.unwrap();
    assert!(matches!(
        vault.reembed(&note.id).await.unwrap_err(),
        AppError::NotAPhoto(_)
    ));
    assert!(matches!(
        vault.reembed(&Eid::from("01-missing")).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let (_dir, store, _blobs, vault) = vault_with(StubCaptioning::failing());

    store.insert_silent(super::photo_at("01A", "2026-03-01T00:00:00Z"));

    assert_eq!(vault.bootstrap().await.unwrap(), 1);
    assert_eq!(vault.bootstrap().await.unwrap(), 0);
    assert_eq!(vault.snapshot().len(), 1);
}
