use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::eid::Eid;
use crate::pins::PinSet;
use crate::records::{Record, RecordDraft, RecordKind, RecordPatch};
use crate::search::SearchPipeline;
use crate::services::{BlobStore, CaptioningService, RecordStore};
use crate::snapshot::Snapshot;
use crate::storage::StorageManager;

use super::errors::AppError;

/// User-initiated operations against one owner's vault. Holds the snapshot
/// the matchers read from; the reconciliation loop shares the same snapshot
/// and keeps it fresh in the background.
pub struct Vault {
    owner: String,
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    captioner: Arc<dyn CaptioningService>,
    storage: Arc<dyn StorageManager>,
    snapshot: Snapshot,
    pipeline: SearchPipeline,
    pins: Mutex<PinSet>,
}

impl Vault {
    pub fn new(
        owner: &str,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        captioner: Arc<dyn CaptioningService>,
        storage: Arc<dyn StorageManager>,
        semantic_debounce: Duration,
    ) -> Self {
        let snapshot = Snapshot::new();
        let pipeline = SearchPipeline::new(snapshot.clone(), captioner.clone(), semantic_debounce);
        let pins = Mutex::new(PinSet::load(storage.as_ref()));

        Self {
            owner: owner.to_string(),
            store,
            blobs,
            captioner,
            storage,
            snapshot,
            pipeline,
            pins,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Initial bulk load of the owner's records into the snapshot.
    /// Idempotent; returns how many records were new.
    pub async fn bootstrap(&self) -> Result<usize, AppError> {
        let rows = self.store.select_all(&self.owner).await?;
        Ok(self.snapshot.insert_all(rows))
    }

    /// The upload flow: blob upload, row insert, enrichment call, row
    /// update — each step gated on the previous one. A failed enrichment
    /// call is soft: the photo stays pending and the enrichment poll
    /// retries it; the upload and insert are never rolled back.
    pub async fn add_photo(&self, bytes: Vec<u8>, filename: &str) -> Result<Record, AppError> {
        let sniffed = infer::get(&bytes);
        let content_type = sniffed
            .as_ref()
            .map(|t| t.mime_type())
            .unwrap_or("application/octet-stream");
        let extension = sniffed
            .as_ref()
            .map(|t| t.extension().to_string())
            .unwrap_or_else(|| {
                std::path::Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("bin")
                    .to_string()
            });

        let digest = Sha256::digest(&bytes);
        let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let path = format!("{}/{hash}.{extension}", self.owner);

        self.blobs.upload(&path, &bytes, content_type).await?;
        let image_url = self.blobs.public_url(&path);

        let record = self
            .store
            .insert(RecordDraft::photo(&self.owner, &image_url))
            .await?;
        // the realtime channel delivers this row too; insert is idempotent
        self.snapshot.insert(record.clone());

        match self.captioner.analyze_image(&image_url, &record.id).await {
            Ok(enrichment) => {
                let updated = self
                    .store
                    .update(&record.id, RecordPatch::from(enrichment))
                    .await?;
                self.snapshot.merge(&record.id, &updated);
                Ok(updated)
            }
            Err(err) => {
                log::warn!(
                    "enrichment failed for {}: {err}; photo stays pending until the next poll",
                    record.id
                );
                Ok(record)
            }
        }
    }

    pub async fn add_note(&self, body: &str) -> Result<Record, AppError> {
        let record = self
            .store
            .insert(RecordDraft::note(&self.owner, body))
            .await?;
        self.snapshot.insert(record.clone());
        Ok(record)
    }

    /// Remove a record everywhere. Once it is out of the snapshot the
    /// pending-enrichment poll no longer targets it, so a deleted photo
    /// cannot be resurrected by a late fetch.
    pub async fn delete(&self, id: &Eid) -> Result<(), AppError> {
        self.store.delete(id).await?;
        self.snapshot.remove(id);

        let mut pins = self.pins.lock().unwrap();
        if pins.unpin(id) {
            pins.save(self.storage.as_ref())?;
        }
        Ok(())
    }

    /// Pin a note to the top of the feed. Returns false when it was
    /// already pinned.
    pub fn pin(&self, id: &Eid) -> Result<bool, AppError> {
        let record = self
            .snapshot
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.clone()))?;
        if record.kind != RecordKind::Note {
            return Err(AppError::NotANote(id.clone()));
        }

        let mut pins = self.pins.lock().unwrap();
        let added = pins.pin(id.clone());
        pins.save(self.storage.as_ref())?;
        Ok(added)
    }

    /// Returns false when the id was not pinned.
    pub fn unpin(&self, id: &Eid) -> Result<bool, AppError> {
        let mut pins = self.pins.lock().unwrap();
        let removed = pins.unpin(id);
        if removed {
            pins.save(self.storage.as_ref())?;
        }
        Ok(removed)
    }

    /// Recompute a photo's embedding. Unlike the enrichment step of the
    /// upload flow this is user-initiated, so failures surface.
    pub async fn reembed(&self, id: &Eid) -> Result<Record, AppError> {
        let existing = self
            .store
            .fetch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.clone()))?;
        if existing.kind != RecordKind::Photo {
            return Err(AppError::NotAPhoto(id.clone()));
        }

        let embedding = self.captioner.reembed(id).await?;
        let updated = self
            .store
            .update(
                id,
                RecordPatch {
                    embedding: Some(embedding),
                    ..Default::default()
                },
            )
            .await?;
        self.snapshot.merge(id, &updated);
        Ok(updated)
    }

    /// Run the search pipeline over the current snapshot.
    pub async fn search(&self, raw: &str, with_semantic: bool) -> Vec<Record> {
        let pins = { self.pins.lock().unwrap().clone() };
        self.pipeline.search(raw, &pins, with_semantic).await
    }

    /// Invalidate any in-flight semantic request (teardown).
    pub fn cancel_pending_search(&self) {
        self.pipeline.cancel_pending();
    }
}
