//! Cross-module scenarios: the search pipeline end to end, the
//! reconciliation loop under interleaved feed sources, and the upload flow.
//! Shared test doubles live here.

mod vault;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::eid::Eid;
use crate::records::{Record, RecordDraft, RecordPatch};
use crate::services::{
    BlobError, BlobStore, CaptioningError, CaptioningService, Enrichment, RecordStore, StoreError,
    StoreEvent,
};

/// In-memory record store with a hand-crankable realtime channel: tests can
/// add rows silently (as if another device wrote them), emit events without
/// touching rows, or go through the trait like production code does.
pub struct MemoryStore {
    rows: RwLock<Vec<Record>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            rows: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Add a row without a realtime event — only a poll can discover it.
    pub fn insert_silent(&self, record: Record) {
        self.rows.write().unwrap().push(record);
    }

    /// Mutate a row without a realtime event (server-side enrichment the
    /// push channel missed).
    pub fn update_silent(&self, id: &Eid, patch: RecordPatch) {
        let mut rows = self.rows.write().unwrap();
        if let Some(record) = rows.iter_mut().find(|r| &r.id == id) {
            record.apply(&patch);
        }
    }

    /// Emit a realtime event without touching the rows.
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select_all(&self, owner: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }

    async fn select_created_after(
        &self,
        owner: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.owner == owner && r.created_at > after)
            .cloned()
            .collect())
    }

    async fn fetch(&self, id: &Eid) -> Result<Option<Record>, StoreError> {
        Ok(self.rows.read().unwrap().iter().find(|r| &r.id == id).cloned())
    }

    async fn insert(&self, draft: RecordDraft) -> Result<Record, StoreError> {
        let record = draft.into_record(Eid::new(), Utc::now());
        self.rows.write().unwrap().push(record.clone());
        let _ = self.events.send(StoreEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &Eid, patch: RecordPatch) -> Result<Record, StoreError> {
        let mut rows = self.rows.write().unwrap();
        let record = rows
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        record.apply(&patch);
        let updated = record.clone();
        drop(rows);

        let _ = self.events.send(StoreEvent::Updated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: &Eid) -> Result<(), StoreError> {
        self.rows.write().unwrap().retain(|r| &r.id != id);
        Ok(())
    }

    fn subscribe(&self, _owner: &str) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Captioning double. `None` slots make the corresponding call fail, which
/// exercises the soft-failure paths.
pub struct StubCaptioning {
    enrichment: Mutex<Option<Enrichment>>,
    reembedding: Mutex<Option<Vec<f32>>>,
    query_embeddings: Mutex<HashMap<String, Vec<f32>>>,
    pub embed_calls: AtomicUsize,
}

impl StubCaptioning {
    pub fn failing() -> Self {
        Self {
            enrichment: Mutex::new(None),
            reembedding: Mutex::new(None),
            query_embeddings: Mutex::new(HashMap::new()),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_enrichment(enrichment: Enrichment) -> Self {
        let stub = Self::failing();
        *stub.enrichment.lock().unwrap() = Some(enrichment);
        stub
    }

    pub fn with_reembedding(embedding: Vec<f32>) -> Self {
        let stub = Self::failing();
        *stub.reembedding.lock().unwrap() = Some(embedding);
        stub
    }

    pub fn with_query_embedding(query: &str, embedding: Vec<f32>) -> Self {
        let stub = Self::failing();
        stub.query_embeddings
            .lock()
            .unwrap()
            .insert(query.to_string(), embedding);
        stub
    }
}

#[async_trait]
impl CaptioningService for StubCaptioning {
    async fn analyze_image(
        &self,
        _image_url: &str,
        _photo_id: &Eid,
    ) -> Result<Enrichment, CaptioningError> {
        self.enrichment
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CaptioningError::Parse("stubbed failure".to_string()))
    }

    async fn reembed(&self, _photo_id: &Eid) -> Result<Vec<f32>, CaptioningError> {
        self.reembedding
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CaptioningError::Parse("stubbed failure".to_string()))
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CaptioningError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.query_embeddings
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .ok_or_else(|| CaptioningError::Parse("stubbed failure".to_string()))
    }
}

pub struct MemoryBlobStore {
    pub blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://blobs.test/{path}")
    }
}

pub const OWNER: &str = "user-1";

pub fn photo_at(id: &str, created_at: &str) -> Record {
    RecordDraft::photo(OWNER, &format!("https://blobs.test/{id}.jpg"))
        .into_record(Eid::from(id), created_at.parse().unwrap())
}

pub fn note_at(id: &str, body: &str, created_at: &str) -> Record {
    RecordDraft::note(OWNER, body).into_record(Eid::from(id), created_at.parse().unwrap())
}

/// Poll a condition under paused time; auto-advance makes this effectively
/// instant.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
