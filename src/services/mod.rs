//! Seams to the vault's external collaborators.
//!
//! The core never talks to a concrete backend: it holds trait objects for
//! the record store, the blob store, the captioning service and the auth
//! service. The shipped implementations are the local-first backends in
//! `local` plus the HTTP captioning client in `captioning`; tests swap in
//! their own doubles.

pub mod captioning;
pub mod local;
pub mod vectors;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::eid::Eid;
use crate::records::{Record, RecordDraft, RecordPatch};

pub use captioning::{CaptioningClient, CaptioningError};
pub use local::{LocalBlobStore, LocalStore};

/// An authenticated principal. The magic-link handshake itself is out of
/// scope; by the time a session exists the token is already issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub principal_id: String,
    pub token: String,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// The current session, or `None` when signed out.
    async fn session(&self) -> anyhow::Result<Option<Session>>;
}

/// A change pushed by the record store's realtime channel.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Inserted(Record),
    Updated(Record),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Eid),

    #[error("store data is corrupt: {0}")]
    Corrupt(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row CRUD plus realtime change notifications, scoped to an owner.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select_all(&self, owner: &str) -> Result<Vec<Record>, StoreError>;

    /// Rows created strictly after the given watermark.
    async fn select_created_after(
        &self,
        owner: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError>;

    async fn fetch(&self, id: &Eid) -> Result<Option<Record>, StoreError>;

    /// Insert a draft; the store assigns id and creation time.
    async fn insert(&self, draft: RecordDraft) -> Result<Record, StoreError>;

    async fn update(&self, id: &Eid, patch: RecordPatch) -> Result<Record, StoreError>;

    async fn delete(&self, id: &Eid) -> Result<(), StoreError>;

    /// Subscribe to inserts/updates. Consumers must still filter by owner:
    /// a multi-tenant backend may fan out more than it was asked for.
    fn subscribe(&self, owner: &str) -> broadcast::Receiver<StoreEvent>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError>;

    fn public_url(&self, path: &str) -> String;
}

/// What the captioning service derives from one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub has_people: Option<bool>,
    #[serde(default)]
    pub people_count: Option<u32>,
    #[serde(default)]
    pub is_screenshot: Option<bool>,
    #[serde(default)]
    pub vibe_tags: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl From<Enrichment> for RecordPatch {
    fn from(e: Enrichment) -> Self {
        RecordPatch {
            body: None,
            caption: non_empty(e.caption),
            tags: non_empty_vec(e.tags),
            colors: non_empty_vec(e.colors),
            content_type: non_empty(e.content_type),
            domain_tags: non_empty_vec(e.domain_tags),
            vibe_tags: non_empty_vec(e.vibe_tags),
            has_people: e.has_people,
            people_count: e.people_count,
            is_screenshot: e.is_screenshot,
            embedding: e.embedding,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn non_empty_vec(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// The external vision-language boundary: image analysis plus the text
/// embedding capability the semantic matcher rides on.
#[async_trait]
pub trait CaptioningService: Send + Sync {
    async fn analyze_image(
        &self,
        image_url: &str,
        photo_id: &Eid,
    ) -> Result<Enrichment, CaptioningError>;

    async fn reembed(&self, photo_id: &Eid) -> Result<Vec<f32>, CaptioningError>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CaptioningError>;
}
