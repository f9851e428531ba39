//! Local-first backends for the record and blob stores.
//!
//! `LocalStore` keeps rows in `records.csv` with embeddings in the
//! `vectors.bin` sidecar, and plays the realtime channel itself: every
//! insert/update it performs is broadcast to subscribers, so the
//! reconciliation loop behaves identically against a local or a remote
//! backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::eid::Eid;
use crate::records::{Record, RecordDraft, RecordKind, RecordPatch};
use crate::services::vectors::{VectorFile, VectorFileError};
use crate::services::{BlobError, BlobStore, RecordStore, StoreError, StoreEvent};

const RECORDS_FILE: &str = "records.csv";
const VECTORS_FILE: &str = "vectors.bin";

const CSV_HEADERS: [&str; 15] = [
    "id",
    "owner",
    "kind",
    "created_at",
    "image_url",
    "body",
    "caption",
    "tags",
    "colors",
    "content_type",
    "domain_tags",
    "vibe_tags",
    "has_people",
    "people_count",
    "is_screenshot",
];

pub struct LocalStore {
    records: Arc<RwLock<Vec<Record>>>,
    dir: PathBuf,
    events: broadcast::Sender<StoreEvent>,
}

impl LocalStore {
    pub fn load(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let csv_path = dir.join(RECORDS_FILE);

        if !csv_path.exists() {
            log::info!("creating new record database at {}", csv_path.display());
            let mut writer = csv::Writer::from_path(&csv_path)?;
            writer.write_record(CSV_HEADERS)?;
            writer.flush()?;
        }

        let now = Instant::now();
        let mut records = read_csv(&csv_path)?;

        let vectors = VectorFile::new(dir.join(VECTORS_FILE));
        if vectors.exists() {
            match vectors.load() {
                Ok(mut embeddings) => {
                    for record in records.iter_mut() {
                        record.embedding = embeddings.remove(&record.id);
                    }
                }
                Err(
                    err @ (VectorFileError::VersionMismatch(..)
                    | VectorFileError::ChecksumMismatch),
                ) => {
                    log::warn!("discarding stored embeddings: {err}");
                }
                Err(err) => return Err(StoreError::Corrupt(err.to_string())),
            }
        }

        log::debug!(
            "loaded {} records in {}ms",
            records.len(),
            now.elapsed().as_micros() as f64 / 1000.0
        );

        let (events, _) = broadcast::channel(64);

        Ok(Self {
            records: Arc::new(RwLock::new(records)),
            dir: dir.to_path_buf(),
            events,
        })
    }

    fn save(&self, rows: &[Record]) -> Result<(), StoreError> {
        let csv_path = self.dir.join(RECORDS_FILE);
        let temp_path = self.dir.join(format!("{}-tmp", RECORDS_FILE));

        let mut writer = csv::Writer::from_path(&temp_path)?;
        writer.write_record(CSV_HEADERS)?;
        for record in rows {
            let created_at = record.created_at.to_rfc3339();
            let tags = record.tags.join(",");
            let colors = record.colors.join(",");
            let domain_tags = record.domain_tags.join(",");
            let vibe_tags = record.vibe_tags.join(",");
            let has_people = opt_str(record.has_people);
            let people_count = opt_str(record.people_count);
            let is_screenshot = opt_str(record.is_screenshot);

            writer.write_record([
                record.id.as_str(),
                record.owner.as_str(),
                kind_str(record.kind),
                created_at.as_str(),
                record.image_url.as_str(),
                record.body.as_str(),
                record.caption.as_str(),
                tags.as_str(),
                colors.as_str(),
                record.content_type.as_str(),
                domain_tags.as_str(),
                vibe_tags.as_str(),
                has_people.as_str(),
                people_count.as_str(),
                is_screenshot.as_str(),
            ])?;
        }
        writer.flush()?;
        std::fs::rename(&temp_path, &csv_path)?;

        let embeddings = rows
            .iter()
            .filter_map(|r| r.embedding.clone().map(|e| (r.id.clone(), e)))
            .collect();
        VectorFile::new(self.dir.join(VECTORS_FILE))
            .save(&embeddings)
            .map_err(|err| match err {
                VectorFileError::Io(io) => StoreError::Io(io),
                other => StoreError::Corrupt(other.to_string()),
            })?;

        Ok(())
    }

    fn rows(&self) -> Vec<Record> {
        self.records.read().unwrap().clone()
    }

    fn emit(&self, event: StoreEvent) {
        // nobody listening is fine; polls will catch up
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn select_all(&self, owner: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|r| r.owner == owner)
            .collect())
    }

    async fn select_created_after(
        &self,
        owner: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|r| r.owner == owner && r.created_at > after)
            .collect())
    }

    async fn fetch(&self, id: &Eid) -> Result<Option<Record>, StoreError> {
        Ok(self.rows().into_iter().find(|r| &r.id == id))
    }

    async fn insert(&self, draft: RecordDraft) -> Result<Record, StoreError> {
        let record = draft.into_record(Eid::new(), Utc::now());

        let rows = {
            let mut rows = self.records.write().unwrap();
            rows.push(record.clone());
            rows.clone()
        };
        self.save(&rows)?;

        self.emit(StoreEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &Eid, patch: RecordPatch) -> Result<Record, StoreError> {
        let (updated, rows) = {
            let mut rows = self.records.write().unwrap();
            let record = rows
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            record.apply(&patch);
            (record.clone(), rows.clone())
        };
        self.save(&rows)?;

        self.emit(StoreEvent::Updated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: &Eid) -> Result<(), StoreError> {
        let rows = {
            let mut rows = self.records.write().unwrap();
            let before = rows.len();
            rows.retain(|r| &r.id != id);
            if rows.len() == before {
                return Err(StoreError::NotFound(id.clone()));
            }
            rows.clone()
        };
        self.save(&rows)
    }

    fn subscribe(&self, _owner: &str) -> broadcast::Receiver<StoreEvent> {
        // single-user backend: the channel already carries one owner's rows
        self.events.subscribe()
    }
}

fn kind_str(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Photo => "photo",
        RecordKind::Note => "note",
    }
}

fn opt_str<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_csv(path: &Path) -> Result<Vec<Record>, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let field = |idx: usize| -> Result<&str, StoreError> {
            row.get(idx).ok_or_else(|| {
                StoreError::Corrupt(format!("row is missing column {}", CSV_HEADERS[idx]))
            })
        };

        let kind = match field(2)? {
            "photo" => RecordKind::Photo,
            "note" => RecordKind::Note,
            other => {
                return Err(StoreError::Corrupt(format!("unknown record kind {other:?}")))
            }
        };
        let created_at = field(3)?
            .parse::<DateTime<Utc>>()
            .map_err(|e| StoreError::Corrupt(format!("bad created_at: {e}")))?;

        records.push(Record {
            id: Eid::from(field(0)?),
            owner: field(1)?.to_string(),
            kind,
            created_at,
            image_url: field(4)?.to_string(),
            body: field(5)?.to_string(),
            caption: field(6)?.to_string(),
            tags: split_list(field(7)?),
            colors: split_list(field(8)?),
            content_type: field(9)?.to_string(),
            domain_tags: split_list(field(10)?),
            vibe_tags: split_list(field(11)?),
            has_people: parse_opt(field(12)?)?,
            people_count: parse_opt(field(13)?)?,
            is_screenshot: parse_opt(field(14)?)?,
            embedding: None,
        });
    }

    Ok(records)
}

fn parse_opt<T: std::str::FromStr>(raw: &str) -> Result<Option<T>, StoreError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| StoreError::Corrupt(format!("unparseable value {raw:?}")))
}

pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError> {
        let target = self.dir.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = self.dir.join(format!("{}-upload", Eid::new()));
        std::fs::write(&temp, bytes)?;
        std::fs::rename(&temp, &target)?;

        log::debug!("stored blob {path} ({content_type}, {} bytes)", bytes.len());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("file://{}", self.dir.join(path).display())
    }
}
