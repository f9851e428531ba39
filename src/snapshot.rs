//! The locally held copy of the owner's records.
//!
//! The snapshot is the single source of truth the matchers and the UI read
//! from. Three concurrent producers write into it (realtime push, the
//! new-records poll, the pending-enrichment poll) plus the initial bulk load;
//! all of them go through [`Snapshot::apply`], a single atomic
//! read-modify-write entry point, and only ever perform idempotent inserts or
//! non-erasing merges. That makes the writes commutative, so no producer
//! needs to know about the others.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::eid::Eid;
use crate::records::Record;

#[derive(Clone, Default)]
pub struct Snapshot {
    inner: Arc<RwLock<HashMap<Eid, Record>>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only mutation entry point. Every write, no matter which feed
    /// source it came from, runs as one atomic closure over the map.
    pub fn apply<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<Eid, Record>) -> R,
    {
        let mut map = self.inner.write().unwrap();
        f(&mut map)
    }

    /// Idempotent insert keyed by id. Returns false (and leaves the existing
    /// entry untouched) when the record is already present, so the same row
    /// arriving from realtime push and a poll lands exactly once.
    pub fn insert(&self, record: Record) -> bool {
        self.apply(|map| {
            if map.contains_key(&record.id) {
                return false;
            }
            map.insert(record.id.clone(), record);
            true
        })
    }

    /// Bulk idempotent insert. Returns how many records were actually new.
    pub fn insert_all(&self, records: Vec<Record>) -> usize {
        self.apply(|map| {
            let mut added = 0;
            for record in records {
                if !map.contains_key(&record.id) {
                    map.insert(record.id.clone(), record);
                    added += 1;
                }
            }
            added
        })
    }

    /// Non-erasing field merge of a fresher copy into an existing entry.
    /// A record that is no longer in the snapshot (deleted by the user) is
    /// left absent; merges never resurrect.
    pub fn merge(&self, id: &Eid, fetched: &Record) -> bool {
        self.apply(|map| match map.get_mut(id) {
            Some(existing) => {
                let was_pending = existing.is_pending();
                existing.merge_from(fetched);
                if was_pending && !existing.is_pending() {
                    log::debug!("record {id} enriched");
                }
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, id: &Eid) -> Option<Record> {
        self.apply(|map| map.remove(id))
    }

    pub fn get(&self, id: &Eid) -> Option<Record> {
        self.inner.read().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &Eid) -> bool {
        self.inner.read().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Point-in-time view of all records, newest first. Ties on `created_at`
    /// break by id so the view is reproducible for a fixed snapshot.
    pub fn records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.inner.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records
    }

    /// Ids of photos still awaiting enrichment; the pending poll's worklist.
    pub fn pending_ids(&self) -> Vec<Eid> {
        let mut ids: Vec<Eid> = self
            .inner
            .read()
            .unwrap()
            .values()
            .filter(|r| r.is_pending())
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Latest `created_at` across the snapshot; the new-records poll's
    /// watermark after the initial load.
    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap()
            .values()
            .map(|r| r.created_at)
            .max()
    }
}
