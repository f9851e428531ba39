//! The pin set: note ids the user keeps at the top of the feed.
//!
//! Purely a presentation-ordering annotation. It is persisted independently
//! of the snapshot and has no effect on which records a search matches,
//! only on how note results are ordered.

use std::collections::HashSet;

use crate::eid::Eid;
use crate::storage::StorageManager;

const PINS_FILE: &str = "pins.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSet {
    ids: HashSet<Eid>,
}

impl PinSet {
    /// Load from pins.json. A missing or malformed file is an empty set;
    /// pins are cosmetic and never worth failing startup over.
    pub fn load(storage: &dyn StorageManager) -> Self {
        if !storage.exists(PINS_FILE) {
            return Self::default();
        }

        match storage
            .read(PINS_FILE)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                serde_json::from_slice::<Vec<Eid>>(&data).map_err(|e| e.to_string())
            }) {
            Ok(ids) => Self {
                ids: ids.into_iter().collect(),
            },
            Err(err) => {
                log::warn!("ignoring unreadable pin set: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &dyn StorageManager) -> std::io::Result<()> {
        let mut ids: Vec<&Eid> = self.ids.iter().collect();
        ids.sort();
        let data = serde_json::to_vec_pretty(&ids).expect("pin ids always serialize");
        storage.write(PINS_FILE, &data)
    }

    /// Returns false when the id was already pinned.
    pub fn pin(&mut self, id: Eid) -> bool {
        self.ids.insert(id)
    }

    /// Returns false when the id was not pinned.
    pub fn unpin(&mut self, id: &Eid) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &Eid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
