//! Multi-strategy retrieval over the snapshot.
//!
//! A query runs through up to three matchers depending on its mode:
//!
//! - `text`: exact substring, exact whole-word phrase, and edit-distance
//!   fuzzy matching
//! - `semantic`: embedding-based cosine ranking, debounced and cancellable
//! - `merge`: one deterministic rule set combining whatever the matchers
//!   produced
//!
//! The thresholds below are deliberately fixed, not configuration: they were
//! tuned against real feeds and moving them is a behavior change, not a
//! preference.

pub mod debounce;
pub mod merge;
pub mod query;
pub mod semantic;
pub mod similarity;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use crate::pins::PinSet;
use crate::records::Record;
use crate::services::CaptioningService;
use crate::snapshot::Snapshot;

use debounce::Debounce;
use merge::Candidates;
use query::Query;

/// Minimum fuzzy score a record must reach to stay in the result set.
/// Below this, edit-distance matches are noise.
pub const FUZZY_THRESHOLD: f32 = 0.42;

/// Fuzzy matching is defined only for queries of at least this many
/// characters; shorter strings are similar to almost everything.
pub const MIN_FUZZY_QUERY_LEN: usize = 3;

/// Minimum cosine similarity for a semantic match.
pub const SEMANTIC_THRESHOLD: f32 = 0.28;

/// Semantic result cap. Semantic search is approximate and must not flood
/// the feed.
pub const SEMANTIC_LIMIT: usize = 40;

/// The full retrieval pipeline: parses the query mode, fans out to the
/// matchers over a point-in-time snapshot view, and merges.
pub struct SearchPipeline {
    snapshot: Snapshot,
    captioner: Arc<dyn CaptioningService>,
    debounce: Debounce,
}

impl SearchPipeline {
    pub fn new(
        snapshot: Snapshot,
        captioner: Arc<dyn CaptioningService>,
        semantic_debounce: Duration,
    ) -> Self {
        Self {
            snapshot,
            captioner,
            debounce: Debounce::new(semantic_debounce),
        }
    }

    /// Run a query. `with_semantic` disables the embedding leg entirely
    /// (offline search); a failing embedding call degrades to the same
    /// text-only behavior on its own.
    pub async fn search(&self, raw: &str, pins: &PinSet, with_semantic: bool) -> Vec<Record> {
        let query = query::parse(raw);
        let records = self.snapshot.records();

        let candidates = match &query {
            Query::Notes { needle } => Candidates {
                notes: text::match_notes(&records, needle),
                ..Default::default()
            },
            Query::Phrase { phrase } => Candidates {
                substring: text::match_phrase(&records, phrase),
                ..Default::default()
            },
            Query::Free { text: free } => {
                let fuzzy = text::match_fuzzy(&records, free);
                let substring = text::match_substring(&records, free);
                let semantic = if with_semantic && !free.is_empty() {
                    self.debounce
                        .run(|| semantic::match_semantic(self.captioner.as_ref(), &records, free))
                        .await
                        .unwrap_or_default()
                } else {
                    vec![]
                };
                Candidates {
                    fuzzy,
                    substring,
                    semantic,
                    ..Default::default()
                }
            }
        };

        merge::merge(&query, candidates, pins)
    }

    /// Invalidate any in-flight semantic request (teardown).
    pub fn cancel_pending(&self) {
        self.debounce.cancel();
    }
}
