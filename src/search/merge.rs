//! Deterministic merging of the matcher outputs.
//!
//! One ordered rule set decides which candidate list wins for a given query
//! mode; the chosen set is then re-sorted by recency (stably, so ties keep
//! the relevance order the matcher produced). Recency, not relevance, governs
//! the final feed order once the candidate set is fixed.

use crate::pins::PinSet;
use crate::records::Record;
use crate::search::query::Query;
use crate::search::semantic::SemanticMatch;
use crate::search::text::TextMatch;

/// The matcher outputs produced for a single query. Lists that do not apply
/// to the query's mode stay empty.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    /// Note-scoped branch output, already date-sorted.
    pub notes: Vec<Record>,
    /// Fuzzy matches in descending score order.
    pub fuzzy: Vec<TextMatch>,
    /// Substring fallback (or phrase results in phrase mode).
    pub substring: Vec<Record>,
    /// Semantic matches in descending score order, already capped.
    pub semantic: Vec<SemanticMatch>,
}

/// Merge rule, evaluated in order:
/// 1. note-scoped: note results only, pinned first, then newest first;
/// 2. exact phrase: substring list only (precision-first — fuzzy and
///    semantic results are ignored even if present);
/// 3. non-empty semantic list: semantic candidates, re-sorted by recency;
/// 4. non-empty fuzzy list: fuzzy order, then substring results not already
///    included, deduplicated by id, re-sorted by recency;
/// 5. otherwise: the substring fallback, newest first.
pub fn merge(query: &Query, candidates: Candidates, pins: &PinSet) -> Vec<Record> {
    match query {
        Query::Notes { .. } => {
            let mut notes = candidates.notes;
            // stable: within each pin group the date order is preserved
            notes.sort_by_key(|r| !pins.contains(&r.id));
            notes
        }
        Query::Phrase { .. } => sort_by_recency(candidates.substring),
        Query::Free { .. } => {
            if !candidates.semantic.is_empty() {
                let records = candidates.semantic.into_iter().map(|m| m.record).collect();
                return sort_by_recency(records);
            }

            if !candidates.fuzzy.is_empty() {
                let mut records: Vec<Record> =
                    candidates.fuzzy.into_iter().map(|m| m.record).collect();
                for record in candidates.substring {
                    if !records.iter().any(|r| r.id == record.id) {
                        records.push(record);
                    }
                }
                return sort_by_recency(records);
            }

            sort_by_recency(candidates.substring)
        }
    }
}

/// Stable newest-first sort: equal timestamps keep their candidate order.
fn sort_by_recency(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eid::Eid;
    use crate::records::RecordDraft;
    use chrono::{DateTime, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        format!("2026-03-{day:02}T12:00:00Z").parse().unwrap()
    }

    fn photo(id: &str, day: u32) -> Record {
        RecordDraft::photo("owner", "https://blob/p.jpg").into_record(Eid::from(id), at(day))
    }

    fn note(id: &str, day: u32) -> Record {
        RecordDraft::note("owner", "body").into_record(Eid::from(id), at(day))
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    }

    fn scored(record: Record, score: f32) -> TextMatch {
        TextMatch { record, score }
    }

    fn semantic(record: Record, score: f32) -> SemanticMatch {
        SemanticMatch { record, score }
    }

    #[test]
    fn note_mode_sorts_pinned_first() {
        let mut pins = PinSet::default();
        pins.pin(Eid::from("01A"));

        let candidates = Candidates {
            notes: vec![note("01C", 3), note("01B", 2), note("01A", 1)],
            ..Default::default()
        };
        let merged = merge(
            &Query::Notes {
                needle: String::new(),
            },
            candidates,
            &pins,
        );

        assert_eq!(ids(&merged), vec!["01A", "01C", "01B"]);
    }

    #[test]
    fn phrase_mode_ignores_fuzzy_and_semantic() {
        let candidates = Candidates {
            substring: vec![photo("01A", 1)],
            fuzzy: vec![scored(photo("01B", 2), 1.0)],
            semantic: vec![semantic(photo("01C", 3), 0.9)],
            ..Default::default()
        };
        let merged = merge(
            &Query::Phrase {
                phrase: "x".to_string(),
            },
            candidates,
            &PinSet::default(),
        );

        assert_eq!(ids(&merged), vec!["01A"]);
    }

    #[test]
    fn semantic_results_win_and_resort_by_recency() {
        let candidates = Candidates {
            fuzzy: vec![scored(photo("01F", 9), 1.0)],
            substring: vec![photo("01S", 8)],
            semantic: vec![semantic(photo("01A", 1), 0.9), semantic(photo("01B", 5), 0.5)],
            ..Default::default()
        };
        let merged = merge(
            &Query::Free {
                text: "x".to_string(),
            },
            candidates,
            &PinSet::default(),
        );

        // candidate set comes from semantic, display order from recency
        assert_eq!(ids(&merged), vec!["01B", "01A"]);
    }

    #[test]
    fn fuzzy_unions_substring_without_duplicates() {
        let shared = photo("01A", 3);
        let candidates = Candidates {
            fuzzy: vec![scored(shared.clone(), 0.8)],
            substring: vec![shared, photo("01B", 5)],
            ..Default::default()
        };
        let merged = merge(
            &Query::Free {
                text: "x".to_string(),
            },
            candidates,
            &PinSet::default(),
        );

        assert_eq!(ids(&merged), vec!["01B", "01A"]);
    }

    #[test]
    fn substring_fallback_when_nothing_else_matched() {
        let candidates = Candidates {
            substring: vec![photo("01A", 1), photo("01B", 2)],
            ..Default::default()
        };
        let merged = merge(
            &Query::Free {
                text: "x".to_string(),
            },
            candidates,
            &PinSet::default(),
        );

        assert_eq!(ids(&merged), vec!["01B", "01A"]);
    }

    #[test]
    fn recency_sort_is_stable_for_equal_timestamps() {
        // same created_at: relevance order (fuzzy score order) must survive
        let candidates = Candidates {
            fuzzy: vec![
                scored(photo("01Z", 4), 1.0),
                scored(photo("01A", 4), 0.7),
            ],
            ..Default::default()
        };
        let merged = merge(
            &Query::Free {
                text: "x".to_string(),
            },
            candidates,
            &PinSet::default(),
        );

        assert_eq!(ids(&merged), vec!["01Z", "01A"]);
    }
}
