//! Exact and fuzzy text matching over the snapshot.
//!
//! Three branches, one per query mode:
//! - note-scoped: case-insensitive substring over note bodies;
//! - exact phrase: whole-word regex over the full haystack (including the
//!   date renderings);
//! - free text: per-token fuzzy scoring for queries of three or more
//!   characters, plus a substring fallback over the same haystack the
//!   phrase branch uses.

use regex::Regex;

use crate::records::{Record, RecordKind};
use crate::search::similarity::similarity;
use crate::search::{FUZZY_THRESHOLD, MIN_FUZZY_QUERY_LEN};

/// A record with its fuzzy relevance score.
#[derive(Debug, Clone)]
pub struct TextMatch {
    pub record: Record,
    pub score: f32,
}

/// Note-scoped branch: notes whose body contains the needle, newest first.
/// An empty needle returns every note.
pub fn match_notes(records: &[Record], needle: &str) -> Vec<Record> {
    let mut notes: Vec<Record> = records
        .iter()
        .filter(|r| r.kind == RecordKind::Note)
        .filter(|r| needle.is_empty() || r.body.to_lowercase().contains(needle))
        .cloned()
        .collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notes
}

/// Exact-phrase branch: whole-word match of the literal phrase against each
/// record's haystack. An empty phrase degenerates to "everything"; a phrase
/// that somehow fails to compile as a regex matches nothing.
pub fn match_phrase(records: &[Record], phrase: &str) -> Vec<Record> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return records.to_vec();
    }

    let pattern = format!(r"\b{}\b", regex::escape(phrase));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            log::error!("phrase regex failed to build: {err}");
            return vec![];
        }
    };

    records
        .iter()
        .filter(|r| re.is_match(&r.haystack()))
        .cloned()
        .collect()
}

/// Free-text fuzzy branch. Defined only for queries of
/// [`MIN_FUZZY_QUERY_LEN`] or more characters; shorter queries return no
/// fuzzy matches at all (short strings are similar to everything).
///
/// A record's score is the maximum over its search tokens: 1.0 for a token
/// containing the query as a substring, otherwise the edit-distance
/// similarity. Records below [`FUZZY_THRESHOLD`] are dropped.
pub fn match_fuzzy(records: &[Record], query: &str) -> Vec<TextMatch> {
    if query.chars().count() < MIN_FUZZY_QUERY_LEN {
        return vec![];
    }

    let mut matches: Vec<TextMatch> = records
        .iter()
        .filter_map(|record| {
            let score = record
                .search_tokens()
                .iter()
                .map(|token| {
                    if token.contains(query) {
                        1.0
                    } else {
                        similarity(query, token)
                    }
                })
                .fold(0.0f32, f32::max);

            if score >= FUZZY_THRESHOLD {
                Some(TextMatch {
                    record: record.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

/// Substring fallback over the same concatenated haystack the phrase branch
/// searches. An empty query matches everything.
pub fn match_substring(records: &[Record], query: &str) -> Vec<Record> {
    if query.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| r.haystack().contains(query))
        .cloned()
        .collect()
}
