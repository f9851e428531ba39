//! Embedding-based semantic matching.
//!
//! The query is embedded by the captioning service and ranked by cosine
//! similarity against each record's stored embedding. Failure to obtain a
//! query embedding is soft: the matcher yields nothing and the caller falls
//! back to the text results. The threshold/cap pair keeps this approximate
//! mode from flooding the feed.

use crate::records::Record;
use crate::search::{SEMANTIC_LIMIT, SEMANTIC_THRESHOLD};
use crate::services::CaptioningService;

/// A record with its cosine similarity to the query embedding.
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub record: Record,
    pub score: f32,
}

/// Cosine similarity, defined as 0 when either vector has zero magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Rank records with embeddings against a query embedding: keep scores at or
/// above [`SEMANTIC_THRESHOLD`], sort descending, cap at [`SEMANTIC_LIMIT`].
pub fn rank(records: &[Record], query_embedding: &[f32]) -> Vec<SemanticMatch> {
    let mut matches: Vec<SemanticMatch> = records
        .iter()
        .filter_map(|record| {
            let embedding = record.embedding.as_ref()?;
            let score = cosine(query_embedding, embedding);
            if score >= SEMANTIC_THRESHOLD {
                Some(SemanticMatch {
                    record: record.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(SEMANTIC_LIMIT);
    matches
}

/// Embed the query and rank the given records. Any embedding failure is
/// logged and reported as "no results" — never as an error to the user.
pub async fn match_semantic(
    captioner: &dyn CaptioningService,
    records: &[Record],
    query: &str,
) -> Vec<SemanticMatch> {
    let query_embedding = match captioner.embed_text(query).await {
        Ok(embedding) => embedding,
        Err(err) => {
            log::warn!("semantic search unavailable: {err}");
            return vec![];
        }
    };

    rank(records, &query_embedding)
}
