use crate::eid::Eid;
use crate::services::{BlobError, CaptioningError, StoreError};

/// Errors surfaced to the user for the action they initiated. Background
/// work (the reconciliation loop, the semantic leg) logs and degrades
/// instead of raising these.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not signed in (run `keep login` first)")]
    NotSignedIn,

    #[error("record {0} not found")]
    NotFound(Eid),

    #[error("record {0} is not a note; only notes can be pinned")]
    NotANote(Eid),

    #[error("record {0} is not a photo; only photos carry embeddings")]
    NotAPhoto(Eid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Captioning(#[from] CaptioningError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
