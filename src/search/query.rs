//! Query mode detection.
//!
//! A raw query string is in exactly one of three modes, decided lexically:
//! a `note:` prefix scopes to notes, a double-quoted string requests an
//! exact whole-word phrase, anything else is free text.

/// A parsed query. All payloads are trimmed and lower-cased; matching runs
/// against lower-cased haystacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `note:knitting` — substring match over note bodies only. An empty
    /// remainder means "all notes".
    Notes { needle: String },
    /// `"red shoes"` — whole-word phrase match, no fuzzy or semantic
    /// fallback. An empty phrase degenerates to "everything".
    Phrase { phrase: String },
    /// Everything else: substring + fuzzy + (debounced) semantic search.
    Free { text: String },
}

pub fn parse(raw: &str) -> Query {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();

    if let Some(rest) = lower.strip_prefix("note:") {
        return Query::Notes {
            needle: rest.trim().to_string(),
        };
    }

    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = trimmed[1..trimmed.len() - 1].trim().to_lowercase();
        return Query::Phrase { phrase: inner };
    }

    Query::Free { text: lower }
}
