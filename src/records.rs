use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::Hash;

use crate::eid::Eid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Photo,
    Note,
}

/// A single entry in the vault feed: an uploaded photo awaiting (or carrying)
/// enrichment, or a plain text note.
///
/// Enrichment status is derived, never stored: a photo with no caption and no
/// tags is still pending. See [`Record::is_pending`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: Eid,
    pub owner: String,
    pub kind: RecordKind,
    pub created_at: DateTime<Utc>,

    /// Public URL of the uploaded image. Empty for notes.
    #[serde(default)]
    pub image_url: String,
    /// Note body. Empty for photos.
    #[serde(default)]
    pub body: String,

    // enrichment fields, rewritten wholesale by the captioning service
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
    pub vibe_tags: Vec<String>,
    #[serde(default)]
    pub has_people: Option<bool>,
    #[serde(default)]
    pub people_count: Option<u32>,
    #[serde(default)]
    pub is_screenshot: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Hash for Record {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Record {
    /// A photo that the captioning service has not yet described. Notes are
    /// never pending.
    pub fn is_pending(&self) -> bool {
        self.kind == RecordKind::Photo && self.caption.trim().is_empty() && self.tags.is_empty()
    }

    /// Short and long human-readable renderings of the creation date. Both
    /// participate in exact-phrase and substring matching, so a query like
    /// "march 2026" finds photos from that month.
    pub fn date_renderings(&self) -> (String, String) {
        let short = self.created_at.format("%-m/%-d/%Y").to_string();
        let long = self.created_at.format("%B %-d, %Y").to_string();
        (short, long)
    }

    /// Lower-cased concatenation of every searchable text field plus the two
    /// date renderings. Boolean flags contribute fixed tokens so "screenshot"
    /// matches flagged records.
    pub fn haystack(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(self.caption.clone());
        parts.push(self.body.clone());
        parts.extend(self.tags.iter().cloned());
        parts.extend(self.colors.iter().cloned());
        parts.push(self.content_type.clone());
        parts.extend(self.domain_tags.iter().cloned());
        parts.extend(self.vibe_tags.iter().cloned());
        parts.extend(self.flag_tokens());

        let (short, long) = self.date_renderings();
        parts.push(short);
        parts.push(long);

        parts.retain(|p| !p.is_empty());
        parts.join(" ").to_lowercase()
    }

    /// Flat lower-cased token list over the searchable fields, used by the
    /// fuzzy matcher. Dates are deliberately excluded: fuzzy-matching against
    /// "3/14/2026" produces nothing but noise.
    pub fn search_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        tokens.extend(self.caption.split_whitespace().map(str::to_lowercase));
        tokens.extend(self.body.split_whitespace().map(str::to_lowercase));
        tokens.extend(self.tags.iter().map(|t| t.to_lowercase()));
        tokens.extend(self.colors.iter().map(|c| c.to_lowercase()));
        if !self.content_type.is_empty() {
            tokens.push(self.content_type.to_lowercase());
        }
        tokens.extend(self.domain_tags.iter().map(|t| t.to_lowercase()));
        tokens.extend(self.vibe_tags.iter().map(|t| t.to_lowercase()));
        tokens.extend(self.flag_tokens());
        tokens
    }

    fn flag_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        if self.has_people == Some(true) {
            tokens.push("people".to_string());
        }
        if self.is_screenshot == Some(true) {
            tokens.push("screenshot".to_string());
        }
        tokens
    }

    /// Field-wise overwrite with another copy of the same record, typically a
    /// fresher row from the store. Fields the fetched copy does not carry
    /// (empty strings, empty lists, `None`) never erase populated values.
    pub fn merge_from(&mut self, fetched: &Record) {
        debug_assert_eq!(self.id, fetched.id);

        if !fetched.image_url.is_empty() {
            self.image_url = fetched.image_url.clone();
        }
        if !fetched.body.is_empty() {
            self.body = fetched.body.clone();
        }
        if !fetched.caption.trim().is_empty() {
            self.caption = fetched.caption.clone();
        }
        if !fetched.tags.is_empty() {
            self.tags = fetched.tags.clone();
        }
        if !fetched.colors.is_empty() {
            self.colors = fetched.colors.clone();
        }
        if !fetched.content_type.is_empty() {
            self.content_type = fetched.content_type.clone();
        }
        if !fetched.domain_tags.is_empty() {
            self.domain_tags = fetched.domain_tags.clone();
        }
        if !fetched.vibe_tags.is_empty() {
            self.vibe_tags = fetched.vibe_tags.clone();
        }
        if fetched.has_people.is_some() {
            self.has_people = fetched.has_people;
        }
        if fetched.people_count.is_some() {
            self.people_count = fetched.people_count;
        }
        if fetched.is_screenshot.is_some() {
            self.is_screenshot = fetched.is_screenshot;
        }
        if fetched.embedding.is_some() {
            self.embedding = fetched.embedding.clone();
        }
    }

    /// Apply a partial update. `None` fields are left untouched.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(ref body) = patch.body {
            self.body = body.clone();
        }
        if let Some(ref caption) = patch.caption {
            self.caption = caption.clone();
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref colors) = patch.colors {
            self.colors = colors.clone();
        }
        if let Some(ref content_type) = patch.content_type {
            self.content_type = content_type.clone();
        }
        if let Some(ref domain_tags) = patch.domain_tags {
            self.domain_tags = domain_tags.clone();
        }
        if let Some(ref vibe_tags) = patch.vibe_tags {
            self.vibe_tags = vibe_tags.clone();
        }
        if let Some(has_people) = patch.has_people {
            self.has_people = Some(has_people);
        }
        if let Some(people_count) = patch.people_count {
            self.people_count = Some(people_count);
        }
        if let Some(is_screenshot) = patch.is_screenshot {
            self.is_screenshot = Some(is_screenshot);
        }
        if let Some(ref embedding) = patch.embedding {
            self.embedding = Some(embedding.clone());
        }
    }
}

/// What a caller supplies at insert time. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    pub owner: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub body: String,
}

impl RecordDraft {
    pub fn photo(owner: &str, image_url: &str) -> Self {
        Self {
            owner: owner.to_string(),
            kind: RecordKind::Photo,
            image_url: image_url.to_string(),
            body: String::new(),
        }
    }

    pub fn note(owner: &str, body: &str) -> Self {
        Self {
            owner: owner.to_string(),
            kind: RecordKind::Note,
            image_url: String::new(),
            body: body.to_string(),
        }
    }

    pub fn into_record(self, id: Eid, created_at: DateTime<Utc>) -> Record {
        Record {
            id,
            owner: self.owner,
            kind: self.kind,
            created_at,
            image_url: self.image_url,
            body: self.body,
            caption: String::new(),
            tags: Vec::new(),
            colors: Vec::new(),
            content_type: String::new(),
            domain_tags: Vec::new(),
            vibe_tags: Vec::new(),
            has_people: None,
            people_count: None,
            is_screenshot: None,
            embedding: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibe_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_people: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_screenshot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(caption: &str, tags: &[&str]) -> Record {
        let mut r = RecordDraft::photo("owner", "https://blob/x.jpg")
            .into_record(Eid::new(), Utc::now());
        r.caption = caption.to_string();
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    #[test]
    fn pending_is_derived_from_caption_and_tags() {
        assert!(photo("", &[]).is_pending());
        assert!(photo("   ", &[]).is_pending());
        assert!(!photo("a dog", &[]).is_pending());
        assert!(!photo("", &["dog"]).is_pending());

        let note = RecordDraft::note("owner", "todo").into_record(Eid::new(), Utc::now());
        assert!(!note.is_pending());
    }

    #[test]
    fn merge_never_erases_populated_fields() {
        let mut existing = photo("", &["a"]);
        let mut fetched = existing.clone();
        fetched.caption = "x".to_string();
        fetched.tags = Vec::new();

        existing.merge_from(&fetched);

        assert_eq!(existing.caption, "x");
        assert_eq!(existing.tags, vec!["a".to_string()]);
    }

    #[test]
    fn merge_populates_both_fields_and_clears_pending() {
        let mut existing = photo("", &[]);
        assert!(existing.is_pending());

        let mut fetched = existing.clone();
        fetched.caption = "x".to_string();
        fetched.tags = vec!["y".to_string()];

        existing.merge_from(&fetched);

        assert_eq!(existing.caption, "x");
        assert_eq!(existing.tags, vec!["y".to_string()]);
        assert!(!existing.is_pending());
    }

    #[test]
    fn haystack_includes_date_renderings() {
        let mut r = photo("sunset", &[]);
        r.created_at = "2026-03-14T12:00:00Z".parse().unwrap();

        let hay = r.haystack();
        assert!(hay.contains("3/14/2026"));
        assert!(hay.contains("march 14, 2026"));
    }

    #[test]
    fn search_tokens_are_lowercased_and_flat() {
        let mut r = photo("Cozy Evening", &["Knit"]);
        r.vibe_tags = vec!["Warm".to_string()];
        r.is_screenshot = Some(true);

        let tokens = r.search_tokens();
        assert!(tokens.contains(&"cozy".to_string()));
        assert!(tokens.contains(&"evening".to_string()));
        assert!(tokens.contains(&"knit".to_string()));
        assert!(tokens.contains(&"warm".to_string()));
        assert!(tokens.contains(&"screenshot".to_string()));
    }
}
