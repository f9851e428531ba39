//! HTTP client for the captioning service.
//!
//! Three JSON endpoints behind bearer auth: `analyze-image` (full
//! enrichment for an uploaded photo), `reembed` (recompute one photo's
//! embedding) and `embed-text` (the embedding capability the semantic
//! matcher uses for queries). A response that is not valid JSON for the
//! expected shape is a parse failure, reported separately from transport
//! errors so callers can log it as such.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::eid::Eid;
use crate::services::{CaptioningService, Enrichment};

#[derive(Debug, thiserror::Error)]
pub enum CaptioningError {
    #[error("captioning request failed: {0}")]
    Http(reqwest::Error),

    #[error("captioning response was malformed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CaptioningError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CaptioningError::Parse(err.to_string())
        } else {
            CaptioningError::Http(err)
        }
    }
}

#[derive(Clone)]
pub struct CaptioningClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    image_url: &'a str,
    photo_id: &'a str,
}

#[derive(Serialize)]
struct ReembedRequest<'a> {
    photo_id: &'a str,
}

#[derive(Serialize)]
struct EmbedTextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl CaptioningClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn post<Req, Resp>(&self, endpoint: &str, body: &Req) -> Result<Resp, CaptioningError>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        log::debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait]
impl CaptioningService for CaptioningClient {
    async fn analyze_image(
        &self,
        image_url: &str,
        photo_id: &Eid,
    ) -> Result<Enrichment, CaptioningError> {
        self.post(
            "analyze-image",
            &AnalyzeRequest {
                image_url,
                photo_id: photo_id.as_str(),
            },
        )
        .await
    }

    async fn reembed(&self, photo_id: &Eid) -> Result<Vec<f32>, CaptioningError> {
        let response: EmbeddingResponse = self
            .post(
                "reembed",
                &ReembedRequest {
                    photo_id: photo_id.as_str(),
                },
            )
            .await?;
        Ok(response.embedding)
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CaptioningError> {
        let response: EmbeddingResponse = self.post("embed-text", &EmbedTextRequest { text }).await?;
        Ok(response.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = CaptioningClient::new("https://captioner.example/", "t");
        assert_eq!(client.base_url, "https://captioner.example");
    }

    #[test]
    fn enrichment_parses_partial_payloads() {
        // the model omits fields it has nothing to say about
        let e: Enrichment =
            serde_json::from_str(r#"{"caption": "a dog", "tags": ["dog"]}"#).unwrap();
        assert_eq!(e.caption, "a dog");
        assert_eq!(e.tags, vec!["dog".to_string()]);
        assert!(e.embedding.is_none());
        assert!(e.has_people.is_none());
    }
}
