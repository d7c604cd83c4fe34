use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::models::Language;

const TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("translation service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response shape from translation service")]
    MalformedResponse,
}

/// The external translation service.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, TranslationError>;
}

/// Translator backed by the public Google translate endpoint.
pub struct GoogleTranslator {
    client: Client,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        target: Language,
    ) -> Result<String, TranslationError> {
        // The agent writes its report in English; nothing to do for "en".
        if target == Language::En || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let response = self
            .client
            .get(TRANSLATE_ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslationError::Status(response.status()));
        }

        let body: Value = response.json().await?;

        // The endpoint answers with nested arrays; the first element holds
        // [translated_segment, source_segment, ...] tuples.
        let segments = body[0].as_array().ok_or(TranslationError::MalformedResponse)?;
        let translated: String = segments
            .iter()
            .filter_map(|segment| segment[0].as_str())
            .collect();

        if translated.is_empty() {
            return Err(TranslationError::MalformedResponse);
        }

        info!(
            language = target.code(),
            "translated {} characters",
            translated.len()
        );
        Ok(translated)
    }
}
