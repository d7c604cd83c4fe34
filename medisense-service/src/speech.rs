use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::Language;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// The service rejects long queries; text is synthesized in chunks of at
/// most this many characters, split on whitespace, and the MP3 frames are
/// concatenated.
const MAX_CHUNK_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("no text to synthesize")]
    EmptyText,

    #[error("speech request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("speech service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to write audio file: {0}")]
    Io(#[from] std::io::Error),
}

/// The external text-to-speech service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and write the MP3 to `output_path`, overwriting any
    /// prior file there. Returns the path written.
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
        output_path: &Path,
    ) -> Result<PathBuf, SynthesisError>;
}

/// Synthesizer backed by the Google translate TTS endpoint.
pub struct GoogleSpeechSynthesizer {
    client: Client,
}

impl GoogleSpeechSynthesizer {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GoogleSpeechSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: Language,
        output_path: &Path,
    ) -> Result<PathBuf, SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let mut audio = Vec::new();
        for chunk in split_chunks(text, MAX_CHUNK_CHARS) {
            let url = format!(
                "{}?ie=UTF-8&client=tw-ob&tl={}&q={}",
                TTS_ENDPOINT,
                language.code(),
                urlencoding::encode(&chunk)
            );
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(SynthesisError::Status(response.status()));
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output_path, &audio).await?;

        info!(
            path = %output_path.display(),
            bytes = audio.len(),
            language = language.code(),
            "wrote synthesized audio"
        );
        Ok(output_path.to_path_buf())
    }
}

/// Split on whitespace into chunks of at most `max_chars` characters. A
/// single word longer than the limit becomes its own chunk.
fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = word.chars().count() + if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current.chars().count() + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
