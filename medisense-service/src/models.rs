use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Context keys shared between the HTTP layer and the pipeline stages.
pub mod session_keys {
    pub const REPORT: &str = "report";
}

/// Languages the translation and speech services accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Te,
    Hi,
    Ta,
    Kn,
    Ml,
    Mr,
    Fr,
    Es,
}

impl Language {
    pub const ALL: [Language; 9] = [
        Language::En,
        Language::Te,
        Language::Hi,
        Language::Ta,
        Language::Kn,
        Language::Ml,
        Language::Mr,
        Language::Fr,
        Language::Es,
    ];

    /// ISO 639-1 code sent to the external services.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Te => "te",
            Language::Hi => "hi",
            Language::Ta => "ta",
            Language::Kn => "kn",
            Language::Ml => "ml",
            Language::Mr => "mr",
            Language::Fr => "fr",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
#[error("unsupported language code: {0}")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .find(|l| l.code() == s)
            .copied()
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

/// The analysis produced for one uploaded image. Overwritten wholesale when
/// the same session re-runs analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: String,
    pub image_path: String,
    pub image_mime: String,
    pub language: Language,
    /// Verbatim agent output.
    pub raw_analysis: Option<String>,
    /// Agent output with the conversational preamble lines removed.
    pub analysis_text: Option<String>,
    pub translated_text: Option<String>,
    /// Set when translation failed and the untranslated text is shown instead.
    pub translation_degraded: Option<String>,
    pub audio_path: Option<String>,
}

impl AnalysisReport {
    /// Text presented to the user: the translation when available, the
    /// sanitized analysis otherwise.
    pub fn display_text(&self) -> Option<&str> {
        self.translated_text
            .as_deref()
            .or(self.analysis_text.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub session_id: String,
    pub status: String,
    pub language: Language,
    pub analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_degraded: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: String,
    pub status_message: Option<String>,
    pub context: HashMap<String, serde_json::Value>,
}
