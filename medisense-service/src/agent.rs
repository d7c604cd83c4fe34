use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;
use thiserror::Error;
use tracing::info;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Instruction template sent with every image.
pub const ANALYSIS_PROMPT: &str = r#"You are a highly skilled medical imaging expert with extensive knowledge in radiology and diagnostic imaging. Analyze the patient's medical image and structure your response as follows:

### 1. Image Type & Region
- Specify imaging modality (X-ray/MRI/CT/Ultrasound/etc.)
- Identify the patient's anatomical region and positioning
- Comment on image quality and technical adequacy

### 2. Key Findings
- List primary observations systematically
- Note any abnormalities in the patient's imaging with precise descriptions
- Include measurements and densities where relevant
- Describe location, size, shape, and characteristics
- Rate severity: Normal/Mild/Moderate/Severe

### 3. Diagnostic Assessment
- Provide primary diagnosis with confidence level
- List differential diagnoses in order of likelihood
- Support each diagnosis with observed evidence from the patient's imaging
- Note any critical or urgent findings

### 4. Patient-Friendly Explanation
- Explain the findings in simple, clear language that the patient can understand
- Avoid medical jargon or provide clear definitions
- Include visual analogies if helpful
- Address common patient concerns related to these findings

### 5. Research Context
- Reference standard treatment protocols for the findings
- Note relevant recent advances in imaging or treatment
- Include 2-3 key literature references to support your analysis

Format your response using clear markdown headers and bullet points. Be concise yet thorough."#;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to read image: {0}")]
    Image(#[from] std::io::Error),

    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response shape from analysis service")]
    MalformedResponse,
}

/// The external multimodal reasoning service that accepts an image and
/// instructions and returns free-text findings.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    /// Produce a free-text radiology report for the image at `image_path`.
    async fn analyze(&self, image_path: &Path, mime_type: &str) -> Result<String, AgentError>;
}

/// Agent backed by the Gemini `generateContent` API with inline image data.
pub struct GeminiAgent {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiAgent {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: GEMINI_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl AnalysisAgent for GeminiAgent {
    async fn analyze(&self, image_path: &Path, mime_type: &str) -> Result<String, AgentError> {
        let image_bytes = tokio::fs::read(image_path).await?;
        let encoded = STANDARD.encode(&image_bytes);

        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": ANALYSIS_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": encoded } }
                ]
            }]
        });

        let url = format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        let parts = body["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or(AgentError::MalformedResponse)?;

        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AgentError::MalformedResponse);
        }

        info!(
            model = %self.model,
            "analysis agent returned {} characters",
            text.len()
        );
        Ok(text)
    }
}
