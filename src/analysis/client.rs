//! Vision API client for photo analysis.

use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::prompt::build_prompt;
use super::response::parse_reply;
use super::{AnalysisHints, Analyzer};
use crate::error::AnalysisError;
use crate::state::data::AnalysisResult;

const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Connection settings for the analysis endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL, e.g. "https://api.openai.com/v1"
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Analyzer backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiAnalyzer {
    agent: ureq::Agent,
    api_key: String,
    config: ClientConfig,
}

impl OpenAiAnalyzer {
    /// Create the client. Fails with `MissingApiKey` when no usable key is given.
    pub fn new(api_key: Option<String>, config: ClientConfig) -> Result<Self, AnalysisError> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(AnalysisError::MissingApiKey)?;

        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(OpenAiAnalyzer {
            agent,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

impl Analyzer for OpenAiAnalyzer {
    fn analyze(&self, path: &Path, hints: AnalysisHints) -> Result<AnalysisResult, AnalysisError> {
        let bytes = std::fs::read(path)?;
        let body = build_request_body(&self.config, &build_prompt(hints), &data_url(path, &bytes));

        tracing::info!(
            "🔍 Requesting analysis for {} ({} KB)",
            path.display(),
            bytes.len() / 1024
        );

        let response = match self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(AnalysisError::Status {
                    code,
                    body: truncate(&body, MAX_ERROR_BODY_CHARS),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(AnalysisError::Transport(transport.to_string()));
            }
        };

        let mut raw = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut raw)
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let reply = extract_reply(&raw)?;
        Ok(parse_reply(&reply))
    }
}

/// Build the chat completions payload with the image inlined as a data URL
fn build_request_body(config: &ClientConfig, prompt: &str, image_url: &str) -> serde_json::Value {
    json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": image_url } }
            ]
        }]
    })
}

/// Pull the assistant text out of a chat completions response
fn extract_reply(raw: &[u8]) -> Result<String, AnalysisError> {
    let parsed: ChatResponse = serde_json::from_slice(raw)
        .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnalysisError::InvalidResponse("response has no message content".to_string()))
}

fn data_url(path: &Path, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime_type(path), encoded)
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "image/jpeg",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
