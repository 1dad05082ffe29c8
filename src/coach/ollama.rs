//! Client for a local Ollama-compatible `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{CoachError, TextGenerator};
use crate::config::LlmConfig;

const CONNECT_TIMEOUT_SECS: u64 = 5;

pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// # Errors
    ///
    /// Returns [`CoachError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &LlmConfig) -> Result<Self, CoachError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(config.timeout))
            .build()
            .map_err(|e| CoachError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned(), model: config.model.clone() })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model: &self.model, prompt, stream: false };
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoachError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| CoachError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(CoachError::Response { status, body: text });
        }
        parse_generate_response(&text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_generate_response(text: &str) -> Result<String, CoachError> {
    let parsed: GenerateResponse = serde_json::from_str(text).map_err(|e| CoachError::Parse(e.to_string()))?;
    let trimmed = parsed.response.trim();
    if trimmed.is_empty() {
        return Err(CoachError::Empty);
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;
