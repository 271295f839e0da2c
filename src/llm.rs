//! Text-generation client for an Ollama-compatible endpoint.
//!
//! Non-streaming `POST {base_url}/api/generate` with bounded retries and
//! linear backoff on 429/5xx responses. Model-backed collaborators
//! (routing, SQL generation) use this client and fall back to their
//! deterministic counterparts when it fails.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ModelConfig;

#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LlmClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("[model] model must be set when the provider is enabled")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            max_retries: config.max_retries,
        })
    }

    /// Generate a completion for `prompt`, retrying transient failures.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = self.client.post(&url).json(&body).send().await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: GenerateResponse = response
                        .json()
                        .await
                        .context("malformed generation response")?;
                    return Ok(parsed.response);
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if !retryable || attempt > self.max_retries {
                        bail!("generation request failed with status {}", status);
                    }
                }
                Err(err) => {
                    if attempt > self.max_retries {
                        return Err(err).context("generation request failed");
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
        }
    }
}
