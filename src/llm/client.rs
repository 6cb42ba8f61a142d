//! Ollama chat client.
//!
//! A thin non-streaming wrapper around the `/api/chat` endpoint. Each call
//! sends a system prompt plus one user message and returns the reply text.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection and sampling settings for the model.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Extra attempts after a transport failure or 5xx reply.
    pub retries: usize,
    /// Base delay between attempts; attempt `n` waits `n` times this.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.1,
            timeout_seconds: 600,
            retries: 2,
            retry_backoff_ms: 2000,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Why a request failed, so retry logic can tell transient from permanent.
#[derive(Debug)]
enum SendError {
    Transport(anyhow::Error),
    Api(anyhow::Error),
}

/// Client for an Ollama-compatible model server.
pub struct LlmClient {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl LlmClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: LlmConfig) -> Result<Self> {
        info!(
            "Initializing LLM client with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send a system prompt and user prompt, returning the reply text.
    ///
    /// When `json_mode` is set the server is asked to constrain output to JSON.
    pub async fn generate(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let attempts = self.config.retries + 1;

        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.send(&messages, json_mode).await {
                Ok(content) => return Ok(content),
                Err(SendError::Api(e)) => return Err(e),
                Err(SendError::Transport(e)) => {
                    if attempt < attempts {
                        let backoff =
                            Duration::from_millis(self.config.retry_backoff_ms * attempt as u64);
                        warn!(
                            "Attempt {}/{} failed: {}. Retrying in {:.1}s",
                            attempt,
                            attempts,
                            e,
                            backoff.as_secs_f64()
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("No request attempts were made")))
    }

    async fn send(&self, messages: &[ChatMessage], json_mode: bool) -> Result<String, SendError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages,
            stream: false,
            format: json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!(
            "Sending chat request ({} chars) to {}",
            messages.iter().map(|m| m.content.len()).sum::<usize>(),
            url
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SendError::Transport(if e.is_timeout() {
                    anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    )
                } else {
                    anyhow!("Failed to send request: {}", e)
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = anyhow!("Ollama API error {}: {}", status, body);
            return Err(if status.is_server_error() {
                SendError::Transport(err)
            } else {
                SendError::Api(err)
            });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")
            .map_err(SendError::Api)?;

        Ok(chat_response.message.content)
    }
}

/// Join a prompt and a transcript into the final model input.
pub fn make_final_prompt(prompt: &str, transcript: &str) -> String {
    format!("{}\n\n{}", prompt, transcript)
}
