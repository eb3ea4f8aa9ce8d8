//! Chat completion via the Groq API.
//!
//! Groq exposes an OpenAI-compatible `POST {base_url}/chat/completions`
//! endpoint; requests are authenticated with the `GROQ_API_KEY` environment
//! variable. Responses are non-streaming: the first choice's message content
//! is the generated copy.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;

/// One turn handed to the completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Clamp a requested sampling temperature to the API's accepted range.
pub fn clamp_temperature(temperature: f64) -> f64 {
    temperature.clamp(0.0, 2.0)
}

/// Generate a completion for the assembled messages.
pub async fn complete_chat(
    config: &CompletionConfig,
    messages: &[ChatMessage],
    temperature: f64,
) -> Result<String> {
    match config.provider.as_str() {
        "groq" => complete_groq(config, messages, temperature).await,
        "disabled" => bail!("completion provider is disabled"),
        other => bail!("unknown completion provider: {}", other),
    }
}

/// Call the Groq chat completions endpoint with retry/backoff.
///
/// Same retry policy as the embeddings client: 429 and 5xx retry with
/// exponential backoff, other 4xx fail immediately, network errors retry.
async fn complete_groq(
    config: &CompletionConfig,
    messages: &[ChatMessage],
    temperature: f64,
) -> Result<String> {
    let api_key =
        std::env::var("GROQ_API_KEY").map_err(|_| anyhow::anyhow!("GROQ_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("completion.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let request = CompletionRequest {
        model,
        messages,
        temperature: clamp_temperature(temperature),
        max_tokens: config.max_tokens,
        stream: false,
    };

    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(attempt, delay_secs = delay.as_secs(), "retrying completion call");
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let parsed: CompletionResponse = response.json().await?;
                    return parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|choice| choice.message.content)
                        .ok_or_else(|| anyhow::anyhow!("completion response had no choices"));
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "completion API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("completion API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("completion failed after retries")))
}
