use anyhow::{Context, Result, anyhow};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::endpoint;
use crate::config::Config;
use crate::sse::{decode_stream, StreamEvent};
use crate::state::ChatMessage;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// Response of the chat service's health check
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        let defaults = Config::new();
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::new(&config.chat_url)
        }
    }

    /// Send the conversation and stream the reply back as decoded events.
    ///
    /// Connection failures and non-2xx statuses are errors; anything that
    /// goes wrong after the body starts arrives as an event instead.
    pub async fn stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<BoxStream<'static, StreamEvent>> {
        let url = endpoint(&self.base_url, "chat/stream");

        let request = ChatRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Could not reach chat service at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat request failed with status {}: {}", status, text));
        }

        tracing::debug!(%url, "Chat stream opened");
        Ok(decode_stream(response.bytes_stream()).boxed())
    }

    pub async fn health(&self) -> Result<Health> {
        let url = endpoint(&self.base_url, "health");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Health check failed: {}", response.status()));
        }

        Ok(response.json().await?)
    }
}
