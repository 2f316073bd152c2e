// beech-cli/src/client.rs

//! Talks to a running chat server over HTTP.

use anyhow::{anyhow, Context, Result};
use beech_core::models::transcript::{ChatRequest, ChatResponse, TranscriptMessage};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Messages of context sent with every request.
pub const HISTORY_CONTEXT: usize = 10;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ChatClient {
    http_client: Client,
    chat_url: String,
}

impl ChatClient {
    pub fn new(http_client: Client, base_url: &str) -> Self {
        Self {
            http_client,
            chat_url: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    /// Posts `message` with the trailing [`HISTORY_CONTEXT`] messages of
    /// `transcript`, which must not yet contain `message` itself.
    pub async fn send(&self, message: &str, transcript: &[TranscriptMessage]) -> Result<ChatResponse> {
        let start = transcript.len().saturating_sub(HISTORY_CONTEXT);
        let request = ChatRequest {
            message: message.to_string(),
            history: transcript[start..].to_vec(),
        };
        debug!(url = %self.chat_url, history = request.history.len(), "Posting chat message.");

        let response = self
            .http_client
            .post(&self.chat_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Could not reach the chat server at {}", self.chat_url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read chat server response")?;
        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(anyhow!("Chat server returned {}: {}", status, reason));
        }
        serde_json::from_str(&body).context("Failed to parse chat server response")
    }
}
