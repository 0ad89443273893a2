//! Provider trait — the abstraction over the model collaborator.
//!
//! A Provider takes the turn's message list and answers either with a lazy
//! stream of deltas or with a single completed response. The orchestrator
//! accepts both shapes through [`Completion`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini", "deepseek-chat")
    pub model: String,

    /// The turn's messages, oldest first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Ask the model to return its reasoning trace when it supports one
    #[serde(default)]
    pub want_reasoning: bool,
}

fn default_temperature() -> f32 {
    0.2
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub text: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Reasoning trace, if requested and supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A single increment of a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Partial content
    #[serde(default)]
    pub content: Option<String>,

    /// Partial reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Usage info (typically only on the final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// What a provider hands back: either a live stream (terminated when the
/// sender side closes) or a finished response.
#[derive(Debug)]
pub enum Completion {
    Stream(mpsc::Receiver<Result<StreamDelta, ProviderError>>),
    Full(ProviderResponse),
}

impl Completion {
    /// Drain a completion into a single response, ignoring incremental display.
    pub async fn collect(self) -> Result<ProviderResponse, ProviderError> {
        match self {
            Self::Full(response) => Ok(response),
            Self::Stream(mut rx) => {
                let mut response = ProviderResponse::default();
                while let Some(delta) = rx.recv().await {
                    response.absorb(delta?);
                }
                Ok(response)
            }
        }
    }
}

impl ProviderResponse {
    /// Fold a stream delta into this response.
    pub fn absorb(&mut self, delta: StreamDelta) {
        if let Some(content) = delta.content {
            self.text.push_str(&content);
        }
        if let Some(reasoning) = delta.reasoning {
            self.reasoning
                .get_or_insert_with(String::new)
                .push_str(&reasoning);
        }
        if delta.usage.is_some() {
            self.usage = delta.usage;
        }
    }
}

/// The core Provider trait.
///
/// Every model backend implements this. The orchestrator never knows which
/// one it is talking to.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Submit the request. Implementations honour `request.stream` when they
    /// can, and may always fall back to [`Completion::Full`].
    async fn complete(&self, request: ProviderRequest) -> Result<Completion, ProviderError>;
}
