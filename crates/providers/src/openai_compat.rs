//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, DeepSeek, Ollama, vLLM, and any endpoint
//! exposing `/chat/completions`.
//!
//! Supports:
//! - Blocking chat completions
//! - Streaming SSE, including `reasoning_content` deltas

use std::time::Duration;

use actloop_config::AppConfig;
use actloop_core::{
    Completion, Message, Provider, ProviderError, ProviderRequest, ProviderResponse, StreamDelta,
    Usage,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible model provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            client,
        })
    }

    /// Build from application config. The public OpenAI endpoint needs a key;
    /// local endpoints may run without one.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() && config.base_url.trim_end_matches('/') == OPENAI_BASE_URL {
            return Err(ProviderError::NotConfigured(
                "no API key (set ACTLOOP_API_KEY or OPENAI_API_KEY, or run `actloop onboard`)"
                    .into(),
            ));
        }
        Self::new(
            "openai-compat",
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let model = if request.model.is_empty() {
            &self.model
        } else {
            &request.model
        };
        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": request.stream,
        });
        if request.stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if request.want_reasoning {
            body["include_reasoning"] = serde_json::json!(true);
        }
        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if body["stream"] == serde_json::Value::Bool(true) {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<Completion, ProviderError> {
        let body = self.request_body(&request);
        debug!(
            provider = %self.name,
            model = %body["model"],
            stream = request.stream,
            messages = request.messages.len(),
            "Sending completion request"
        );
        let response = self.send(&body).await?;

        if !request.stream {
            let api_response: ApiResponse =
                response.json().await.map_err(|e| ProviderError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse response: {e}"),
                })?;
            return parse_full(api_response, request.want_reasoning).map(Completion::Full);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();
        let want_reasoning = request.want_reasoning;

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::new(want_reasoning);

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };
                for event in parser.feed(&bytes) {
                    match event {
                        SseEvent::Delta(delta) => {
                            if tx.send(Ok(delta)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseEvent::Done => return,
                        SseEvent::Unparseable(data) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
        });

        Ok(Completion::Stream(rx))
    }
}

fn parse_full(api: ApiResponse, want_reasoning: bool) -> Result<ProviderResponse, ProviderError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;
    let reasoning = if want_reasoning {
        choice
            .message
            .reasoning_content
            .or(choice.message.reasoning)
            .filter(|r| !r.is_empty())
    } else {
        None
    };
    Ok(ProviderResponse {
        text: choice.message.content.unwrap_or_default(),
        usage: api.usage.map(ApiUsage::into_usage),
        reasoning,
    })
}

/// One decoded server-sent event.
#[derive(Debug)]
enum SseEvent {
    Delta(StreamDelta),
    Done,
    Unparseable(String),
}

/// Incremental SSE line decoder; bytes may split lines arbitrarily.
#[derive(Debug, Default)]
/// Buffers raw bytes so a UTF-8 sequence split across chunks is decoded
/// only once its line is complete.
struct SseParser {
    buffer: Vec<u8>,
    want_reasoning: bool,
}

impl SseParser {
    fn new(want_reasoning: bool) -> Self {
        Self {
            buffer: Vec::new(),
            want_reasoning,
        }
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue; // blank lines, comments, event names
            };
            let data = data.trim();
            if data == "[DONE]" {
                events.push(SseEvent::Done);
                break;
            }
            match serde_json::from_str::<StreamResponse>(data) {
                Ok(chunk) => {
                    if let Some(delta) = self.to_delta(chunk) {
                        events.push(SseEvent::Delta(delta));
                    }
                }
                Err(_) => events.push(SseEvent::Unparseable(data.to_string())),
            }
        }
        events
    }

    fn to_delta(&self, chunk: StreamResponse) -> Option<StreamDelta> {
        let mut delta = StreamDelta {
            usage: chunk.usage.map(ApiUsage::into_usage),
            ..StreamDelta::default()
        };
        if let Some(choice) = chunk.choices.into_iter().next() {
            delta.content = choice.delta.content.filter(|c| !c.is_empty());
            if self.want_reasoning {
                delta.reasoning = choice
                    .delta
                    .reasoning_content
                    .or(choice.delta.reasoning)
                    .filter(|r| !r.is_empty());
            }
        }
        (delta.content.is_some() || delta.reasoning.is_some() || delta.usage.is_some())
            .then_some(delta)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamChoiceDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoiceDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", "http://localhost:1/v1/", None, "m").unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(provider().base_url, "http://localhost:1/v1");
    }

    #[test]
    fn request_body_shape() {
        let request = ProviderRequest {
            model: String::new(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(512),
            stream: true,
            want_reasoning: true,
        };
        let body = provider().request_body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["include_reasoning"], true);
    }

    #[test]
    fn missing_key_for_openai_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(
            OpenAiCompatProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        let local = AppConfig {
            base_url: "http://localhost:11434/v1".into(),
            ..AppConfig::default()
        };
        assert!(OpenAiCompatProvider::from_config(&local).is_ok());
    }

    #[test]
    fn sse_lines_split_across_chunks() {
        let mut parser = SseParser::new(false);
        let first = parser.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(first.is_empty());
        let second = parser.feed(
            b"lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
        );
        let texts: Vec<_> = second
            .into_iter()
            .filter_map(|e| match e {
                SseEvent::Delta(d) => d.content,
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Hello", " world"]);
    }

    #[test]
    fn sse_reasoning_usage_and_done() {
        let mut parser = SseParser::new(true);
        let events = parser.feed(
            b": keep-alive\n\
             data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"think\"}}]}\n\
             data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":4,\"total_tokens\":7}}\n\
             data: [DONE]\n\
             data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );
        assert_eq!(events.len(), 3);
        match &events[0] {
            SseEvent::Delta(d) => assert_eq!(d.reasoning.as_deref(), Some("think")),
            other => panic!("unexpected {other:?}"),
        }
        match &events[1] {
            SseEvent::Delta(d) => assert_eq!(d.usage.map(|u| u.total_tokens), Some(7)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(events[2], SseEvent::Done));
    }

    #[test]
    fn reasoning_dropped_unless_requested() {
        let mut parser = SseParser::new(false);
        let events = parser.feed(b"data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"x\"}}]}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut parser = SseParser::new(false);
        assert!(parser.feed(&bytes[..split]).is_empty());
        let events = parser.feed(&bytes[split..]);
        match events.as_slice() {
            [SseEvent::Delta(d)] => assert_eq!(d.content.as_deref(), Some("café")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_response_parsing() {
        let api: ApiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"message\":\"hi\"}","reasoning_content":"because"}}],
                "usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#,
        )
        .unwrap();
        let response = parse_full(api, true).unwrap();
        assert_eq!(response.text, "{\"message\":\"hi\"}");
        assert_eq!(response.reasoning.as_deref(), Some("because"));
        assert_eq!(response.usage.unwrap().total_tokens, 3);

        let empty: ApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_full(empty, false).is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let request = ProviderRequest {
            model: String::new(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
            stream: false,
            want_reasoning: false,
        };
        let err = provider().complete(request).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network(_) | ProviderError::Timeout(_)
        ));
    }
}
