//! Streaming chat-completion client.
//!
//! Consumes a Server-Sent-Events-style body incrementally: chunks arrive as
//! `data: {...}\n\n`, with a terminal `data: [DONE]`. The parser never
//! assumes a chunk boundary lines up with an event boundary, so it keeps a
//! tail buffer across reads and only acts on complete lines.

use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use relay_core::{ConversationMessage, Role};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatModel {
    Small,
    Large,
}

impl ChatModel {
    fn api_name(self) -> &'static str {
        match self {
            ChatModel::Small => "gpt-4o-mini",
            ChatModel::Large => "gpt-4o",
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

/// Total input/output token counts for one completion, for cost accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of a fully-consumed streaming completion.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub text: String,
    pub usage: TokenUsage,
}

impl LlmClient {
    pub fn new(endpoint: String, api_key: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self { http, endpoint, api_key }
    }

    /// Stream a chat completion, invoking `on_delta` synchronously with the
    /// full accumulated text every time new tokens arrive, and with
    /// `should_continue` checked before each network read so the caller can
    /// cancel via the playback-token idiom without the client knowing about
    /// cancellation tokens at all.
    pub async fn stream_completion(
        &self,
        messages: &[ConversationMessage],
        model: ChatModel,
        temperature: f32,
        max_tokens: u32,
        mut on_delta: impl FnMut(&str),
        mut should_continue: impl FnMut() -> bool,
    ) -> Result<ChatCompletion, PipelineError> {
        let request = ChatRequest {
            model: model.api_name().to_string(),
            messages: messages.iter().map(ChatMessageDto::from).collect(),
            temperature,
            max_tokens,
            stream: true,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Llm(format!("HTTP {}", response.status())));
        }

        let mut accumulated = String::new();
        let mut usage = TokenUsage::default();
        let mut tail = String::new();
        let mut stream = response.bytes_stream();

        while should_continue() {
            let Some(chunk) = stream.next().await else { break };
            let chunk = chunk.map_err(|e| PipelineError::Llm(e.to_string()))?;
            tail.push_str(&String::from_utf8_lossy(&chunk));

            loop {
                let Some(newline) = tail.find('\n') else { break };
                let line = tail[..newline].trim_end_matches('\r').to_string();
                tail.drain(..=newline);

                let Some(payload) = line.strip_prefix("data: ") else { continue };
                if payload == "[DONE]" {
                    return Ok(ChatCompletion { text: accumulated, usage });
                }
                let Ok(event) = serde_json::from_str::<StreamEvent>(payload) else { continue };
                if let Some(delta) = event.delta_text() {
                    accumulated.push_str(delta);
                    on_delta(&accumulated);
                }
                if let Some(event_usage) = event.usage {
                    usage = TokenUsage {
                        input_tokens: event_usage.prompt_tokens,
                        output_tokens: event_usage.completion_tokens,
                    };
                }
            }
        }

        Ok(ChatCompletion { text: accumulated, usage })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessageDto>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessageDto {
    role: &'static str,
    content: String,
}

impl From<&ConversationMessage> for ChatMessageDto {
    fn from(msg: &ConversationMessage) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role, content: msg.content.clone() }
    }
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

impl StreamEvent {
    fn delta_text(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_from_one_event() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"choices": [{"delta": {"content": "hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(event.delta_text(), Some("hello"));
    }

    #[test]
    fn event_with_no_content_yields_none() {
        let event: StreamEvent = serde_json::from_str(r#"{"choices": [{"delta": {}}]}"#).unwrap();
        assert_eq!(event.delta_text(), None);
    }

    #[test]
    fn model_selects_documented_api_names() {
        assert_eq!(ChatModel::Small.api_name(), "gpt-4o-mini");
        assert_eq!(ChatModel::Large.api_name(), "gpt-4o");
    }
}
