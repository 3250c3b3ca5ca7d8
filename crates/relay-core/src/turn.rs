use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a message in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the append-only conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One complete user utterance, delimited by the VAD/turn segmenter.
///
/// `pcm` is 16-bit signed linear PCM, 8 kHz, mono, including up to
/// `prefixPaddingMs` of pre-roll captured before speech onset.
#[derive(Debug, Clone)]
pub struct Turn {
    pub pcm: Vec<i16>,
    pub duration: Duration,
}

impl Turn {
    pub const SAMPLE_RATE_HZ: u32 = 8_000;

    pub fn new(pcm: Vec<i16>) -> Self {
        let duration =
            Duration::from_secs_f64(pcm.len() as f64 / Self::SAMPLE_RATE_HZ as f64);
        Self { pcm, duration }
    }
}

/// Carrier wire format, auto-detected from the first `start` frame's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Twilio,
    Telnyx,
}
