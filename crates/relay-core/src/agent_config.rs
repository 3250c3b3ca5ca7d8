use serde::{Deserialize, Serialize};

/// VAD tuning parameters, all configurable per-agent with documented
/// fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadTuning {
    /// RMS dBFS threshold above which a frame is considered voiced, for
    /// turn-boundary detection (distinct from the session's barge-in
    /// threshold, which is not agent-configurable).
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f32,

    /// Trailing silence required to finalize a turn, in milliseconds.
    #[serde(default = "default_silence_duration_ms")]
    pub silence_duration_ms: u64,

    /// Pre-speech audio retained to avoid clipping onsets, in milliseconds.
    #[serde(default = "default_prefix_padding_ms")]
    pub prefix_padding_ms: u64,
}

fn default_silence_threshold_db() -> f32 {
    -40.0
}

fn default_silence_duration_ms() -> u64 {
    800
}

fn default_prefix_padding_ms() -> u64 {
    300
}

impl Default for VadTuning {
    fn default() -> Self {
        Self {
            silence_threshold_db: default_silence_threshold_db(),
            silence_duration_ms: default_silence_duration_ms(),
            prefix_padding_ms: default_prefix_padding_ms(),
        }
    }
}

/// Minimum turn duration below which a finalized turn is discarded. Fixed
/// per spec, not agent-configurable.
pub const MIN_TURN_DURATION_MS: u64 = 300;

/// Barge-in threshold. Higher than the VAD's default silence threshold to
/// reduce false triggers from room noise bleeding into the agent's own
/// outbound audio; not agent-configurable.
pub const BARGE_IN_THRESHOLD_DB: f32 = -35.0;

/// Per-session agent configuration, fetched once from the agent
/// configuration service at call start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub greeting: Option<String>,

    #[serde(default = "default_voice_id")]
    pub tts_voice_id: String,

    #[serde(default = "default_tts_model_id")]
    pub tts_model_id: String,

    #[serde(default = "default_stt_language")]
    pub stt_language: String,

    #[serde(default)]
    pub stt_keywords: Option<Vec<String>>,

    #[serde(default)]
    pub vad: VadTuning,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_system_prompt() -> String {
    "You are a helpful voice assistant. Keep responses brief, as they will \
     be spoken aloud."
        .to_string()
}

fn default_voice_id() -> String {
    "default".to_string()
}

fn default_tts_model_id() -> String {
    "default".to_string()
}

fn default_stt_language() -> String {
    "en".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greeting: None,
            tts_voice_id: default_voice_id(),
            tts_model_id: default_tts_model_id(),
            stt_language: default_stt_language(),
            stt_keywords: None,
            vad: VadTuning::default(),
            temperature: default_temperature(),
        }
    }
}
