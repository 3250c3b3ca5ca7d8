use serde::Serialize;

use crate::usage::{CallStatus, UsageCounters};

/// Usage block of the final call report, matching the call-log sink's
/// documented schema exactly.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub turns_count: u32,
    pub stt_duration_sec: f64,
    pub llm_input_tokens: u64,
    pub llm_output_tokens: u64,
    pub tts_characters: u64,
    pub estimated_cost: f64,
    pub voice_activity_percent: f64,
    pub avg_latency_stt_ms: u64,
    pub avg_latency_llm_ms: u64,
    pub avg_latency_tts_ms: u64,
}

impl UsageReport {
    pub fn from_usage(usage: &UsageCounters, cost: f64) -> Self {
        Self {
            turns_count: usage.turns_count,
            stt_duration_sec: usage.stt_duration_sec,
            llm_input_tokens: usage.llm_input_tokens,
            llm_output_tokens: usage.llm_output_tokens,
            tts_characters: usage.tts_characters,
            estimated_cost: cost,
            voice_activity_percent: usage.voice_activity_percent(),
            avg_latency_stt_ms: usage.stt_latency.avg_ms(),
            avg_latency_llm_ms: usage.llm_latency.avg_ms(),
            avg_latency_tts_ms: usage.tts_latency.avg_ms(),
        }
    }
}

/// The final per-call document POSTed to the call log sink.
#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub call_log_id: String,
    pub duration_seconds: f64,
    pub transcript: String,
    pub status: CallStatus,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub usage: UsageReport,
}
