use serde::{Deserialize, Serialize};

/// Terminal status recorded in the final call report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Clean `stop` frame or socket close after the call was answered.
    Completed,
    /// Session was terminated at startup (e.g. a missing provider secret).
    Error,
}

/// Running min/max/sum/count for one pipeline stage's latency, folded into
/// `avg_latency_*_ms` in the final report. Cheap enough to update inline
/// from the orchestrator; no histogram buckets are kept since nothing
/// downstream reads percentiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    count: u64,
    sum_ms: u64,
}

impl LatencyStats {
    pub fn record(&mut self, ms: u64) {
        self.count += 1;
        self.sum_ms += ms;
    }

    pub fn avg_ms(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum_ms / self.count
        }
    }
}

/// Per-unit cost rates. Defaults match spec; deployments may override via
/// `Settings`.
#[derive(Debug, Clone, Copy)]
pub struct CostRates {
    pub stt_per_minute: f64,
    pub llm_input_per_million_tokens: f64,
    pub llm_output_per_million_tokens: f64,
    pub tts_per_million_chars: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            stt_per_minute: 0.0043,
            llm_input_per_million_tokens: 0.15,
            llm_output_per_million_tokens: 0.60,
            tts_per_million_chars: 30.0,
        }
    }
}

/// Usage counters accumulated over the life of a session, folded into the
/// final call report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageCounters {
    pub turns_count: u32,
    pub stt_duration_sec: f64,
    pub llm_input_tokens: u64,
    pub llm_output_tokens: u64,
    pub tts_characters: u64,
    pub voiced_frames: u64,
    pub total_frames: u64,

    #[serde(skip)]
    pub stt_latency: LatencyStats,
    #[serde(skip)]
    pub llm_latency: LatencyStats,
    #[serde(skip)]
    pub tts_latency: LatencyStats,
}

impl UsageCounters {
    pub fn voice_activity_percent(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            100.0 * self.voiced_frames as f64 / self.total_frames as f64
        }
    }

    pub fn estimated_cost(&self, rates: &CostRates) -> f64 {
        let stt_cost = (self.stt_duration_sec / 60.0) * rates.stt_per_minute;
        let llm_cost = (self.llm_input_tokens as f64 / 1_000_000.0)
            * rates.llm_input_per_million_tokens
            + (self.llm_output_tokens as f64 / 1_000_000.0) * rates.llm_output_per_million_tokens;
        let tts_cost = (self.tts_characters as f64 / 1_000_000.0) * rates.tts_per_million_chars;
        stt_cost + llm_cost + tts_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_model_matches_documented_defaults() {
        let mut usage = UsageCounters::default();
        usage.stt_duration_sec = 60.0;
        usage.llm_input_tokens = 1_000_000;
        usage.llm_output_tokens = 1_000_000;
        usage.tts_characters = 1_000_000;
        let cost = usage.estimated_cost(&CostRates::default());
        assert!((cost - (0.0043 + 0.15 + 0.60 + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn voice_activity_percent_handles_zero_frames() {
        let usage = UsageCounters::default();
        assert_eq!(usage.voice_activity_percent(), 0.0);
    }

    #[test]
    fn latency_stats_average() {
        let mut stats = LatencyStats::default();
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.avg_ms(), 200);
    }
}
