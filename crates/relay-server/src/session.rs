//! Per-call session state: owns everything the spec's `Session` object
//! owns, and nothing else — the WebSocket loop in [`crate::websocket`]
//! drives it, the orchestrator task mutates its usage counters and history
//! through [`TurnOutcome`], and [`crate::http`] never touches it at all.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use relay_core::{
    AgentConfig, CallReport, CallStatus, ConversationMessage, CostRates, Provider, Role, Turn,
    UsageCounters, UsageReport, BARGE_IN_THRESHOLD_DB,
};
use relay_pipeline::{orchestrator::TurnOutcome, optimize_prompt, PlaybackGate, SegmenterConfig, TurnSegmenter};

pub struct Session {
    pub provider: Provider,
    pub stream_id: String,
    pub call_log_id: String,
    pub agent: AgentConfig,
    pub playback: PlaybackGate,
    pub history: Vec<ConversationMessage>,
    pub usage: UsageCounters,
    /// Script/persona/rules reordering of `agent.system_prompt`, computed
    /// once per call since it doesn't depend on any one turn.
    pub optimized_prompt: String,
    segmenter: TurnSegmenter,
    call_started_at: DateTime<Utc>,
    processing: Arc<AtomicBool>,
    /// Count of in-flight outbound TTS chunks, owned and updated by the
    /// orchestrator (see `relay_pipeline::orchestrator::TurnRequest::speaking`)
    /// so the flag covers exactly the window agent audio is being streamed,
    /// not the STT/LLM legs of a turn.
    speaking: Arc<AtomicUsize>,
}

/// Held while the orchestrator is busy with a turn. Clears the `processing`
/// flag on drop, including on an early return or panic inside the spawned
/// task — the "guaranteed-run finalizer" the segmenter's busy-check relies
/// on to never wedge a session shut.
pub struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    pub fn start(provider: Provider, stream_id: String, call_log_id: String, agent: AgentConfig) -> Self {
        let segmenter = TurnSegmenter::new(SegmenterConfig::from(&agent));
        let optimized_prompt = optimize_prompt(&agent.system_prompt);
        Self {
            provider,
            stream_id,
            call_log_id,
            agent,
            playback: PlaybackGate::new(),
            history: Vec::new(),
            usage: UsageCounters::default(),
            optimized_prompt,
            segmenter,
            call_started_at: Utc::now(),
            processing: Arc::new(AtomicBool::new(false)),
            speaking: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many `user` messages are already in history, for the flow-state
    /// turn-bucket the prompt optimizer keys off of.
    pub fn prior_user_turns(&self) -> u32 {
        self.history.iter().filter(|m| m.role == Role::User).count() as u32
    }

    /// Tries to claim the orchestrator for a new turn. `None` means the
    /// orchestrator is already busy and the turn must be dropped, not
    /// queued.
    pub fn claim_processing(&self) -> Option<ProcessingGuard> {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard(self.processing.clone()))
    }

    /// Whether a turn is still in flight on its spawned task. Used on
    /// connection teardown to decide whether to wait for its outcome before
    /// finalizing the call report.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Handle handed to the orchestrator for one turn, so it can mark the
    /// exact window agent audio is in flight (final speak, and any
    /// concurrent early-start speak).
    pub fn speaking_handle(&self) -> Arc<AtomicUsize> {
        self.speaking.clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) > 0
    }

    /// RMS of this frame against the barge-in threshold. Only meaningful
    /// while `is_speaking()` is true; the caller is responsible for that
    /// check, since computing it is wasted work otherwise.
    pub fn is_barge_in(&self, ulaw_frame: &[u8]) -> bool {
        let pcm = relay_audio::decode_buf(ulaw_frame);
        relay_audio::rms_db(&pcm) >= BARGE_IN_THRESHOLD_DB
    }

    /// Feed one carrier frame to the turn segmenter and keep the
    /// frame-count usage stats in sync.
    pub fn feed_media(&mut self, ulaw_frame: &[u8]) -> Option<Turn> {
        let turn = self.segmenter.feed(ulaw_frame);
        let stats = self.segmenter.stats();
        self.usage.total_frames = stats.frames_received;
        self.usage.voiced_frames = stats.frames_voiced;
        turn
    }

    /// Records the greeting as the session's very first assistant message,
    /// outside the regular turn-outcome path since there's no matching user
    /// message to pair it with.
    pub fn record_greeting(&mut self, greeting: String) {
        self.history.push(ConversationMessage::assistant(greeting));
        self.usage.turns_count += 1;
    }

    /// Folds a completed turn's deltas into history and usage. Latencies
    /// are only recorded for stages that actually ran, so an aborted turn
    /// (empty STT, stale token) doesn't skew the averages with a spurious
    /// zero.
    pub fn apply_outcome(&mut self, outcome: TurnOutcome) {
        if outcome.user_message.is_some() {
            self.usage.stt_duration_sec += outcome.stt_duration_sec;
            self.usage.stt_latency.record(outcome.stt_latency_ms);
        }
        if outcome.assistant_message.is_some() {
            self.usage.llm_input_tokens += outcome.llm_input_tokens;
            self.usage.llm_output_tokens += outcome.llm_output_tokens;
            self.usage.tts_characters += outcome.tts_characters;
            self.usage.llm_latency.record(outcome.llm_latency_ms);
            self.usage.tts_latency.record(outcome.tts_latency_ms);
            self.usage.turns_count += 1;
        }
        if let Some(user_msg) = outcome.user_message {
            self.history.push(user_msg);
        }
        if let Some(assistant_msg) = outcome.assistant_message {
            self.history.push(assistant_msg);
        }
    }

    fn render_transcript(&self) -> String {
        self.history
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn finalize(&self, status: CallStatus, rates: &CostRates) -> CallReport {
        let cost = self.usage.estimated_cost(rates);
        let duration_seconds = (Utc::now() - self.call_started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0;
        CallReport {
            call_log_id: self.call_log_id.clone(),
            duration_seconds,
            transcript: self.render_transcript(),
            status,
            ended_at: Utc::now(),
            usage: UsageReport::from_usage(&self.usage, cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::start(
            Provider::Twilio,
            "MZ123".to_string(),
            "call-1".to_string(),
            AgentConfig::default(),
        )
    }

    #[test]
    fn prior_user_turns_counts_only_user_messages() {
        let mut s = session();
        s.history.push(ConversationMessage::system("sys"));
        s.history.push(ConversationMessage::user("hi"));
        s.history.push(ConversationMessage::assistant("hello"));
        s.history.push(ConversationMessage::user("again"));
        assert_eq!(s.prior_user_turns(), 2);
    }

    #[test]
    fn claim_processing_is_exclusive_until_dropped() {
        let s = session();
        let guard = s.claim_processing();
        assert!(guard.is_some());
        assert!(s.claim_processing().is_none(), "already claimed");
        drop(guard);
        assert!(s.claim_processing().is_some(), "released on drop");
    }

    #[test]
    fn apply_outcome_skips_latency_for_stages_that_did_not_run() {
        let mut s = session();
        s.apply_outcome(TurnOutcome::default());
        assert_eq!(s.usage.turns_count, 0);
        assert!(s.history.is_empty());
    }

    #[test]
    fn apply_outcome_folds_a_completed_turn() {
        let mut s = session();
        let outcome = TurnOutcome {
            user_message: Some(ConversationMessage::user("what's my balance")),
            assistant_message: Some(ConversationMessage::assistant("let me check")),
            stt_duration_sec: 2.0,
            llm_input_tokens: 100,
            llm_output_tokens: 20,
            tts_characters: 14,
            stt_latency_ms: 150,
            llm_latency_ms: 400,
            tts_latency_ms: 90,
        };
        s.apply_outcome(outcome);
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.usage.turns_count, 1);
        assert_eq!(s.usage.llm_input_tokens, 100);
    }

    #[test]
    fn greeting_is_recorded_as_assistant_turn() {
        let mut s = session();
        s.record_greeting("Thanks for calling.".to_string());
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.history[0].role, Role::Assistant);
        assert_eq!(s.usage.turns_count, 1);
    }
}
