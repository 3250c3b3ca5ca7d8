//! STT → LLM → TTS orchestration, including the first-sentence early-start
//! and the barge-in-aware remainder TTS.
//!
//! Every suspension point here re-checks `PlaybackGate::still_valid` before
//! touching session state or emitting audio, per the playback-token
//! cancellation idiom: no exceptions, just an early return.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use relay_core::{AgentConfig, ConversationMessage};

use crate::llm::{ChatCompletion, ChatModel, LlmClient};
use crate::playback::PlaybackGate;
use crate::prompt;
use crate::stt::SttClient;
use crate::tts::TtsClient;

const FIRST_SENTENCE_MIN_INDEX: usize = 10;
const FIRST_SENTENCE_MIN_PREFIX_CHARS: usize = 20;
const RECENT_HISTORY_LEN: usize = 6;

#[derive(Clone)]
pub struct Orchestrator {
    stt: SttClient,
    llm: LlmClient,
    tts: TtsClient,
}

/// Everything the orchestrator needs for one turn, owned rather than
/// borrowed so the caller can `tokio::spawn` the turn and keep its own
/// receive loop free to observe barge-in while the turn is in flight.
/// `optimized_prompt` is expected to already be the optimizer's output
/// (script/persona/rules reordered); the flow-state prefix is added here,
/// once the transcript is known, since it quotes what the customer just
/// said.
pub struct TurnRequest {
    pub pcm: Vec<i16>,
    pub token: u64,
    pub playback: PlaybackGate,
    pub agent: AgentConfig,
    pub optimized_prompt: String,
    pub prior_user_turns: u32,
    pub history: Vec<ConversationMessage>,
    pub audio_out: mpsc::Sender<Vec<u8>>,
    /// Incremented for the duration of every outbound TTS chunk (the final
    /// speak and any concurrent early-start speak), decremented on
    /// completion. The caller treats `> 0` as "agent audio is in flight"
    /// for barge-in purposes; a plain counter rather than a bool because
    /// early-start and the remainder can overlap briefly.
    pub speaking: Arc<AtomicUsize>,
}

/// RAII increment/decrement of a speaking counter, so every exit path from
/// a TTS loop — including `?`-free early returns — leaves the counter
/// correct.
struct SpeakingScope(Arc<AtomicUsize>);

impl SpeakingScope {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SpeakingScope {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Usage deltas and the two messages to fold into session state, or `None`
/// for each when the corresponding edge-case policy fired (empty STT,
/// empty LLM reply, or a stale playback token).
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub user_message: Option<ConversationMessage>,
    pub assistant_message: Option<ConversationMessage>,
    pub stt_duration_sec: f64,
    pub llm_input_tokens: u64,
    pub llm_output_tokens: u64,
    pub tts_characters: u64,
    pub stt_latency_ms: u64,
    pub llm_latency_ms: u64,
    pub tts_latency_ms: u64,
}

impl Orchestrator {
    pub fn new(stt: SttClient, llm: LlmClient, tts: TtsClient) -> Self {
        Self { stt, llm, tts }
    }

    /// Speak arbitrary text outside of a turn (the call-start greeting).
    /// Returns the character count spoken, for usage accounting.
    pub async fn speak(
        &self,
        text: &str,
        agent: &AgentConfig,
        token: u64,
        playback: &PlaybackGate,
        audio_out: &mpsc::Sender<Vec<u8>>,
        speaking: &Arc<AtomicUsize>,
    ) -> u64 {
        if text.is_empty() {
            return 0;
        }
        let _scope = SpeakingScope::enter(speaking.clone());
        let mut stream = match self.tts.start(text, &agent.tts_voice_id, &agent.tts_model_id).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "TTS request failed");
                return 0;
            }
        };
        loop {
            if !playback.still_valid(token) {
                break;
            }
            match stream.next_frame().await {
                Ok(Some(frame)) => {
                    if audio_out.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "TTS stream read failed");
                    break;
                }
            }
        }
        text.chars().count() as u64
    }

    pub async fn run_turn(&self, req: TurnRequest) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();

        let stt_started = Instant::now();
        let stt_result = match self
            .stt
            .transcribe(&req.pcm, &req.agent.stt_language, req.agent.stt_keywords.as_deref())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "STT request failed, abandoning turn");
                return outcome;
            }
        };
        outcome.stt_latency_ms = stt_started.elapsed().as_millis() as u64;
        outcome.stt_duration_sec = stt_result.duration_sec;

        if stt_result.transcript.is_empty() {
            return outcome;
        }
        if !req.playback.still_valid(req.token) {
            return outcome;
        }

        let user_message = ConversationMessage::user(stt_result.transcript.clone());

        let system_prompt = match prompt::flow_state_prefix(req.prior_user_turns, &stt_result.transcript) {
            Some(flow_state) => format!("{flow_state}\n\n{}", req.optimized_prompt),
            None => req.optimized_prompt.clone(),
        };

        let mut messages = Vec::with_capacity(req.history.len() + 2);
        messages.push(ConversationMessage::system(system_prompt));
        let start = req.history.len().saturating_sub(RECENT_HISTORY_LEN);
        messages.extend(req.history[start..].iter().cloned());
        messages.push(user_message.clone());

        let model = prompt::select_model(&req.optimized_prompt);
        let temperature = req.agent.temperature.clamp(0.0, 1.0);

        let mut early_start: Option<(String, tokio::task::JoinHandle<()>)> = None;
        let llm_started = Instant::now();
        let token = req.token;
        let playback = req.playback.clone();
        let audio_out = req.audio_out.clone();
        let tts = self.tts.clone();
        let voice_id = req.agent.tts_voice_id.clone();
        let model_id = req.agent.tts_model_id.clone();
        let speaking = req.speaking.clone();

        let completion: ChatCompletion = match self
            .llm
            .stream_completion(
                &messages,
                model_for(model),
                temperature,
                prompt::MAX_TOKENS,
                |accumulated| {
                    if early_start.is_some() {
                        return;
                    }
                    let Some(end) = first_sentence_boundary(accumulated) else { return };
                    let prefix = accumulated[..end].to_string();
                    let handle = spawn_early_tts(
                        tts.clone(),
                        prefix.clone(),
                        voice_id.clone(),
                        model_id.clone(),
                        token,
                        playback.clone(),
                        audio_out.clone(),
                        speaking.clone(),
                    );
                    early_start = Some((prefix, handle));
                },
                || req.playback.still_valid(req.token),
            )
            .await
        {
            Ok(completion) => completion,
            Err(err) => {
                tracing::warn!(error = %err, "LLM request failed, abandoning turn");
                return outcome;
            }
        };
        outcome.llm_latency_ms = llm_started.elapsed().as_millis() as u64;
        outcome.llm_input_tokens = completion.usage.input_tokens;
        outcome.llm_output_tokens = completion.usage.output_tokens;

        if completion.text.is_empty() {
            return outcome;
        }
        if !req.playback.still_valid(req.token) {
            return outcome;
        }

        outcome.user_message = Some(user_message);
        let assistant_message = ConversationMessage::assistant(completion.text.clone());
        outcome.assistant_message = Some(assistant_message);

        let tts_started = Instant::now();
        let remainder = match early_start {
            Some((first_spoken, handle)) => {
                let _ = handle.await;
                if completion.text.starts_with(&first_spoken) {
                    completion.text[first_spoken.len()..].to_string()
                } else {
                    completion.text.clone()
                }
            }
            None => completion.text.clone(),
        };

        if !remainder.is_empty() && req.playback.still_valid(req.token) {
            self.speak(
                &remainder,
                &req.agent,
                req.token,
                &req.playback,
                &req.audio_out,
                &req.speaking,
            )
            .await;
        }
        outcome.tts_latency_ms = tts_started.elapsed().as_millis() as u64;
        outcome.tts_characters = completion.text.chars().count() as u64;

        outcome
    }
}

/// Spawns the background TTS task for the first-sentence early-start. The
/// playback token is captured by value, never a reference to the gate's
/// counter, so no shared-memory synchronization is needed beyond the gate
/// itself.
fn spawn_early_tts(
    tts: TtsClient,
    text: String,
    voice_id: String,
    model_id: String,
    token: u64,
    playback: PlaybackGate,
    audio_out: mpsc::Sender<Vec<u8>>,
    speaking: Arc<AtomicUsize>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let _scope = SpeakingScope::enter(speaking);
        let mut stream = match tts.start(&text, &voice_id, &model_id).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "early-start TTS request failed");
                return;
            }
        };
        loop {
            if !playback.still_valid(token) {
                break;
            }
            match stream.next_frame().await {
                Ok(Some(frame)) => {
                    if audio_out.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "early-start TTS stream read failed");
                    break;
                }
            }
        }
    })
}

fn model_for(choice: prompt::ModelChoice) -> ChatModel {
    match choice {
        prompt::ModelChoice::Small => ChatModel::Small,
        prompt::ModelChoice::Large => ChatModel::Large,
    }
}

/// First index (exclusive end, byte offset) at which the accumulated LLM
/// output has a complete enough sentence to start speaking early. `.!?`
/// terminate; the opening marks `¿¡` never do (they aren't in this set to
/// begin with, so no special-casing is needed to keep them from matching).
fn first_sentence_boundary(text: &str) -> Option<usize> {
    const TERMINATORS: [char; 3] = ['.', '!', '?'];
    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        if TERMINATORS.contains(&ch)
            && char_idx >= FIRST_SENTENCE_MIN_INDEX
            && char_idx + 1 >= FIRST_SENTENCE_MIN_PREFIX_CHARS
        {
            return Some(byte_idx + ch.len_utf8());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_boundary_below_minimum_prefix_length() {
        assert_eq!(first_sentence_boundary("Hi there."), None);
    }

    #[test]
    fn boundary_found_once_prefix_is_long_enough() {
        let text = "Thanks for calling today. What can I help with?";
        let end = first_sentence_boundary(text).unwrap();
        assert_eq!(&text[..end], "Thanks for calling today.");
    }

    #[test]
    fn spanish_opening_marks_never_terminate() {
        // ¿ isn't in the terminator set, so it's just another character;
        // the closing `?` is what fires, once the prefix is long enough.
        let text = "I wonder, ¿Cómo estás hoy? Let's talk more.";
        let end = first_sentence_boundary(text).unwrap();
        assert!(text[..end].ends_with('?'));
    }
}
