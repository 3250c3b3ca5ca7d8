//! Turn segmentation, playback cancellation, prompt optimization, and the
//! STT/LLM/TTS provider clients, composed by [`orchestrator::Orchestrator`]
//! into one STT→LLM→TTS pass per call turn.

pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod playback;
pub mod prompt;
pub mod stt;
pub mod tts;
pub mod vad;

pub use error::PipelineError;
pub use llm::{ChatCompletion, ChatModel, LlmClient, TokenUsage};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnRequest};
pub use playback::PlaybackGate;
pub use prompt::{flow_state_prefix, optimize_prompt, select_model, ModelChoice, MAX_TOKENS};
pub use stt::{SttClient, SttResult};
pub use tts::{TtsClient, TtsFrameStream, FRAME_BYTES};
pub use vad::{SegmenterConfig, SegmenterStats, TurnSegmenter, FRAME_MS};
