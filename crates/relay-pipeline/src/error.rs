use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("STT request failed: {0}")]
    Stt(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("TTS request failed: {0}")]
    Tts(String),
}
