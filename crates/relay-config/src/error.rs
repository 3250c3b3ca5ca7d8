use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("agent config fetch failed: {0}")]
    AgentConfigFetch(String),

    #[error("call log sink request failed: {0}")]
    CallLogSink(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
