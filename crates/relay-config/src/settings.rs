//! Runtime settings, layered as environment variables over documented
//! defaults via the `config` crate. Secrets are never read from a config
//! file, only from the environment, and are held in `SecretString` so a
//! stray `{:?}` never leaks one into a log line.

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Non-secret settings: server port and observability knobs. Layered as
/// `config/default.toml` (optional) → `RELAY__`-prefixed environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_stt_endpoint")]
    pub stt_endpoint: String,

    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stt_endpoint() -> String {
    "https://api.deepgram.com/v1/listen".to_string()
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_tts_endpoint() -> String {
    "https://api.elevenlabs.io/v1/text-to-speech".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            stt_endpoint: default_stt_endpoint(),
            llm_endpoint: default_llm_endpoint(),
            tts_endpoint: default_tts_endpoint(),
        }
    }
}

impl Settings {
    /// Load layered settings, falling back to documented defaults if no
    /// config file is present. `PORT` (unprefixed, per the carrier-facing
    /// contract) overrides `port` when set.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            );
        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                settings.port = port;
            }
        }

        Ok(settings)
    }
}

/// Secrets required at session start. Read directly from the environment,
/// never from a config file.
#[derive(Clone)]
pub struct Secrets {
    pub stt_api_key: SecretString,
    pub llm_api_key: SecretString,
    pub tts_api_key: SecretString,
    pub shared_secret: SecretString,
    pub config_base_url: String,
}

impl Secrets {
    /// Load from the environment. Fails with `ConfigError::MissingSecret`
    /// naming the first absent variable, so the caller can terminate the
    /// session cleanly per the "missing required secret" error policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            stt_api_key: env_secret("STT_API_KEY")?,
            llm_api_key: env_secret("LLM_API_KEY")?,
            tts_api_key: env_secret("TTS_API_KEY")?,
            shared_secret: env_secret("SHARED_SECRET")?,
            config_base_url: std::env::var("CONFIG_BASE_URL")
                .map_err(|_| ConfigError::MissingSecret("CONFIG_BASE_URL"))?,
        })
    }
}

fn env_secret(name: &'static str) -> Result<SecretString, ConfigError> {
    std::env::var(name)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingSecret(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.log_level, "info");
        assert!(!settings.log_json);
    }
}
