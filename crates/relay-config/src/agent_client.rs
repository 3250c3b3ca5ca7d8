//! Client for the remote agent configuration service.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use relay_core::AgentConfig;

use crate::error::ConfigError;

#[derive(Clone)]
pub struct AgentConfigClient {
    http: reqwest::Client,
    base_url: String,
    shared_secret: SecretString,
}

impl AgentConfigClient {
    pub fn new(base_url: String, shared_secret: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self { http, base_url, shared_secret }
    }

    /// Fetch the agent record by id. Callers should fall back to
    /// `AgentConfig::default()` on failure so the call still answers (the
    /// config-fetch error policy), logging the failure themselves.
    pub async fn fetch(&self, agent_id: &str) -> Result<AgentConfig, ConfigError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), agent_id);
        let response = self
            .http
            .post(&url)
            .header("x-shared-secret", self.shared_secret.expose_secret())
            .send()
            .await
            .map_err(|e| ConfigError::AgentConfigFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::AgentConfigFetch(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json::<AgentConfig>()
            .await
            .map_err(|e| ConfigError::AgentConfigFetch(e.to_string()))
    }
}
