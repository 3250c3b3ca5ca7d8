//! Client for the remote call-log sink.

use std::time::Duration;

use relay_core::CallReport;

use crate::error::ConfigError;

#[derive(Clone)]
pub struct CallLogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CallLogClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self { http, base_url }
    }

    /// POST the final per-call report. Failures here are logged by the
    /// caller and do not affect the (already-closed) call.
    pub async fn submit(&self, report: &CallReport) -> Result<(), ConfigError> {
        let response = self
            .http
            .post(&self.base_url)
            .json(report)
            .send()
            .await
            .map_err(|e| ConfigError::CallLogSink(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::CallLogSink(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}
