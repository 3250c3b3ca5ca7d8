//! Speech-to-text client.
//!
//! POSTs a WAV body to the configured provider and reads back a plain
//! transcript. No streaming: the whole turn is already buffered by the
//! time the orchestrator calls this, so one request/response round trip
//! is all that's needed.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct SttResult {
    pub transcript: String,
    pub duration_sec: f64,
}

#[derive(Clone)]
pub struct SttClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl SttClient {
    pub fn new(endpoint: String, api_key: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self { http, endpoint, api_key }
    }

    /// Transcribe 8 kHz mono PCM. `language` and `keywords` come straight
    /// from the session's `AgentConfig`.
    pub async fn transcribe(
        &self,
        pcm: &[i16],
        language: &str,
        keywords: Option<&[String]>,
    ) -> Result<SttResult, PipelineError> {
        let wav = relay_audio::pcm_to_wav(pcm).map_err(|e| PipelineError::Stt(e.to_string()))?;

        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| PipelineError::Stt(format!("invalid STT endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", "general");
            query.append_pair("language", language);
            query.append_pair("smart_format", "true");
            query.append_pair("punctuate", "true");
            query.append_pair("encoding", "linear16");
            query.append_pair("sample_rate", "8000");
            if let Some(keywords) = keywords {
                for keyword in keywords {
                    query.append_pair("keywords", keyword);
                }
            }
        }

        let response = self
            .http
            .post(url)
            .header("authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("content-type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| PipelineError::Stt(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Stt(format!("HTTP {}", response.status())));
        }

        let body: SttResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Stt(e.to_string()))?;

        let (transcript, duration_sec) = body.into_transcript();
        Ok(SttResult { transcript, duration_sec })
    }
}

/// The documented response shape: a nested transcript path plus a top-level
/// duration, matching the Deepgram-style `results.channels[0].alternatives[0]`
/// contract the provider exposes.
#[derive(Debug, Deserialize)]
struct SttResponse {
    #[serde(default)]
    metadata: SttMetadata,
    results: SttResults,
}

#[derive(Debug, Default, Deserialize)]
struct SttMetadata {
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct SttResults {
    channels: Vec<SttChannel>,
}

#[derive(Debug, Deserialize)]
struct SttChannel {
    alternatives: Vec<SttAlternative>,
}

#[derive(Debug, Deserialize)]
struct SttAlternative {
    #[serde(default)]
    transcript: String,
}

impl SttResponse {
    fn into_transcript(self) -> (String, f64) {
        let transcript = self
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default();
        (transcript, self.metadata.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_transcript_from_documented_path() {
        let body: SttResponse = serde_json::from_str(
            r#"{
                "metadata": {"duration": 2.5},
                "results": {"channels": [{"alternatives": [{"transcript": "hello there"}]}]}
            }"#,
        )
        .unwrap();
        let (transcript, duration) = body.into_transcript();
        assert_eq!(transcript, "hello there");
        assert_eq!(duration, 2.5);
    }

    #[test]
    fn missing_alternatives_yields_empty_transcript() {
        let body: SttResponse = serde_json::from_str(
            r#"{"results": {"channels": [{"alternatives": []}]}}"#,
        )
        .unwrap();
        let (transcript, _) = body.into_transcript();
        assert_eq!(transcript, "");
    }
}
