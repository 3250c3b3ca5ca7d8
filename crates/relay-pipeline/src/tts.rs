//! Text-to-speech client.
//!
//! The provider streams raw mu-law bytes with no frame structure of its
//! own; [`TtsFrameStream`] repacketizes them into exactly 160-byte (20 ms)
//! payloads, pulled one at a time, regardless of how the provider chunked
//! its response body.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;

use crate::error::PipelineError;

/// One 20 ms mu-law payload, carrier-ready.
pub const FRAME_BYTES: usize = 160;

#[derive(Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl TtsClient {
    pub fn new(endpoint: String, api_key: SecretString) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self { http, endpoint, api_key }
    }

    /// Start synthesizing `text`. The HTTP response headers are awaited
    /// here; the body is pulled frame-by-frame via [`TtsFrameStream`].
    pub async fn start(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<TtsFrameStream, PipelineError> {
        let request = TtsRequest {
            text,
            voice_id,
            model_id,
            output_format: "mulaw_8000",
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Tts(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::Tts(format!("HTTP {}", response.status())));
        }

        Ok(TtsFrameStream {
            inner: Box::pin(response.bytes_stream()),
            buffer: Vec::with_capacity(FRAME_BYTES * 2),
            exhausted: false,
        })
    }
}

/// Pull-based repacketizer over a provider's mu-law byte stream.
pub struct TtsFrameStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl TtsFrameStream {
    /// Next 160-byte frame, the final short remainder once the provider's
    /// body is exhausted, or `None` once fully drained.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, PipelineError> {
        loop {
            if self.buffer.len() >= FRAME_BYTES {
                return Ok(Some(self.buffer.drain(..FRAME_BYTES).collect()));
            }
            if self.exhausted {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }
            match self.inner.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| PipelineError::Tts(e.to_string()))?;
                    self.buffer.extend_from_slice(&chunk);
                }
                None => self.exhausted = true,
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
    output_format: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn stream_of(chunks: Vec<&'static [u8]>) -> TtsFrameStream {
        let items: Vec<reqwest::Result<Bytes>> =
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))).collect();
        TtsFrameStream {
            inner: Box::pin(stream::iter(items)),
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    #[tokio::test]
    async fn repacketizes_across_chunk_boundaries() {
        let mut frames = stream_of(vec![&[0xAA; 100], &[0xBB; 100], &[0xCC; 60]]);
        let f1 = frames.next_frame().await.unwrap().unwrap();
        assert_eq!(f1.len(), FRAME_BYTES);
        let f2 = frames.next_frame().await.unwrap().unwrap();
        assert_eq!(f2.len(), FRAME_BYTES);
        assert!(frames.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn final_short_frame_is_emitted() {
        let mut frames = stream_of(vec![&[0x11; 250]]);
        let f1 = frames.next_frame().await.unwrap().unwrap();
        assert_eq!(f1.len(), FRAME_BYTES);
        let f2 = frames.next_frame().await.unwrap().unwrap();
        assert_eq!(f2.len(), 90);
        assert!(frames.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_body_yields_no_frames() {
        let mut frames = stream_of(vec![]);
        assert!(frames.next_frame().await.unwrap().is_none());
    }
}
