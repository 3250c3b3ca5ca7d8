//! Carrier wire framing: Twilio and Telnyx both send the same `event`
//! vocabulary over JSON text frames, but disagree on the stream identifier's
//! key name and nesting. Provider is auto-detected from field presence on
//! the first `start` frame; everything downstream only ever sees the
//! decoded [`InboundFrame`]/[`Provider`] pair, never the raw JSON shape.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

use relay_core::Provider;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub enum InboundFrame {
    Connected,
    Start {
        provider: Provider,
        stream_id: String,
        agent_id: Option<String>,
        call_log_id: Option<String>,
    },
    Media {
        payload: Vec<u8>,
    },
    Stop,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    stream_id: Option<String>,
    #[serde(default)]
    start: Option<RawStart>,
    #[serde(default)]
    media: Option<RawMedia>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStart {
    #[serde(default, rename = "streamSid")]
    stream_sid: Option<String>,
    #[serde(default, rename = "customParameters")]
    custom_parameters: Option<RawCustomParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCustomParameters {
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    call_log_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    payload: String,
}

/// Parse one inbound text frame. Provider is Twilio if `start.streamSid` is
/// present, Telnyx if the top-level `stream_id` is present instead.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, ServerError> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| ServerError::MalformedFrame(e.to_string()))?;

    match raw.event.as_str() {
        "connected" => Ok(InboundFrame::Connected),
        "start" => {
            let start = raw.start.unwrap_or_default();
            let (provider, stream_id) = match (start.stream_sid, raw.stream_id) {
                (Some(sid), _) => (Provider::Twilio, sid),
                (None, Some(sid)) => (Provider::Telnyx, sid),
                (None, None) => {
                    return Err(ServerError::MalformedFrame(
                        "start frame has neither streamSid nor stream_id".to_string(),
                    ))
                }
            };
            let custom = start.custom_parameters.unwrap_or_default();
            Ok(InboundFrame::Start {
                provider,
                stream_id,
                agent_id: custom.agent_id,
                call_log_id: custom.call_log_id,
            })
        }
        "media" => {
            let media = raw
                .media
                .ok_or_else(|| ServerError::MalformedFrame("media frame missing media field".to_string()))?;
            let payload = BASE64
                .decode(media.payload)
                .map_err(|e| ServerError::MalformedFrame(format!("invalid base64 payload: {e}")))?;
            Ok(InboundFrame::Media { payload })
        }
        "stop" => Ok(InboundFrame::Stop),
        other => Err(ServerError::MalformedFrame(format!("unknown event: {other}"))),
    }
}

/// Outbound `media` frame: a 160-byte mu-law payload, base64-encoded, keyed
/// by the carrier's own stream-identifier field name.
pub fn encode_media(provider: Provider, stream_id: &str, ulaw_frame: &[u8]) -> String {
    let payload = BASE64.encode(ulaw_frame);
    match provider {
        Provider::Twilio => serde_json::json!({
            "event": "media",
            "streamSid": stream_id,
            "media": { "payload": payload },
        })
        .to_string(),
        Provider::Telnyx => serde_json::json!({
            "event": "media",
            "stream_id": stream_id,
            "media": { "payload": payload },
        })
        .to_string(),
    }
}

/// Outbound `clear` frame, sent on barge-in to flush carrier-buffered audio.
pub fn encode_clear(provider: Provider, stream_id: &str) -> String {
    match provider {
        Provider::Twilio => serde_json::json!({
            "event": "clear",
            "streamSid": stream_id,
        })
        .to_string(),
        Provider::Telnyx => serde_json::json!({
            "event": "clear",
            "stream_id": stream_id,
        })
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_twilio_from_stream_sid() {
        let frame = decode_inbound(
            r#"{"event":"start","start":{"streamSid":"MZ123","customParameters":{"agent_id":"a1"}}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Start { provider, stream_id, agent_id, .. } => {
                assert_eq!(provider, Provider::Twilio);
                assert_eq!(stream_id, "MZ123");
                assert_eq!(agent_id.as_deref(), Some("a1"));
            }
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn detects_telnyx_from_top_level_stream_id() {
        let frame = decode_inbound(r#"{"event":"start","stream_id":"abc","start":{}}"#).unwrap();
        match frame {
            InboundFrame::Start { provider, stream_id, .. } => {
                assert_eq!(provider, Provider::Telnyx);
                assert_eq!(stream_id, "abc");
            }
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn decodes_media_payload() {
        let payload = BASE64.encode([0xFFu8; 160]);
        let frame = decode_inbound(&format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#))
            .unwrap();
        match frame {
            InboundFrame::Media { payload } => assert_eq!(payload.len(), 160),
            _ => panic!("expected Media"),
        }
    }

    #[test]
    fn malformed_frame_is_an_error_not_a_panic() {
        assert!(decode_inbound("not json").is_err());
        assert!(decode_inbound(r#"{"event":"bogus"}"#).is_err());
    }

    #[test]
    fn outbound_media_key_differs_only_by_provider() {
        let twilio = encode_media(Provider::Twilio, "MZ1", &[0u8; 4]);
        let telnyx = encode_media(Provider::Telnyx, "MZ1", &[0u8; 4]);
        assert!(twilio.contains("\"streamSid\":\"MZ1\""));
        assert!(telnyx.contains("\"stream_id\":\"MZ1\""));
        assert!(!twilio.contains("stream_id"));
        assert!(!telnyx.contains("streamSid"));
    }

    #[test]
    fn outbound_clear_key_differs_only_by_provider() {
        let twilio = encode_clear(Provider::Twilio, "MZ1");
        let telnyx = encode_clear(Provider::Telnyx, "MZ1");
        assert!(twilio.contains("streamSid"));
        assert!(telnyx.contains("stream_id"));
    }
}
