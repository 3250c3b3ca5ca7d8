//! WebSocket entry point: one call per connection, from `start` through
//! `stop`/close.
//!
//! The receive loop never blocks on a turn: each completed [`Turn`] is
//! handed to the orchestrator on its own spawned task so the loop stays
//! free to keep feeding the segmenter and watching for barge-in. The
//! spawned task reports back over `outcome_tx`, which the loop polls
//! alongside the socket in the same `tokio::select!`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};

use relay_core::{AgentConfig, CallStatus};
use relay_pipeline::orchestrator::TurnRequest;

use crate::frames::{self, InboundFrame};
use crate::session::Session;
use crate::state::AppState;

/// Query-string fallback for `agent_id`/`call_log_id` when the carrier
/// doesn't put them in the `start` frame's custom parameters.
#[derive(Debug, Deserialize, Default)]
pub struct ConnectParams {
    pub agent_id: Option<String>,
    pub call_log_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(ws_sender));

    let mut session: Option<Session> = None;
    let mut audio_tx: Option<mpsc::Sender<Vec<u8>>> = None;
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<relay_pipeline::orchestrator::TurnOutcome>(4);

    loop {
        tokio::select! {
            outcome = outcome_rx.recv() => {
                let Some(outcome) = outcome else { continue };
                if let Some(session) = session.as_mut() {
                    session.apply_outcome(outcome);
                }
            }
            msg = ws_receiver.next() => {
                let Some(msg) = msg else { break };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        tracing::warn!(error = %err, "websocket read failed");
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        let frame = match frames::decode_inbound(&text) {
                            Ok(frame) => frame,
                            Err(err) => {
                                tracing::warn!(error = %err, "dropping malformed carrier frame");
                                continue;
                            }
                        };

                        match frame {
                            InboundFrame::Connected => {}

                            InboundFrame::Start { provider, stream_id, agent_id, call_log_id } => {
                                if session.is_some() {
                                    // streamIdentifier is set exactly once, on the first
                                    // `start` frame; a duplicate is ignored rather than
                                    // re-initializing the call mid-stream.
                                    continue;
                                }
                                let agent_id = agent_id.or_else(|| params.agent_id.clone());
                                let call_log_id = call_log_id
                                    .or_else(|| params.call_log_id.clone())
                                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                                let agent = match &agent_id {
                                    Some(id) => match state.agent_client.fetch(id).await {
                                        Ok(agent) => agent,
                                        Err(err) => {
                                            tracing::warn!(error = %err, agent_id = %id, "agent config fetch failed, using defaults");
                                            AgentConfig::default()
                                        }
                                    },
                                    None => {
                                        tracing::warn!("start frame carried no agent id, using defaults");
                                        AgentConfig::default()
                                    }
                                };

                                let mut new_session =
                                    Session::start(provider, stream_id.clone(), call_log_id, agent.clone());

                                let (tx, mut rx) = mpsc::channel::<Vec<u8>>(32);
                                let forwarder_sender = ws_sender.clone();
                                tokio::spawn(async move {
                                    while let Some(frame) = rx.recv().await {
                                        let text = frames::encode_media(provider, &stream_id, &frame);
                                        if forwarder_sender.lock().await.send(Message::Text(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                });

                                if let Some(greeting) = agent.greeting.clone() {
                                    let token = new_session.playback.capture();
                                    let speaking = new_session.speaking_handle();
                                    new_session.record_greeting(greeting.clone());

                                    // Spawned rather than awaited inline, same as a turn's
                                    // TTS: otherwise the receive loop would stay blocked
                                    // for the whole greeting and never observe a barge-in.
                                    let orchestrator = state.orchestrator.clone();
                                    let playback = new_session.playback.clone();
                                    let agent_for_greeting = agent.clone();
                                    let tx_for_greeting = tx.clone();
                                    tokio::spawn(async move {
                                        orchestrator
                                            .speak(&greeting, &agent_for_greeting, token, &playback, &tx_for_greeting, &speaking)
                                            .await;
                                    });
                                }

                                audio_tx = Some(tx);
                                session = Some(new_session);
                            }

                            InboundFrame::Media { payload } => {
                                let Some(session) = session.as_mut() else { continue };

                                if session.is_speaking() && session.is_barge_in(&payload) {
                                    session.playback.increment();
                                    let clear = frames::encode_clear(session.provider, &session.stream_id);
                                    let _ = ws_sender.lock().await.send(Message::Text(clear)).await;
                                }

                                if let Some(turn) = session.feed_media(&payload) {
                                    let Some(guard) = session.claim_processing() else {
                                        continue;
                                    };
                                    let Some(tx) = audio_tx.clone() else { continue };

                                    let token = session.playback.increment();
                                    let req = TurnRequest {
                                        pcm: turn.pcm,
                                        token,
                                        playback: session.playback.clone(),
                                        agent: session.agent.clone(),
                                        optimized_prompt: session.optimized_prompt.clone(),
                                        prior_user_turns: session.prior_user_turns(),
                                        history: session.history.clone(),
                                        audio_out: tx,
                                        speaking: session.speaking_handle(),
                                    };
                                    let orchestrator = state.orchestrator.clone();
                                    let outcome_tx = outcome_tx.clone();
                                    tokio::spawn(async move {
                                        let _guard = guard;
                                        let outcome = orchestrator.run_turn(req).await;
                                        let _ = outcome_tx.send(outcome).await;
                                    });
                                }
                            }

                            InboundFrame::Stop => break,
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    if let Some(mut session) = session {
        // A turn spawned just before `stop`/close still has its outcome in
        // flight; wait briefly for it so the report isn't missing the last
        // exchange. `is_processing` can only be true for one turn at a time.
        if session.is_processing() {
            if let Ok(Some(outcome)) = tokio::time::timeout(Duration::from_secs(5), outcome_rx.recv()).await {
                session.apply_outcome(outcome);
            }
        }

        session.playback.end_call();
        let report = session.finalize(CallStatus::Completed, &state.cost_rates);
        if let Err(err) = state.call_log_client.submit(&report).await {
            tracing::warn!(error = %err, call_log_id = %report.call_log_id, "call log submission failed");
        }
    }
}
