//! HTTP surface: a health check plus the WebSocket upgrade route. Nothing
//! else is exposed — no REST CRUD, no auth middleware, no metrics scrape
//! endpoint.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::ws_handler;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "mode": if cfg!(debug_assertions) { "debug" } else { "release" },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::{AgentConfigClient, CallLogClient};
    use relay_core::CostRates;
    use relay_pipeline::{LlmClient, Orchestrator, SttClient, TtsClient};
    use secrecy::SecretString;

    fn state() -> AppState {
        let secret = SecretString::from("test".to_string());
        AppState {
            agent_client: AgentConfigClient::new("http://localhost".to_string(), secret.clone()),
            call_log_client: CallLogClient::new("http://localhost".to_string()),
            orchestrator: Orchestrator::new(
                SttClient::new("http://localhost".to_string(), secret.clone()),
                LlmClient::new("http://localhost".to_string(), secret.clone()),
                TtsClient::new("http://localhost".to_string(), secret),
            ),
            cost_rates: CostRates::default(),
        }
    }

    #[test]
    fn router_builds_with_health_and_ws_routes() {
        let _ = create_router(state());
    }

    #[tokio::test]
    async fn health_reports_ok_status() {
        let body = health().await;
        assert_eq!(body.0["status"], "ok");
    }
}
