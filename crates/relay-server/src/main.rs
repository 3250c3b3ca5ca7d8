//! Entry point: load configuration, wire the provider clients into one
//! `Orchestrator`, and serve until SIGTERM/Ctrl+C.

use std::net::SocketAddr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use relay_config::{AgentConfigClient, CallLogClient, Secrets, Settings};
use relay_core::CostRates;
use relay_pipeline::{LlmClient, Orchestrator, SttClient, TtsClient};
use relay_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load().unwrap_or_else(|err| {
        eprintln!("failed to load settings, using defaults: {err}");
        Settings::default()
    });

    init_tracing(&settings);

    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(err) => {
            tracing::error!(error = %err, "missing required secret, exiting");
            return Err(err.into());
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting relay-server");

    let agent_client = AgentConfigClient::new(secrets.config_base_url.clone(), secrets.shared_secret.clone());
    let call_log_client = CallLogClient::new(secrets.config_base_url.clone());

    let stt = SttClient::new(settings.stt_endpoint.clone(), secrets.stt_api_key.clone());
    let llm = LlmClient::new(settings.llm_endpoint.clone(), secrets.llm_api_key.clone());
    let tts = TtsClient::new(settings.tts_endpoint.clone(), secrets.tts_api_key.clone());
    let orchestrator = Orchestrator::new(stt, llm, tts);

    let state = AppState {
        agent_client,
        call_log_client,
        orchestrator,
        cost_rates: CostRates::default(),
    };

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("relay_server={0},relay_pipeline={0}", settings.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
