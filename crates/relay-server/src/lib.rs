//! Carrier-facing WebSocket entry point: frame decoding, per-call session
//! lifecycle, and the HTTP health check, wired over [`relay_pipeline`]'s
//! orchestrator.

pub mod error;
pub mod frames;
pub mod http;
pub mod session;
pub mod state;
pub mod websocket;

pub use error::ServerError;
pub use http::create_router;
pub use session::Session;
pub use state::AppState;
