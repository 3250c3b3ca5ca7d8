//! Core types shared across the voice-agent relay.
//!
//! This crate has no async runtime dependency and no I/O: it holds the
//! per-call data model (conversation messages, turns, usage counters).
//! Each other crate defines its own `thiserror` error enum for its own
//! fallible surface; there is no shared error type here to convert into.

pub mod agent_config;
pub mod report;
pub mod turn;
pub mod usage;

pub use agent_config::{
    AgentConfig, VadTuning, BARGE_IN_THRESHOLD_DB, MIN_TURN_DURATION_MS,
};
pub use report::{CallReport, UsageReport};
pub use turn::{ConversationMessage, Provider, Role, Turn};
pub use usage::{CallStatus, CostRates, LatencyStats, UsageCounters};
