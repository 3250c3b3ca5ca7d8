//! Configuration loading and the two outbound config-service HTTP clients
//! (agent config fetch, call-log submission).

pub mod agent_client;
pub mod call_log;
pub mod error;
pub mod settings;

pub use agent_client::AgentConfigClient;
pub use call_log::CallLogClient;
pub use error::ConfigError;
pub use settings::{Secrets, Settings};
