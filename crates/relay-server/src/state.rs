//! Shared, cheaply-cloneable application state handed to every axum
//! handler via `with_state`.

use relay_config::{AgentConfigClient, CallLogClient};
use relay_core::CostRates;
use relay_pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub agent_client: AgentConfigClient,
    pub call_log_client: CallLogClient,
    pub orchestrator: Orchestrator,
    pub cost_rates: CostRates,
}
