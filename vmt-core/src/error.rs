// Engine errors. Contract violations are bugs, not runtime conditions:
// they halt the tick and surface to the driver. Everything recoverable
// (failed negotiation, stale perception, vanished resources) is absorbed
// inside the phase that observed it and never becomes an error.

use crate::types::{AgentId, Position, Tick};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "contract_violation: trade at tick {tick} between buyer {buyer} and seller {seller} \
         cannot be sustained by inventories (protocol {protocol})"
    )]
    TradeInsufficientInventory {
        tick: Tick,
        buyer: AgentId,
        seller: AgentId,
        protocol: String,
    },

    #[error("contract_violation: unknown {category} protocol '{name}'")]
    UnknownProtocol { category: &'static str, name: String },

    #[error("contract_violation: invalid params for {category} protocol '{name}': {message}")]
    InvalidProtocolParams {
        category: &'static str,
        name: String,
        message: String,
    },

    #[error("contract_violation: agent {agent} spawned out of bounds at {pos:?}")]
    SpawnOutOfBounds { agent: AgentId, pos: Position },

    #[error("contract_violation: scenario has no agents")]
    EmptyScenario,
}
