// === EFFECTS ===
//
// Every state change that crosses a protocol boundary is a declarative
// record in this closed sum type. Host systems validate and apply effects
// with exhaustive matches; protocols never mutate the world directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, Position, Tick};

/// Something an agent can steer toward: a trade partner or a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Agent(AgentId),
    Cell(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnpairReason {
    TradeFailed,
    Timeout,
    AsymmetryRepair,
}

impl UnpairReason {
    pub fn label(self) -> &'static str {
        match self {
            UnpairReason::TradeFailed => "trade_failed",
            UnpairReason::Timeout => "timeout",
            UnpairReason::AsymmetryRepair => "asymmetry_repair",
        }
    }
}

/// Per-trade accounting attached to a Trade effect and echoed to telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeMeta {
    pub buyer_surplus: f64,
    pub seller_surplus: f64,
    pub pair_name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Effect {
    /// Steer Phase 3 movement for `agent`.
    SetTarget { agent: AgentId, target: Target },

    /// Record `agent` as the single claimant of the resource at `pos`.
    ClaimResource { agent: AgentId, pos: Position },

    ReleaseClaim { pos: Position },

    /// Form a bilateral pairing. Rejected if either endpoint is paired.
    Pair { a: AgentId, b: AgentId },

    /// Dissolve a pairing. `TradeFailed` additionally starts cooldowns.
    Unpair {
        a: AgentId,
        b: AgentId,
        reason: UnpairReason,
    },

    /// Atomic inventory swap: `buyer` receives `da` of A and pays `db` of
    /// B. Validated against both inventories; failure is a contract
    /// violation that fails the whole tick.
    Trade {
        buyer: AgentId,
        seller: AgentId,
        da: Decimal,
        db: Decimal,
        price: f64,
        meta: TradeMeta,
    },

    /// Reserved: movement currently mutates directly in Phase 3.
    Move { agent: AgentId, dx: i32, dy: i32 },

    /// Reserved: foraging currently mutates directly in Phase 5.
    Harvest {
        agent: AgentId,
        pos: Position,
        amount: Decimal,
    },

    /// Reserved: quote refresh runs in Phase 7 off `inventory_changed`.
    RefreshQuotes { agent: AgentId },

    /// Reserved: cooldowns are set by Unpair application.
    SetCooldown {
        a: AgentId,
        b: AgentId,
        until: Tick,
    },

    /// Scratch storage for multi-tick protocols, keyed per protocol and
    /// agent on the world.
    InternalStateUpdate {
        protocol: String,
        agent: AgentId,
        key: String,
        value: serde_json::Value,
    },
}
