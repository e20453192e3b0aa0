// Agents and their per-tick perception snapshots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::quote::Quote;
use crate::types::{AgentId, Position, Tick};
use crate::utility::Utility;

/// Frozen view of one visible neighbor, captured in Phase 1. Neighbor
/// quotes may be one tick stale; that information delay is intentional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborSnapshot {
    pub id: AgentId,
    pub position: Position,
    pub quote: Quote,
    pub paired_with: Option<AgentId>,
}

/// Frozen view of one visible resource cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub pos: Position,
    pub kind: crate::types::Good,
    pub amount: rust_decimal::Decimal,
    pub claimed_by: Option<AgentId>,
}

/// The agent-local world snapshot built by Phase 1 and consumed by every
/// later decision this tick. Nothing outside this cache is read by search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionView {
    pub neighbors: Vec<NeighborSnapshot>,
    pub resources: Vec<ResourceSnapshot>,
}

/// A foraging commitment: the agent keeps walking to `pos` across ticks as
/// long as the resource survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForageCommitment {
    pub pos: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    pub inventory: Inventory,
    pub utility: Utility,
    pub quote: Quote,

    pub vision_radius: u32,
    pub interaction_radius: u32,
    pub move_budget_per_tick: u32,

    pub paired_with: Option<AgentId>,
    /// Tick the current pairing formed; drives negotiation timeout.
    pub paired_at_tick: Option<Tick>,
    pub target_pos: Option<Position>,
    pub target_agent: Option<AgentId>,
    pub forage_commitment: Option<ForageCommitment>,

    /// Partner id → first tick at which re-pairing is allowed again.
    pub trade_cooldowns: BTreeMap<AgentId, Tick>,

    /// Set by trade and forage; Phase 7 refreshes quotes and clears it.
    pub inventory_changed: bool,

    #[serde(skip)]
    pub perception: PerceptionView,

    pub trades_completed: u64,
    pub units_foraged: rust_decimal::Decimal,
}

impl Agent {
    pub fn new(id: AgentId, position: Position, inventory: Inventory, utility: Utility) -> Self {
        Self {
            id,
            position,
            inventory,
            utility,
            quote: Quote::default(),
            vision_radius: 8,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            paired_with: None,
            paired_at_tick: None,
            target_pos: None,
            target_agent: None,
            forage_commitment: None,
            trade_cooldowns: BTreeMap::new(),
            inventory_changed: false,
            perception: PerceptionView::default(),
            trades_completed: 0,
            units_foraged: rust_decimal::Decimal::ZERO,
        }
    }

    pub fn with_radii(mut self, vision: u32, interaction: u32) -> Self {
        self.vision_radius = vision;
        self.interaction_radius = interaction;
        self
    }

    pub fn with_move_budget(mut self, budget: u32) -> Self {
        self.move_budget_per_tick = budget;
        self
    }

    pub fn is_paired(&self) -> bool {
        self.paired_with.is_some()
    }

    /// Whether trading with `other` is blocked by a cooldown at `tick`.
    pub fn in_cooldown_with(&self, other: AgentId, tick: Tick) -> bool {
        self.trade_cooldowns
            .get(&other)
            .is_some_and(|&until| tick < until)
    }

    /// Current utility of the agent's own holdings.
    pub fn current_utility(&self) -> f64 {
        let (a, b) = self.inventory.as_f64();
        self.utility.value(a, b)
    }

    pub fn clear_targets(&mut self) {
        self.target_pos = None;
        self.target_agent = None;
    }
}
