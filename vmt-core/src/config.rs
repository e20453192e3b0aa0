// Scenario ingress: global parameters, agent and resource specs,
// protocol selectors. The YAML loader is an external collaborator; it
// produces these structs, and everything here deserializes with serde.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Good, ModeSchedule, Position, Tick};
use crate::utility::Utility;

/// Global engine parameters, scenario-overridable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: u32,
    pub height: u32,
    pub max_ticks: Option<Tick>,

    /// Distance discount base in `(0, 1]` for search and matching scores.
    pub beta: f64,
    /// Units harvested per tick from a cell the agent stands on.
    pub forage_rate: Decimal,
    pub vision_radius: u32,
    pub interaction_radius: u32,
    pub move_budget_per_tick: u32,

    /// Symmetric quote spread around MRS.
    pub spread: f64,
    /// Minimum per-side utility gain for a trade to clear.
    pub epsilon: f64,

    pub trade_cooldown_ticks: Tick,
    pub negotiation_timeout_ticks: Tick,

    pub resource_regen_cooldown: Tick,
    /// Units regrown per eligible tick; zero disables regeneration.
    pub resource_growth_rate: Decimal,

    pub enforce_single_harvester: bool,
    pub enable_resource_claiming: bool,

    pub log_preferences: bool,
    /// Debug-build inventory snapshots around every bargaining call.
    pub debug_immutability: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            max_ticks: None,
            beta: 0.95,
            forage_rate: Decimal::ONE,
            vision_radius: 8,
            interaction_radius: 1,
            move_budget_per_tick: 1,
            spread: 0.05,
            epsilon: 1e-6,
            trade_cooldown_ticks: 10,
            negotiation_timeout_ticks: 5,
            resource_regen_cooldown: 5,
            resource_growth_rate: Decimal::ONE,
            enforce_single_harvester: true,
            enable_resource_claiming: false,
            log_preferences: false,
            debug_immutability: true,
        }
    }
}

/// Inclusive rectangle agents or resources may spawn in. Regions are
/// resolved at init with the simulation RNG, so spawning is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRegion {
    pub min: Position,
    pub max: Position,
}

/// Where a spec lands on the grid: a fixed cell or a seeded region draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spawn {
    At(Position),
    Region(SpawnRegion),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub utility: Utility,
    pub endowment_a: Decimal,
    pub endowment_b: Decimal,
    pub spawn: Spawn,
    /// Per-agent overrides; global config applies when absent.
    #[serde(default)]
    pub vision_radius: Option<u32>,
    #[serde(default)]
    pub interaction_radius: Option<u32>,
    #[serde(default)]
    pub move_budget_per_tick: Option<u32>,
}

/// A cluster of identical resource cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: Good,
    pub original_amount: Decimal,
    pub count: u32,
    pub spawn: Spawn,
}

/// Protocol selector: a registry name plus an opaque params table the
/// registry passes through to the implementation's constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSpec {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ProtocolSpec {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSelection {
    pub search: ProtocolSpec,
    pub matching: ProtocolSpec,
    pub bargaining: ProtocolSpec,
}

impl Default for ProtocolSelection {
    fn default() -> Self {
        Self {
            search: ProtocolSpec::named("distance_discounted_search"),
            matching: ProtocolSpec::named("three_pass_matching"),
            bargaining: ProtocolSpec::named("compensating_block"),
        }
    }
}

/// Complete scenario: the engine's entire ingress surface. The seed is
/// provided separately to `Simulation::new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: SimConfig,
    #[serde(default)]
    pub mode_schedule: ModeSchedule,
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub protocols: ProtocolSelection,
}
