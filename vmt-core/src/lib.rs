//! Deterministic spatial barter simulation engine
//!
//! This crate implements an agent-based simulation of a bilateral barter
//! economy on a finite grid. Agents hold exact-decimal inventories of two
//! goods, perceive their local neighborhood, pair up, negotiate discrete
//! trades, and forage regenerating resources. The engine's scientific
//! value rests on bit-exact reproducibility under a seed and a strict
//! Protocol → Effect → State discipline.
//!
//! ## The tick loop
//!
//! Every tick runs seven phase systems in fixed order over the shared
//! world state:
//!
//! 1. **Perception** — freeze each agent's local view (neighbors, quotes,
//!    resource cells) from the spatial index
//! 2. **Decision** — sweep stale resource claims, run the search protocol
//!    per agent, run the matching protocol globally
//! 3. **Movement** — deterministic Manhattan pathing toward targets
//! 4. **Trade** — bargaining protocol per in-range pair
//! 5. **Forage** — unpaired agents harvest the cell they stand on
//! 6. **Regeneration** — replenish harvested cells from the active set
//! 7. **Housekeeping** — refresh quotes, verify pairing integrity, emit
//!    telemetry snapshots
//!
//! Agents and pairs are iterated in ascending id order inside every
//! phase, spatial queries return sorted ids, and all randomness flows
//! through one seeded generator — two runs with the same scenario and
//! seed produce identical telemetry streams.
//!
//! ## Protocols
//!
//! Search, matching, and bargaining are pluggable strategies resolved by
//! name from a registry. Protocols read immutable views (`WorldView` per
//! agent, `ProtocolContext` per simulation) and return [`effect::Effect`]
//! values that the host phase validates and applies. Matching relies on
//! the fast quote-overlap evaluator and never calls the utility-scanning
//! trade discoverer; bargaining owns discovery. The two sides can be
//! swapped independently.
//!
//! ## Module structure
//!
//! - `types`       Ids, goods, positions, modes
//! - `inventory`   Exact-decimal two-good inventories
//! - `utility`     Utility function variants and MRS
//! - `quote`       Published bid/ask for A priced in B
//! - `agent`       Agent state and perception snapshots
//! - `grid`        Cells, resources, harvested-cell active set
//! - `spatial`     Bucket-hash index with sorted radius queries
//! - `effect`      The closed effect sum type
//! - `trade_eval`  Quote-overlap evaluator and trade discoverer
//! - `protocols`   Strategy traits, registry, default implementations
//! - `systems`     The seven phase systems
//! - `world`       Canonical mutable state and effect application
//! - `config`      Scenario ingress structs
//! - `sim`         Tick orchestration and the driver surface

pub mod agent;
pub mod config;
pub mod effect;
pub mod error;
pub mod grid;
#[cfg(feature = "instrument")]
pub use instrument;
pub mod inventory;
pub mod protocols;
pub mod quote;
pub mod sim;
pub mod spatial;
pub mod systems;
pub mod trade_eval;
pub mod types;
pub mod utility;
pub mod view;
pub mod world;

// Re-export commonly used types at the crate root

// Core types
pub use types::{AgentId, Good, Mode, ModeInterval, ModeSchedule, Position, Price, Tick};

// State
pub use agent::{Agent, ForageCommitment, NeighborSnapshot, PerceptionView, ResourceSnapshot};
pub use grid::{Cell, Grid, Resource};
pub use inventory::{Inventory, QUANTITY_SCALE, round_to_quantity};
pub use spatial::SpatialIndex;
pub use world::{ProtocolState, World};

// Economics
pub use quote::Quote;
pub use trade_eval::{
    DiscoveredTrade, Direction, TradePotential, discover_all_feasible, discover_first_feasible,
    evaluate_potential, price_candidates,
};
pub use utility::Utility;

// Effects & errors
pub use effect::{Effect, Target, TradeMeta, UnpairReason};
pub use error::EngineError;

// Protocols
pub use protocols::{
    BargainingProtocol, MatchingProtocol, Preference, PreferenceMap, ProtocolRegistry,
    SearchProtocol,
};
pub use view::{AgentContext, ProtocolContext, SimRng, WorldView};

// Scenario & runner
pub use config::{
    AgentSpec, ProtocolSelection, ProtocolSpec, ResourceSpec, Scenario, SimConfig, Spawn,
    SpawnRegion,
};
pub use sim::{
    AgentSnapshot, ResourceCellSnapshot, RunSummary, Simulation, StepReport, WorldSnapshot,
};
