// Simulation runner: scenario → world, the seven-phase tick loop, and the
// headless driver surface (`new` / `step` / `current_state` / `stop`).

use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::agent::Agent;
use crate::config::{AgentSpec, ResourceSpec, Scenario, Spawn};
use crate::error::EngineError;
use crate::grid::Resource;
use crate::inventory::Inventory;
use crate::protocols::{
    BargainingProtocol, MatchingProtocol, ProtocolRegistry, SearchProtocol,
};
use crate::quote::Quote;
use crate::systems;
use crate::types::{AgentId, Mode, ModeSchedule, Position, Tick};
use crate::world::World;

/// One running simulation: exclusive owner of all state. Ticks are atomic
/// from the outside; inside a tick the seven phases run sequentially with
/// no suspension and no parallelism — determinism is the product.
pub struct Simulation {
    pub world: World,
    schedule: ModeSchedule,
    search: Box<dyn SearchProtocol>,
    matching: Box<dyn MatchingProtocol>,
    bargaining: Box<dyn BargainingProtocol>,
}

/// What `step` reports back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// The tick that just completed.
    pub tick: Tick,
    pub mode: Mode,
    pub trades: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: Position,
    pub inventory_a: Decimal,
    pub inventory_b: Decimal,
    pub utility: f64,
    pub bid: f64,
    pub ask: f64,
    pub paired_with: Option<AgentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceCellSnapshot {
    pub position: Position,
    pub kind: crate::types::Good,
    pub amount: Decimal,
    pub original_amount: Decimal,
    pub last_harvested_tick: Option<Tick>,
}

/// Serializable view of the world for the driver.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub tick: Tick,
    pub mode: Mode,
    pub agents: Vec<AgentSnapshot>,
    pub resources: Vec<ResourceCellSnapshot>,
}

/// Run totals returned by `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: Tick,
    pub trades: u64,
    pub pairings: u64,
    /// Units harvested across all agents over the whole run.
    pub harvested: Decimal,
}

impl Simulation {
    pub fn new(scenario: Scenario, seed: u64) -> Result<Self, EngineError> {
        Self::with_registry(scenario, seed, &ProtocolRegistry::with_defaults())
    }

    /// Build against a caller-extended registry (custom protocols are
    /// registered at engine startup).
    pub fn with_registry(
        scenario: Scenario,
        seed: u64,
        registry: &ProtocolRegistry,
    ) -> Result<Self, EngineError> {
        if scenario.agents.is_empty() {
            return Err(EngineError::EmptyScenario);
        }

        let search = registry.build_search(&scenario.protocols.search)?;
        let matching = registry.build_matching(&scenario.protocols.matching)?;
        let bargaining = registry.build_bargaining(&scenario.protocols.bargaining)?;

        let mut world = World::new(scenario.config, seed);
        for spec in &scenario.agents {
            spawn_agent(&mut world, spec)?;
        }
        for spec in &scenario.resources {
            spawn_resources(&mut world, spec);
        }
        world.mode = scenario.mode_schedule.mode_at(0);

        Ok(Self {
            world,
            schedule: scenario.mode_schedule,
            search,
            matching,
            bargaining,
        })
    }

    /// Execute one tick: the seven phases in fixed order, then the tick
    /// counter increments exactly once. Contract violations halt the tick
    /// and propagate.
    pub fn step(&mut self) -> Result<StepReport, EngineError> {
        let world = &mut self.world;
        world.mode = self.schedule.mode_at(world.tick);
        let trades_before = world.trade_count;

        systems::perception::run(world);
        systems::decision::run(world, self.search.as_ref(), self.matching.as_ref());
        systems::movement::run(world);
        if world.mode.trade_enabled() {
            systems::trade::run(world, self.bargaining.as_ref())?;
        }
        if world.mode.forage_enabled() {
            systems::forage::run(world);
        }
        systems::regen::run(world);
        systems::housekeeping::run(world);

        let report = StepReport {
            tick: world.tick,
            mode: world.mode,
            trades: world.trade_count - trades_before,
        };
        world.tick += 1;
        Ok(report)
    }

    /// Whether the configured max tick has been reached.
    pub fn is_complete(&self) -> bool {
        self.world
            .config
            .max_ticks
            .is_some_and(|max| self.world.tick >= max)
    }

    /// Step until `max_ticks`. Scenarios without a bound must be driven
    /// tick by tick instead.
    pub fn run_to_completion(&mut self) -> Result<(), EngineError> {
        while !self.is_complete() {
            self.step()?;
        }
        Ok(())
    }

    pub fn current_state(&self) -> WorldSnapshot {
        let world = &self.world;
        WorldSnapshot {
            tick: world.tick,
            mode: world.mode,
            agents: world
                .agents
                .iter()
                .map(|a| AgentSnapshot {
                    id: a.id,
                    position: a.position,
                    inventory_a: a.inventory.a,
                    inventory_b: a.inventory.b,
                    utility: a.current_utility(),
                    bid: a.quote.bid,
                    ask: a.quote.ask,
                    paired_with: a.paired_with,
                })
                .collect(),
            resources: world
                .grid
                .resource_positions()
                .into_iter()
                .map(|pos| {
                    let r = world.grid.resource(pos).expect("position enumerated");
                    ResourceCellSnapshot {
                        position: pos,
                        kind: r.kind,
                        amount: r.amount,
                        original_amount: r.original_amount,
                        last_harvested_tick: r.last_harvested_tick,
                    }
                })
                .collect(),
        }
    }

    pub fn stop(self) -> RunSummary {
        RunSummary {
            ticks: self.world.tick,
            trades: self.world.trade_count,
            pairings: self.world.pairing_count,
            harvested: self.world.agents.iter().map(|a| a.units_foraged).sum(),
        }
    }
}

// === SPAWNING ===

fn resolve_spawn(world: &mut World, spawn: Spawn) -> Position {
    match spawn {
        Spawn::At(pos) => pos,
        Spawn::Region(region) => {
            let x = world.rng.random_range(region.min.x..=region.max.x);
            let y = world.rng.random_range(region.min.y..=region.max.y);
            Position::new(x, y)
        }
    }
}

fn spawn_agent(world: &mut World, spec: &AgentSpec) -> Result<AgentId, EngineError> {
    let pos = resolve_spawn(world, spec.spawn);
    if !world.grid.in_bounds(pos) {
        return Err(EngineError::SpawnOutOfBounds {
            agent: world.agents.len() as AgentId,
            pos,
        });
    }

    let config = &world.config;
    let mut agent = Agent::new(
        0, // assigned by add_agent
        pos,
        Inventory::new(spec.endowment_a, spec.endowment_b),
        spec.utility,
    )
    .with_radii(
        spec.vision_radius.unwrap_or(config.vision_radius),
        spec.interaction_radius.unwrap_or(config.interaction_radius),
    )
    .with_move_budget(
        spec.move_budget_per_tick
            .unwrap_or(config.move_budget_per_tick),
    );
    agent.quote = Quote::compute(&agent.utility, &agent.inventory, config.spread);

    Ok(world.add_agent(agent))
}

/// Place `count` cells of a cluster. Region draws that land on an occupied
/// cell are redrawn a bounded number of times, all through the seeded RNG.
fn spawn_resources(world: &mut World, spec: &ResourceSpec) {
    let mut placed = 0;
    let mut attempts = 0u32;
    let max_attempts = spec.count.saturating_mul(32).max(32);

    while placed < spec.count && attempts < max_attempts {
        attempts += 1;
        let pos = resolve_spawn(world, spec.spawn);
        if !world.grid.in_bounds(pos) || world.grid.resource(pos).is_some() {
            continue;
        }
        world
            .grid
            .place_resource(pos, Resource::new(spec.kind, spec.original_amount));
        placed += 1;
    }
}
