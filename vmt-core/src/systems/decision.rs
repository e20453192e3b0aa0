// Phase 2 — Decision
//
// Three sub-phases:
//   A. stale-claim sweep over the claim map
//   B. per-agent search (skipped for paired and validly committed agents)
//   C. global matching over the collected preference lists
//
// Search and matching outputs are effects, validated here before
// application: invisible targets are ignored (idle this tick) and a Pair
// against an occupied endpoint is rejected.

use rust_decimal::Decimal;

use crate::effect::{Effect, Target, UnpairReason};
use crate::protocols::{MatchingProtocol, PreferenceMap, SearchProtocol};
use crate::types::{AgentId, Position};
use crate::view::{ProtocolContext, WorldView};
use crate::world::World;

pub fn run(world: &mut World, search: &dyn SearchProtocol, matching: &dyn MatchingProtocol) {
    sweep_stale_claims(world);
    let preferences = run_search(world, search);
    run_matching(world, matching, &preferences);
}

// === SUB-PHASE A: STALE-CLAIM SWEEP ===

/// Drop claims whose agent reached the cell, retargeted elsewhere, or
/// whose resource vanished. Claims backed by a live foraging commitment
/// persist across ticks.
fn sweep_stale_claims(world: &mut World) {
    let stale: Vec<Position> = world
        .claims
        .iter()
        .filter_map(|(&pos, &owner)| {
            let agent = world.agent(owner);
            let resource_alive = world
                .grid
                .resource(pos)
                .is_some_and(|r| r.amount > Decimal::ZERO);
            let still_committed = agent.forage_commitment.is_some_and(|c| c.pos == pos);
            let reached = agent.position == pos;
            (!resource_alive || reached || !still_committed).then_some(pos)
        })
        .collect();
    for pos in stale {
        world.claims.remove(&pos);
    }
}

// === SUB-PHASE B: SEARCH ===

fn run_search(world: &mut World, search: &dyn SearchProtocol) -> PreferenceMap {
    let mut preferences = PreferenceMap::new();

    for id in 0..world.agents.len() as AgentId {
        // Paired agents steer at their partner and skip search, repairing
        // a broken (one-sided) pairing on sight.
        if let Some(partner) = world.agent(id).paired_with {
            if world.agent(partner).paired_with == Some(id) {
                let partner_pos = world.agent(partner).position;
                let me = world.agent_mut(id);
                me.target_agent = Some(partner);
                me.target_pos = Some(partner_pos);
                continue;
            }
            world.apply_unpair(id, partner, UnpairReason::AsymmetryRepair);
        }

        // A live foraging commitment is reused without searching; a dead
        // one (resource harvested away or regrown elsewhere) is cleared.
        if let Some(commitment) = world.agent(id).forage_commitment {
            let alive = world
                .grid
                .resource(commitment.pos)
                .is_some_and(|r| r.amount > Decimal::ZERO);
            if alive {
                let me = world.agent_mut(id);
                me.target_pos = Some(commitment.pos);
                me.target_agent = None;
                continue;
            }
            world.agent_mut(id).forage_commitment = None;
        }

        let (prefs, effects) = {
            let agent = &world.agents[id as usize];
            let view = WorldView {
                agent_id: id,
                position: agent.position,
                inventory: agent.inventory,
                utility: &agent.utility,
                quote: agent.quote,
                perception: &agent.perception,
                cooldowns: &agent.trade_cooldowns,
                tick: world.tick,
                mode: world.mode,
                config: &world.config,
            };
            let prefs = search.build_preferences(&view, &mut world.rng);
            let effects = search.select_target(&view, &mut world.rng);
            (prefs, effects)
        };

        #[cfg(feature = "instrument")]
        if world.config.log_preferences {
            for (rank, pref) in prefs.iter().enumerate() {
                let target = match pref.target {
                    Target::Agent(other) => format!("agent:{other}"),
                    Target::Cell(pos) => format!("cell:{},{}", pos.x, pos.y),
                };
                tracing::info!(
                    target: "preference",
                    tick = world.tick,
                    agent_id = id,
                    rank = rank as u64,
                    target = target.as_str(),
                    score = pref.score,
                );
            }
        }

        preferences.insert(id, prefs);
        apply_search_effects(world, id, effects);
    }

    preferences
}

fn apply_search_effects(world: &mut World, id: AgentId, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::SetTarget { agent, target } if agent == id => {
                if target_visible(world, id, target) {
                    world.apply_set_target(id, target);
                }
                // An invisible target is a perception miss: ignore it and
                // idle this tick. Not an error.
            }
            Effect::ClaimResource { agent, pos } if agent == id => {
                world.apply_claim(agent, pos);
            }
            Effect::ReleaseClaim { pos } => world.apply_release(pos),
            Effect::InternalStateUpdate {
                protocol,
                agent,
                key,
                value,
            } => world.apply_internal_state(protocol, agent, key, value),
            // Search protocols cannot pair, trade, or move; anything else
            // is dropped on the floor.
            _ => {}
        }
    }
}

fn target_visible(world: &World, id: AgentId, target: Target) -> bool {
    let agent = world.agent(id);
    match target {
        Target::Agent(other) => agent.perception.neighbors.iter().any(|n| n.id == other),
        Target::Cell(pos) => {
            world.grid.in_bounds(pos) && agent.position.distance(pos) <= agent.vision_radius
        }
    }
}

// === SUB-PHASE C: MATCHING ===

fn run_matching(world: &mut World, matching: &dyn MatchingProtocol, preferences: &PreferenceMap) {
    let effects = {
        let ctx = ProtocolContext::from_agents(&world.agents, world.tick, world.mode, &world.config);
        matching.form_pairs(&ctx, preferences, &mut world.rng)
    };

    for effect in effects {
        match effect {
            // apply_pair rejects a second Pair against an occupied agent.
            Effect::Pair { a, b } => {
                world.apply_pair(a, b);
            }
            Effect::Unpair { a, b, reason } => world.apply_unpair(a, b, reason),
            Effect::InternalStateUpdate {
                protocol,
                agent,
                key,
                value,
            } => world.apply_internal_state(protocol, agent, key, value),
            _ => {}
        }
    }
}
