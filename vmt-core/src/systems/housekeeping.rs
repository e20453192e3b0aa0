// Phase 7 — Housekeeping
//
// Refresh quotes for agents whose inventory changed (the only place
// quotes are ever rewritten), verify and repair pairing integrity, and
// emit the tick's telemetry snapshots. Running this phase twice with no
// intervening work is a fixpoint.

use crate::effect::UnpairReason;
use crate::quote::Quote;
use crate::types::AgentId;
use crate::world::World;

pub fn run(world: &mut World) {
    refresh_quotes(world);
    verify_pairings(world);
    emit_snapshots(world);
}

fn refresh_quotes(world: &mut World) {
    let spread = world.config.spread;
    for agent in &mut world.agents {
        if agent.inventory_changed {
            agent.quote = Quote::compute(&agent.utility, &agent.inventory, spread);
            agent.inventory_changed = false;
        }
    }
}

/// Pair symmetry is a hard invariant at phase boundaries. An asymmetry
/// here means an upstream bug; it is repaired by unpairing and logged as
/// a diagnostic unpair event.
fn verify_pairings(world: &mut World) {
    for id in 0..world.agents.len() as AgentId {
        if let Some(partner) = world.agent(id).paired_with
            && world.agent(partner).paired_with != Some(id)
        {
            world.apply_unpair(id, partner, UnpairReason::AsymmetryRepair);
        }
    }
}

#[cfg(feature = "instrument")]
fn emit_snapshots(world: &World) {
    use rust_decimal::prelude::ToPrimitive;

    tracing::info!(
        target: "tick_states",
        tick = world.tick,
        current_mode = world.mode.label(),
    );

    for agent in &world.agents {
        let (inv_a, inv_b) = agent.inventory.as_f64();
        let (target_x, target_y) = match agent.target_pos {
            Some(pos) => (i64::from(pos.x), i64::from(pos.y)),
            None => (-1, -1),
        };
        let target_agent = agent.target_agent.map_or(-1i64, i64::from);
        tracing::info!(
            target: "agent_state",
            tick = world.tick,
            agent_id = agent.id,
            x = agent.position.x,
            y = agent.position.y,
            inventory_a = inv_a,
            inventory_b = inv_b,
            utility = agent.current_utility(),
            bid = agent.quote.bid,
            ask = agent.quote.ask,
            target_x = target_x,
            target_y = target_y,
            target_agent = target_agent,
            utility_type = agent.utility.label(),
        );
    }

    for pos in world.grid.resource_positions() {
        let resource = world.grid.resource(pos).expect("position enumerated");
        tracing::info!(
            target: "resource_state",
            tick = world.tick,
            x = pos.x,
            y = pos.y,
            kind = resource.kind.label(),
            amount = resource.amount.to_f64().unwrap_or(0.0),
            original_amount = resource.original_amount.to_f64().unwrap_or(0.0),
            last_harvested_tick = resource
                .last_harvested_tick
                .map_or(-1i64, |t| t as i64),
        );
    }
}

#[cfg(not(feature = "instrument"))]
fn emit_snapshots(_world: &World) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::SimConfig;
    use crate::inventory::Inventory;
    use crate::types::Position;
    use crate::utility::Utility;
    use rust_decimal_macros::dec;

    fn two_agent_world() -> World {
        let mut world = World::new(SimConfig::default(), 0);
        for _ in 0..2 {
            world.add_agent(Agent::new(
                0,
                Position::new(0, 0),
                Inventory::new(dec!(5), dec!(5)),
                Utility::CobbDouglas { alpha: 0.5 },
            ));
        }
        world
    }

    #[test]
    fn quotes_refresh_only_on_inventory_change() {
        let mut world = two_agent_world();
        let stale = world.agent(0).quote;

        world.agent_mut(0).inventory = Inventory::new(dec!(1), dec!(9));
        world.agent_mut(0).inventory_changed = true;

        run(&mut world);

        assert_ne!(world.agent(0).quote, stale);
        assert!(!world.agent(0).inventory_changed);
        // Untouched agent's quote stays byte-identical.
        assert_eq!(world.agent(1).quote, stale);
    }

    #[test]
    fn asymmetric_pairing_is_dissolved() {
        let mut world = two_agent_world();
        world.agent_mut(0).paired_with = Some(1);

        run(&mut world);

        assert!(world.agent(0).paired_with.is_none());
        assert!(world.pairing_is_symmetric(0));
    }

    #[test]
    fn phase_is_a_fixpoint() {
        let mut world = two_agent_world();
        world.agent_mut(0).inventory_changed = true;
        run(&mut world);

        let quotes: Vec<_> = world.agents.iter().map(|a| a.quote).collect();
        let pairings: Vec<_> = world.agents.iter().map(|a| a.paired_with).collect();
        run(&mut world);

        assert_eq!(
            quotes,
            world.agents.iter().map(|a| a.quote).collect::<Vec<_>>()
        );
        assert_eq!(
            pairings,
            world
                .agents
                .iter()
                .map(|a| a.paired_with)
                .collect::<Vec<_>>()
        );
    }
}
