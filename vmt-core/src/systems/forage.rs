// Phase 5 — Forage
//
// Unpaired agents harvest the cell they stand on. Productive foraging
// clears the agent's commitment and all trade cooldowns (a good harvest
// resets frustration). With `enforce_single_harvester`, the first agent
// in id order takes the cell for the tick.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::types::{AgentId, Position};
use crate::world::World;

pub fn run(world: &mut World) {
    let mut taken_this_tick: BTreeSet<Position> = BTreeSet::new();

    for id in 0..world.agents.len() as AgentId {
        if world.agent(id).is_paired() {
            continue;
        }
        let pos = world.agent(id).position;
        let Some(resource) = world.grid.resource(pos) else {
            continue;
        };
        if resource.amount <= Decimal::ZERO {
            continue;
        }
        if world.config.enforce_single_harvester && !taken_this_tick.insert(pos) {
            continue;
        }

        let take = world.config.forage_rate.min(resource.amount);
        if take <= Decimal::ZERO {
            continue;
        }
        let kind = resource.kind;
        let tick = world.tick;

        {
            let resource = world.grid.resource_mut(pos).expect("resource checked above");
            resource.amount -= take;
            resource.last_harvested_tick = Some(tick);
        }
        world.grid.mark_harvested(pos);

        let agent = world.agent_mut(id);
        agent.inventory.add(kind, take);
        agent.inventory_changed = true;
        agent.units_foraged += take;
        agent.forage_commitment = None;
        agent.trade_cooldowns.clear();
        if agent.target_pos == Some(pos) {
            agent.clear_targets();
        }

        if world.claims.get(&pos) == Some(&id) {
            world.apply_release(pos);
        }
    }
}
