// Phase 4 — Trade
//
// Each pair within interaction range gets one bargaining call per tick.
// Agents are passed to the protocol as read-only references to their full
// state; the returned effects are the only way inventories change here.
// Pairs survive successful trades so further mutually beneficial trades
// can follow on later ticks.

use std::collections::BTreeSet;

use crate::error::EngineError;
use crate::effect::Effect;
use crate::protocols::BargainingProtocol;
use crate::types::AgentId;
use crate::world::World;

pub fn run(world: &mut World, bargaining: &dyn BargainingProtocol) -> Result<(), EngineError> {
    let mut processed: BTreeSet<(AgentId, AgentId)> = BTreeSet::new();

    for id in 0..world.agents.len() as AgentId {
        let Some(partner) = world.agent(id).paired_with else {
            continue;
        };
        let pair = (id.min(partner), id.max(partner));
        if !processed.insert(pair) {
            continue;
        }
        negotiate_pair(world, bargaining, pair)?;
    }
    Ok(())
}

fn negotiate_pair(
    world: &mut World,
    bargaining: &dyn BargainingProtocol,
    pair: (AgentId, AgentId),
) -> Result<(), EngineError> {
    let (a, b) = pair;
    let reach = world
        .agent(a)
        .interaction_radius
        .min(world.agent(b).interaction_radius);
    let distance = world.agent(a).position.distance(world.agent(b).position);
    if distance > reach {
        return Ok(()); // out of range: stay paired, keep closing in
    }

    // Bargaining must not mutate agents in place; in debug builds the
    // inventories and quotes are snapshotted around the call.
    #[cfg(debug_assertions)]
    let guard = world.config.debug_immutability.then(|| {
        (
            world.agent(a).inventory,
            world.agent(b).inventory,
            world.agent(a).quote,
            world.agent(b).quote,
        )
    });

    let effects = {
        let agent_a = &world.agents[a as usize];
        let agent_b = &world.agents[b as usize];
        bargaining.negotiate(
            pair,
            (agent_a, agent_b),
            &world.config,
            &world.protocol_state,
            &mut world.rng,
        )
    };

    #[cfg(debug_assertions)]
    if let Some(snapshot) = guard {
        let now = (
            world.agent(a).inventory,
            world.agent(b).inventory,
            world.agent(a).quote,
            world.agent(b).quote,
        );
        debug_assert_eq!(
            snapshot,
            now,
            "bargaining protocol '{}' mutated agent state in place",
            bargaining.name()
        );
    }

    if effects.is_empty() {
        // Still negotiating (multi-tick protocol). After the timeout
        // window, hand the pair to the protocol's on_timeout.
        let since = world.agent(a).paired_at_tick.unwrap_or(world.tick);
        let elapsed = world.tick.saturating_sub(since) + 1;
        if elapsed >= world.config.negotiation_timeout_ticks {
            let timeout_effects = {
                let agent_a = &world.agents[a as usize];
                let agent_b = &world.agents[b as usize];
                bargaining.on_timeout(pair, (agent_a, agent_b))
            };
            apply_effects(world, timeout_effects, bargaining.name())?;
        }
        return Ok(());
    }

    apply_effects(world, effects, bargaining.name())
}

fn apply_effects(
    world: &mut World,
    effects: Vec<Effect>,
    protocol: &str,
) -> Result<(), EngineError> {
    for effect in effects {
        match effect {
            Effect::Trade {
                buyer,
                seller,
                da,
                db,
                price,
                meta,
            } => {
                world.apply_trade(buyer, seller, da, db, price, &meta, protocol)?;
                // Pair persists: the agents may find another block next tick.
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
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::{ProtocolSpec, SimConfig};
    use crate::inventory::Inventory;
    use crate::protocols::ProtocolRegistry;
    use crate::quote::Quote;
    use crate::types::{Good, Position};
    use crate::utility::Utility;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quoted(mut agent: Agent, spread: f64) -> Agent {
        agent.quote = Quote::compute(&agent.utility, &agent.inventory, spread);
        agent
    }

    fn paired_world(first: (Decimal, Decimal), second: (Decimal, Decimal), gap: i32) -> World {
        let mut world = World::new(SimConfig::default(), 0);
        world.add_agent(quoted(
            Agent::new(
                0,
                Position::new(0, 0),
                Inventory::new(first.0, first.1),
                Utility::CobbDouglas { alpha: 0.5 },
            ),
            0.05,
        ));
        world.add_agent(quoted(
            Agent::new(
                0,
                Position::new(gap, 0),
                Inventory::new(second.0, second.1),
                Utility::CobbDouglas { alpha: 0.5 },
            ),
            0.05,
        ));
        world.apply_pair(0, 1);
        world
    }

    fn default_bargaining() -> Box<dyn BargainingProtocol> {
        ProtocolRegistry::with_defaults()
            .build_bargaining(&ProtocolSpec::named("compensating_block"))
            .unwrap()
    }

    #[test]
    fn in_range_pair_trades_and_stays_paired() {
        let mut world = paired_world((dec!(10), dec!(0)), (dec!(0), dec!(10)), 1);
        let bargaining = default_bargaining();

        run(&mut world, bargaining.as_ref()).unwrap();

        assert_eq!(world.trade_count, 1);
        assert_eq!(world.agent(0).paired_with, Some(1));
        assert_eq!(world.agent(1).paired_with, Some(0));
        // Conservation across the swap.
        assert_eq!(world.total_good(Good::A), dec!(10));
        assert_eq!(world.total_good(Good::B), dec!(10));
        assert!(world.agent(0).inventory_changed);
    }

    #[test]
    fn out_of_range_pair_is_untouched() {
        let mut world = paired_world((dec!(10), dec!(0)), (dec!(0), dec!(10)), 5);
        let bargaining = default_bargaining();

        run(&mut world, bargaining.as_ref()).unwrap();

        assert_eq!(world.trade_count, 0);
        assert_eq!(world.agent(0).paired_with, Some(1));
    }

    #[test]
    fn failed_negotiation_unpairs_with_cooldown() {
        let mut world = paired_world((dec!(5), dec!(5)), (dec!(5), dec!(5)), 1);
        let bargaining = default_bargaining();

        run(&mut world, bargaining.as_ref()).unwrap();

        assert!(world.agent(0).paired_with.is_none());
        assert!(world.agent(1).paired_with.is_none());
        let until = world.tick + world.config.trade_cooldown_ticks;
        assert_eq!(world.agent(0).trade_cooldowns.get(&1), Some(&until));
    }

    #[test]
    fn silent_protocol_times_out_after_window() {
        struct Silent;
        impl BargainingProtocol for Silent {
            fn name(&self) -> &'static str {
                "silent"
            }
            fn negotiate(
                &self,
                _pair: (AgentId, AgentId),
                _agents: (&Agent, &Agent),
                _config: &SimConfig,
                _state: &crate::world::ProtocolState,
                _rng: &mut crate::view::SimRng,
            ) -> Vec<Effect> {
                Vec::new()
            }
        }

        let mut world = paired_world((dec!(10), dec!(0)), (dec!(0), dec!(10)), 1);
        // Pair formed at tick 0; timeout window is 5 ticks.
        for tick in 0..5 {
            world.tick = tick;
            run(&mut world, &Silent).unwrap();
            if tick < 4 {
                assert_eq!(world.agent(0).paired_with, Some(1), "tick {tick}");
            }
        }
        assert!(world.agent(0).paired_with.is_none());
        // Timeout dissolves without the trade_failed cooldown.
        assert!(world.agent(0).trade_cooldowns.is_empty());
    }
}
