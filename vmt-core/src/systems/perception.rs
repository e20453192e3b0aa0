// Phase 1 — Perception
//
// Build each agent's frozen local view from the spatial index. The
// snapshot is the single source of truth for this tick's decisions; a
// neighbor's quote may be one tick stale, which is an intentional
// information delay. Nothing outside the perception caches is mutated.

use rust_decimal::Decimal;

use crate::agent::{Agent, NeighborSnapshot, PerceptionView, ResourceSnapshot};
use crate::types::Position;
use crate::world::World;

pub fn run(world: &mut World) {
    let mut views: Vec<PerceptionView> = Vec::with_capacity(world.agents.len());

    for agent in &world.agents {
        let neighbor_ids =
            world
                .spatial
                .query_radius(agent.position, agent.vision_radius, Some(agent.id));
        let neighbors = neighbor_ids
            .iter()
            .map(|&id| {
                let other = &world.agents[id as usize];
                NeighborSnapshot {
                    id,
                    position: other.position,
                    quote: other.quote,
                    paired_with: other.paired_with,
                }
            })
            .collect();

        views.push(PerceptionView {
            neighbors,
            resources: visible_resources(world, agent),
        });
    }

    for (agent, view) in world.agents.iter_mut().zip(views) {
        agent.perception = view;
    }
}

/// Nonzero resource cells inside the agent's vision diamond, scanned in
/// row-major order so the snapshot is deterministic.
fn visible_resources(world: &World, agent: &Agent) -> Vec<ResourceSnapshot> {
    let r = agent.vision_radius as i32;
    let mut resources = Vec::new();
    for dy in -r..=r {
        let span = r - dy.abs();
        for dx in -span..=span {
            let pos = Position::new(agent.position.x + dx, agent.position.y + dy);
            if let Some(resource) = world.grid.resource(pos)
                && resource.amount > Decimal::ZERO
            {
                resources.push(ResourceSnapshot {
                    pos,
                    kind: resource.kind,
                    amount: resource.amount,
                    claimed_by: world.claims.get(&pos).copied(),
                });
            }
        }
    }
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::Resource;
    use crate::inventory::Inventory;
    use crate::types::Good;
    use crate::utility::Utility;
    use rust_decimal_macros::dec;

    fn test_world() -> World {
        let mut world = World::new(SimConfig::default(), 0);
        for x in [0, 2, 15] {
            world.add_agent(Agent::new(
                0,
                Position::new(x, 0),
                Inventory::new(dec!(5), dec!(5)),
                Utility::CobbDouglas { alpha: 0.5 },
            ));
        }
        world
    }

    #[test]
    fn snapshot_covers_vision_radius_only() {
        let mut world = test_world();
        world
            .grid
            .place_resource(Position::new(1, 1), Resource::new(Good::A, dec!(4)));
        world
            .grid
            .place_resource(Position::new(19, 19), Resource::new(Good::B, dec!(4)));

        run(&mut world);

        // Agent 0 (vision 8) sees agent 1 at distance 2 but not agent 2 at 15.
        let view = &world.agent(0).perception;
        assert_eq!(view.neighbors.len(), 1);
        assert_eq!(view.neighbors[0].id, 1);
        // Sees the near resource, not the far one.
        assert_eq!(view.resources.len(), 1);
        assert_eq!(view.resources[0].pos, Position::new(1, 1));
        assert_eq!(view.resources[0].kind, Good::A);
    }

    #[test]
    fn depleted_cells_are_invisible() {
        let mut world = test_world();
        let pos = Position::new(1, 0);
        world.grid.place_resource(pos, Resource::new(Good::A, dec!(2)));
        world.grid.resource_mut(pos).unwrap().amount = Decimal::ZERO;

        run(&mut world);
        assert!(world.agent(0).perception.resources.is_empty());
    }

    #[test]
    fn claims_appear_in_snapshots() {
        let mut world = test_world();
        world.config.enable_resource_claiming = true;
        let pos = Position::new(1, 1);
        world.grid.place_resource(pos, Resource::new(Good::A, dec!(4)));
        world.apply_claim(2, pos);

        run(&mut world);
        assert_eq!(world.agent(0).perception.resources[0].claimed_by, Some(2));
    }
}
