// Phase 3 — Movement
//
// Deterministic Manhattan pathing toward each agent's target, in id
// order, spending up to `move_budget_per_tick` single-cell steps. The
// x-axis delta is reduced before the y-axis delta, so paths are L-shaped
// and fully reproducible.

use crate::types::{AgentId, Position};
use crate::world::World;

pub fn run(world: &mut World) {
    for id in 0..world.agents.len() as AgentId {
        step_agent(world, id);
    }
}

fn step_agent(world: &mut World, id: AgentId) {
    let agent = world.agent(id);
    let budget = agent.move_budget_per_tick;
    let interaction_radius = agent.interaction_radius;
    let start = agent.position;

    // Partner position wins over an explicit cell target.
    let target_agent = agent.paired_with.or(agent.target_agent);
    let target = match target_agent {
        Some(other) => world.agent(other).position,
        None => match agent.target_pos {
            Some(pos) => pos,
            None => return,
        },
    };

    if let Some(other) = target_agent {
        // Close enough to interact: hold position, Phase 4 negotiates.
        if start.distance(target) <= interaction_radius {
            return;
        }

        // Diagonal deadlock: two agents mutually closing at d=2 on a
        // diagonal would swap places forever. The lower id stays put; the
        // higher id breaks the symmetry by moving.
        let other_agent = world.agent(other);
        let mutual =
            other_agent.paired_with == Some(id) || other_agent.target_agent == Some(id);
        let dx = (target.x - start.x).abs();
        let dy = (target.y - start.y).abs();
        if mutual && dx == 1 && dy == 1 && id < other {
            return;
        }
    }

    let mut pos = start;
    for _ in 0..budget {
        if target_agent.is_some() && pos.distance(target) <= interaction_radius {
            break;
        }
        if pos == target {
            break;
        }
        let dx = target.x - pos.x;
        let dy = target.y - pos.y;
        if dx != 0 {
            pos = Position::new(pos.x + dx.signum(), pos.y);
        } else if dy != 0 {
            pos = Position::new(pos.x, pos.y + dy.signum());
        }
    }

    if pos != start {
        world.move_agent(id, pos);
    }
}
