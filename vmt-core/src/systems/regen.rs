// Phase 6 — Resource regeneration
//
// Iterates only the harvested-cell active set, never the whole grid.
// Cells regrow `growth_rate` per tick once `regen_cooldown` ticks have
// passed since the last harvest, capped at `original_amount`. Growth rate
// zero disables regeneration entirely.

use rust_decimal::Decimal;

use crate::types::Position;
use crate::world::World;

enum Action {
    Drop,
    Grow,
    Wait,
}

pub fn run(world: &mut World) {
    let tick = world.tick;
    let cooldown = world.config.resource_regen_cooldown;
    let growth = world.config.resource_growth_rate;

    let actions: Vec<(Position, Action)> = world
        .grid
        .harvested_cells
        .iter()
        .map(|&pos| {
            let action = match world.grid.resource(pos) {
                None => Action::Drop,
                Some(resource) => match resource.last_harvested_tick {
                    None => Action::Drop,
                    Some(_) if resource.is_full() => Action::Drop,
                    Some(last)
                        if growth > Decimal::ZERO && tick.saturating_sub(last) >= cooldown =>
                    {
                        Action::Grow
                    }
                    Some(_) => Action::Wait,
                },
            };
            (pos, action)
        })
        .collect();

    for (pos, action) in actions {
        match action {
            Action::Drop => {
                world.grid.harvested_cells.remove(&pos);
            }
            Action::Grow => {
                let resource = world.grid.resource_mut(pos).expect("checked above");
                resource.amount = (resource.amount + growth).min(resource.original_amount);
                if resource.is_full() {
                    world.grid.harvested_cells.remove(&pos);
                }
            }
            Action::Wait => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::grid::Resource;
    use crate::types::Good;
    use rust_decimal_macros::dec;

    fn harvested_world(amount: Decimal, last_tick: u64) -> World {
        let mut world = World::new(SimConfig::default(), 0);
        let pos = Position::new(1, 1);
        let mut resource = Resource::new(Good::A, dec!(10));
        resource.amount = amount;
        resource.last_harvested_tick = Some(last_tick);
        world.grid.place_resource(pos, resource);
        world.grid.mark_harvested(pos);
        world
    }

    #[test]
    fn regrows_after_cooldown_and_caps_at_original() {
        let mut world = harvested_world(dec!(9.5), 0);
        world.tick = world.config.resource_regen_cooldown;

        run(&mut world);

        let pos = Position::new(1, 1);
        // 9.5 + 1 caps at 10, and the full cell leaves the active set.
        assert_eq!(world.grid.resource(pos).unwrap().amount, dec!(10));
        assert!(world.grid.harvested_cells.is_empty());
    }

    #[test]
    fn waits_out_the_cooldown() {
        let mut world = harvested_world(dec!(5), 0);
        world.tick = world.config.resource_regen_cooldown - 1;

        run(&mut world);

        assert_eq!(
            world.grid.resource(Position::new(1, 1)).unwrap().amount,
            dec!(5)
        );
        assert_eq!(world.grid.harvested_cells.len(), 1);
    }

    #[test]
    fn zero_growth_disables_regeneration() {
        let mut world = harvested_world(dec!(5), 0);
        world.config.resource_growth_rate = Decimal::ZERO;
        world.tick = 100;

        run(&mut world);

        assert_eq!(
            world.grid.resource(Position::new(1, 1)).unwrap().amount,
            dec!(5)
        );
    }

    #[test]
    fn full_and_vanished_cells_leave_the_active_set() {
        let mut world = harvested_world(dec!(10), 0);
        world.tick = 1;
        run(&mut world);
        assert!(world.grid.harvested_cells.is_empty());

        // A position with no resource at all is swept out too.
        let ghost = Position::new(3, 3);
        world.grid.mark_harvested(ghost);
        run(&mut world);
        assert!(world.grid.harvested_cells.is_empty());
    }
}
