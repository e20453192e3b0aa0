// Search protocols: rank visible targets and emit targeting effects

use rust_decimal::prelude::ToPrimitive;

use crate::effect::{Effect, Target};
use crate::error::EngineError;
use crate::trade_eval::evaluate_potential;
use crate::types::Position;
use crate::view::{SimRng, WorldView};

use super::{Preference, SearchProtocol};

pub fn distance_discounted(
    params: &serde_json::Value,
) -> Result<Box<dyn SearchProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "search",
            name: "distance_discounted_search".to_string(),
            message: "takes no params (beta comes from the scenario config)".to_string(),
        });
    }
    Ok(Box::new(DistanceDiscounted))
}

pub fn random_walk(params: &serde_json::Value) -> Result<Box<dyn SearchProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "search",
            name: "random_walk_search".to_string(),
            message: "takes no params".to_string(),
        });
    }
    Ok(Box::new(RandomWalk))
}

// === DISTANCE-DISCOUNTED (default) ===

/// Ranks trade partners by quote-overlap surplus and resources by utility
/// gain, both discounted by `beta^distance`. In `both` mode the two
/// rankings compete head to head and the higher top score wins.
pub struct DistanceDiscounted;

impl DistanceDiscounted {
    fn trade_candidates(&self, view: &WorldView<'_>) -> Vec<Preference> {
        let beta = view.config.beta;
        view.perception
            .neighbors
            .iter()
            .filter(|n| n.paired_with.is_none())
            .filter(|n| !view.in_cooldown_with(n.id))
            .filter_map(|n| {
                let potential = evaluate_potential(view.quote, n.quote);
                if !potential.is_feasible {
                    return None;
                }
                let d = view.position.distance(n.position);
                let score = potential.estimated_surplus * beta.powi(d as i32);
                // beta = 0 collapses interaction to co-located agents.
                (score > 0.0).then_some(Preference {
                    target: Target::Agent(n.id),
                    score,
                })
            })
            .collect()
    }

    fn forage_candidates(&self, view: &WorldView<'_>) -> Vec<Preference> {
        let beta = view.config.beta;
        let (a, b) = view.inventory.as_f64();
        let u_now = view.utility.value(a, b);
        let rate = view.config.forage_rate;

        view.perception
            .resources
            .iter()
            .filter(|r| r.amount > rust_decimal::Decimal::ZERO)
            .filter(|r| match r.claimed_by {
                Some(owner) => owner == view.agent_id,
                None => true,
            })
            .filter_map(|r| {
                let take = rate.min(r.amount).to_f64()?;
                let gain = match r.kind {
                    crate::types::Good::A => view.utility.value(a + take, b) - u_now,
                    crate::types::Good::B => view.utility.value(a, b + take) - u_now,
                };
                if gain <= 0.0 {
                    return None;
                }
                let d = view.position.distance(r.pos);
                let score = gain * beta.powi(d as i32);
                (score > 0.0).then_some(Preference {
                    target: Target::Cell(r.pos),
                    score,
                })
            })
            .collect()
    }
}

/// Tie-breaks: descending discounted score, then agents by ascending id,
/// then resources by lexicographic position; agents sort ahead of
/// resources on exact score ties.
fn sort_preferences(preferences: &mut [Preference]) {
    preferences.sort_by(|lhs, rhs| {
        rhs.score
            .total_cmp(&lhs.score)
            .then_with(|| match (lhs.target, rhs.target) {
                (Target::Agent(a), Target::Agent(b)) => a.cmp(&b),
                (Target::Cell(a), Target::Cell(b)) => a.cmp(&b),
                (Target::Agent(_), Target::Cell(_)) => std::cmp::Ordering::Less,
                (Target::Cell(_), Target::Agent(_)) => std::cmp::Ordering::Greater,
            })
    });
}

impl SearchProtocol for DistanceDiscounted {
    fn name(&self) -> &'static str {
        "distance_discounted_search"
    }

    fn build_preferences(&self, view: &WorldView<'_>, _rng: &mut SimRng) -> Vec<Preference> {
        let mut preferences = Vec::new();
        if view.mode.trade_enabled() {
            preferences.extend(self.trade_candidates(view));
        }
        if view.mode.forage_enabled() {
            preferences.extend(self.forage_candidates(view));
        }
        sort_preferences(&mut preferences);
        preferences
    }

    fn select_target(&self, view: &WorldView<'_>, rng: &mut SimRng) -> Vec<Effect> {
        let preferences = self.build_preferences(view, rng);
        let Some(best) = preferences.first() else {
            return Vec::new(); // nothing visible worth pursuing; idle
        };

        let mut effects = vec![Effect::SetTarget {
            agent: view.agent_id,
            target: best.target,
        }];
        if let Target::Cell(pos) = best.target
            && view.config.enable_resource_claiming
        {
            effects.push(Effect::ClaimResource {
                agent: view.agent_id,
                pos,
            });
        }
        effects
    }
}

// === RANDOM WALK ===

/// Drifts one cell per tick in a direction drawn from the shared RNG.
/// Builds no trade preferences, so agents under this protocol never pair;
/// it exists to exercise the RNG threading path and as a null searcher.
pub struct RandomWalk;

impl SearchProtocol for RandomWalk {
    fn name(&self) -> &'static str {
        "random_walk_search"
    }

    fn build_preferences(&self, _view: &WorldView<'_>, _rng: &mut SimRng) -> Vec<Preference> {
        Vec::new()
    }

    fn select_target(&self, view: &WorldView<'_>, rng: &mut SimRng) -> Vec<Effect> {
        use rand::Rng;
        let (dx, dy) = match rng.random_range(0..4u8) {
            0 => (1, 0),
            1 => (-1, 0),
            2 => (0, 1),
            _ => (0, -1),
        };
        let pos = Position::new(
            (view.position.x + dx).clamp(0, view.config.width as i32 - 1),
            (view.position.y + dy).clamp(0, view.config.height as i32 - 1),
        );
        vec![Effect::SetTarget {
            agent: view.agent_id,
            target: Target::Cell(pos),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{NeighborSnapshot, PerceptionView, ResourceSnapshot};
    use crate::config::SimConfig;
    use crate::inventory::Inventory;
    use crate::quote::Quote;
    use crate::types::{Good, Mode};
    use crate::utility::Utility;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn view_fixture<'a>(
        perception: &'a PerceptionView,
        cooldowns: &'a BTreeMap<u32, u64>,
        utility: &'a Utility,
        config: &'a SimConfig,
        mode: Mode,
    ) -> WorldView<'a> {
        WorldView {
            agent_id: 0,
            position: Position::new(0, 0),
            inventory: Inventory::new(dec!(10), dec!(0)),
            utility,
            quote: Quote::from_mrs(0.2, 0.05),
            perception,
            cooldowns,
            tick: 0,
            mode,
            config,
        }
    }

    #[test]
    fn nearer_partner_wins_on_equal_surplus() {
        let far = NeighborSnapshot {
            id: 1,
            position: Position::new(6, 0),
            quote: Quote::from_mrs(2.0, 0.05),
            paired_with: None,
        };
        let near = NeighborSnapshot {
            id: 2,
            position: Position::new(1, 0),
            quote: Quote::from_mrs(2.0, 0.05),
            paired_with: None,
        };
        let perception = PerceptionView {
            neighbors: vec![far, near],
            resources: vec![],
        };
        let cooldowns = BTreeMap::new();
        let utility = Utility::CobbDouglas { alpha: 0.5 };
        let config = SimConfig::default();
        let view = view_fixture(&perception, &cooldowns, &utility, &config, Mode::Trade);
        let mut rng = SimRng::seed_from_u64(0);

        let prefs = DistanceDiscounted.build_preferences(&view, &mut rng);
        assert_eq!(prefs.len(), 2);
        assert_eq!(prefs[0].target, Target::Agent(2));
        assert!(prefs[0].score > prefs[1].score);
    }

    #[test]
    fn cooldown_and_paired_neighbors_are_skipped() {
        let in_cooldown = NeighborSnapshot {
            id: 1,
            position: Position::new(1, 0),
            quote: Quote::from_mrs(2.0, 0.05),
            paired_with: None,
        };
        let paired = NeighborSnapshot {
            id: 2,
            position: Position::new(2, 0),
            quote: Quote::from_mrs(2.0, 0.05),
            paired_with: Some(3),
        };
        let perception = PerceptionView {
            neighbors: vec![in_cooldown, paired],
            resources: vec![],
        };
        let mut cooldowns = BTreeMap::new();
        cooldowns.insert(1, 100);
        let utility = Utility::CobbDouglas { alpha: 0.5 };
        let config = SimConfig::default();
        let view = view_fixture(&perception, &cooldowns, &utility, &config, Mode::Trade);
        let mut rng = SimRng::seed_from_u64(0);

        assert!(DistanceDiscounted.build_preferences(&view, &mut rng).is_empty());
    }

    #[test]
    fn forage_mode_targets_best_discounted_cell_and_claims_when_enabled() {
        let rich_far = ResourceSnapshot {
            pos: Position::new(5, 5),
            kind: Good::B,
            amount: dec!(10),
            claimed_by: None,
        };
        let near = ResourceSnapshot {
            pos: Position::new(1, 0),
            kind: Good::B,
            amount: dec!(10),
            claimed_by: None,
        };
        let claimed = ResourceSnapshot {
            pos: Position::new(0, 1),
            kind: Good::B,
            amount: dec!(10),
            claimed_by: Some(7),
        };
        let perception = PerceptionView {
            neighbors: vec![],
            resources: vec![rich_far, near, claimed],
        };
        let cooldowns = BTreeMap::new();
        let utility = Utility::CobbDouglas { alpha: 0.5 };
        let mut config = SimConfig::default();
        config.enable_resource_claiming = true;
        let view = view_fixture(&perception, &cooldowns, &utility, &config, Mode::Forage);
        let mut rng = SimRng::seed_from_u64(0);

        let effects = DistanceDiscounted.select_target(&view, &mut rng);
        assert_eq!(
            effects[0],
            Effect::SetTarget {
                agent: 0,
                target: Target::Cell(Position::new(1, 0))
            }
        );
        assert_eq!(
            effects[1],
            Effect::ClaimResource {
                agent: 0,
                pos: Position::new(1, 0)
            }
        );
    }

    #[test]
    fn random_walk_is_seed_deterministic() {
        let perception = PerceptionView::default();
        let cooldowns = BTreeMap::new();
        let utility = Utility::CobbDouglas { alpha: 0.5 };
        let config = SimConfig::default();
        let view = view_fixture(&perception, &cooldowns, &utility, &config, Mode::Both);

        let mut rng_a = SimRng::seed_from_u64(9);
        let mut rng_b = SimRng::seed_from_u64(9);
        assert_eq!(
            RandomWalk.select_target(&view, &mut rng_a),
            RandomWalk.select_target(&view, &mut rng_b)
        );
    }
}
