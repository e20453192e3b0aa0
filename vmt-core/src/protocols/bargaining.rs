// Bargaining protocols: turn a paired pair into a Trade or an Unpair

use serde::Deserialize;

use crate::agent::Agent;
use crate::config::SimConfig;
use crate::effect::{Effect, TradeMeta, UnpairReason};
use crate::error::EngineError;
use crate::trade_eval::{DiscoveredTrade, discover_all_feasible, discover_first_feasible};
use crate::types::AgentId;
use crate::view::SimRng;

use super::BargainingProtocol;

pub fn compensating_block(
    params: &serde_json::Value,
) -> Result<Box<dyn BargainingProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "bargaining",
            name: "compensating_block".to_string(),
            message: "takes no params".to_string(),
        });
    }
    Ok(Box::new(CompensatingBlock))
}

pub fn split_difference(
    params: &serde_json::Value,
) -> Result<Box<dyn BargainingProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "bargaining",
            name: "split_difference".to_string(),
            message: "takes no params".to_string(),
        });
    }
    Ok(Box::new(SplitDifference))
}

pub fn take_it_or_leave_it(
    params: &serde_json::Value,
) -> Result<Box<dyn BargainingProtocol>, EngineError> {
    let parsed: TakeItOrLeaveItParams = if params.is_null() {
        TakeItOrLeaveItParams::default()
    } else {
        serde_json::from_value(params.clone()).map_err(|e| EngineError::InvalidProtocolParams {
            category: "bargaining",
            name: "take_it_or_leave_it".to_string(),
            message: e.to_string(),
        })?
    };
    if !(0.0..=1.0).contains(&parsed.proposer_power) {
        return Err(EngineError::InvalidProtocolParams {
            category: "bargaining",
            name: "take_it_or_leave_it".to_string(),
            message: format!("proposer_power {} outside [0, 1]", parsed.proposer_power),
        });
    }
    Ok(Box::new(TakeItOrLeaveIt { params: parsed }))
}

fn trade_effect(trade: DiscoveredTrade) -> Effect {
    Effect::Trade {
        buyer: trade.buyer,
        seller: trade.seller,
        da: trade.da,
        db: trade.db,
        price: trade.price,
        meta: TradeMeta {
            buyer_surplus: trade.du_buyer,
            seller_surplus: trade.du_seller,
            pair_name: trade.pair_name,
        },
    }
}

fn unpair_effect(pair: (AgentId, AgentId)) -> Effect {
    Effect::Unpair {
        a: pair.0,
        b: pair.1,
        reason: UnpairReason::TradeFailed,
    }
}

// === COMPENSATING BLOCK (default) ===

/// The historical VMT algorithm: scan quantities ascending and the fixed
/// price grid, return the first trade that clears epsilon for both sides.
pub struct CompensatingBlock;

impl BargainingProtocol for CompensatingBlock {
    fn name(&self) -> &'static str {
        "compensating_block"
    }

    fn negotiate(
        &self,
        pair: (AgentId, AgentId),
        agents: (&Agent, &Agent),
        config: &SimConfig,
        _state: &crate::world::ProtocolState,
        _rng: &mut SimRng,
    ) -> Vec<Effect> {
        match discover_first_feasible(agents.0, agents.1, config.epsilon) {
            Some(trade) => vec![trade_effect(trade)],
            None => vec![unpair_effect(pair)],
        }
    }
}

// === SPLIT THE DIFFERENCE ===

/// Enumerates every feasible trade and picks the one that equalizes the
/// two sides' gains: minimize `|Δu_i − Δu_j|`, tie-break by total surplus
/// (higher first), then price, then quantity.
pub struct SplitDifference;

impl BargainingProtocol for SplitDifference {
    fn name(&self) -> &'static str {
        "split_difference"
    }

    fn negotiate(
        &self,
        pair: (AgentId, AgentId),
        agents: (&Agent, &Agent),
        config: &SimConfig,
        _state: &crate::world::ProtocolState,
        _rng: &mut SimRng,
    ) -> Vec<Effect> {
        let mut feasible = discover_all_feasible(agents.0, agents.1, config.epsilon);
        if feasible.is_empty() {
            return vec![unpair_effect(pair)];
        }
        feasible.sort_by(|lhs, rhs| {
            let lhs_gap = (lhs.du_buyer - lhs.du_seller).abs();
            let rhs_gap = (rhs.du_buyer - rhs.du_seller).abs();
            lhs_gap
                .total_cmp(&rhs_gap)
                .then_with(|| rhs.total_surplus().total_cmp(&lhs.total_surplus()))
                .then_with(|| lhs.price.total_cmp(&rhs.price))
                .then_with(|| lhs.da.cmp(&rhs.da))
        });
        vec![trade_effect(feasible.swap_remove(0))]
    }
}

// === TAKE IT OR LEAVE IT ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposerSelector {
    /// Drawn from the shared simulation RNG each negotiation.
    Random,
    Buyer,
    Seller,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TakeItOrLeaveItParams {
    pub proposer_power: f64,
    pub proposer: ProposerSelector,
}

impl Default for TakeItOrLeaveItParams {
    fn default() -> Self {
        Self {
            proposer_power: 0.5,
            proposer: ProposerSelector::Random,
        }
    }
}

/// Finds the maximum-total-surplus feasible trade, then resolves surplus
/// ties toward the proposer's `proposer_power` share. The price grid is
/// discrete, so the p:(1−p) allocation is honored as closely as the grid
/// allows rather than exactly.
pub struct TakeItOrLeaveIt {
    params: TakeItOrLeaveItParams,
}

impl BargainingProtocol for TakeItOrLeaveIt {
    fn name(&self) -> &'static str {
        "take_it_or_leave_it"
    }

    fn negotiate(
        &self,
        pair: (AgentId, AgentId),
        agents: (&Agent, &Agent),
        config: &SimConfig,
        _state: &crate::world::ProtocolState,
        rng: &mut SimRng,
    ) -> Vec<Effect> {
        use rand::Rng;

        let mut feasible = discover_all_feasible(agents.0, agents.1, config.epsilon);
        if feasible.is_empty() {
            return vec![unpair_effect(pair)];
        }

        // Proposer selection happens before looking at trades so the RNG
        // stream is identical whatever the feasible set looks like.
        let random_pick = if rng.random_bool(0.5) { pair.0 } else { pair.1 };

        let power = self.params.proposer_power;
        let proposer_share = |trade: &DiscoveredTrade| {
            let proposer = match self.params.proposer {
                ProposerSelector::Random => random_pick,
                ProposerSelector::Buyer => trade.buyer,
                ProposerSelector::Seller => trade.seller,
            };
            let own = if proposer == trade.buyer {
                trade.du_buyer
            } else {
                trade.du_seller
            };
            let total = trade.total_surplus();
            if total > 0.0 { own / total } else { 0.0 }
        };

        feasible.sort_by(|lhs, rhs| {
            rhs.total_surplus()
                .total_cmp(&lhs.total_surplus())
                .then_with(|| {
                    let lhs_miss = (proposer_share(lhs) - power).abs();
                    let rhs_miss = (proposer_share(rhs) - power).abs();
                    lhs_miss.total_cmp(&rhs_miss)
                })
                .then_with(|| lhs.price.total_cmp(&rhs.price))
                .then_with(|| lhs.da.cmp(&rhs.da))
        });
        vec![trade_effect(feasible.swap_remove(0))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Inventory;
    use crate::quote::Quote;
    use crate::types::Position;
    use crate::utility::Utility;
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quoted_agent(id: AgentId, a: Decimal, b: Decimal) -> Agent {
        let mut agent = Agent::new(
            id,
            Position::new(0, 0),
            Inventory::new(a, b),
            Utility::CobbDouglas { alpha: 0.5 },
        );
        agent.quote = Quote::compute(&agent.utility, &agent.inventory, 0.05);
        agent
    }

    #[test]
    fn compensating_block_trades_on_mirrored_endowments() {
        let first = quoted_agent(0, dec!(10), dec!(0));
        let second = quoted_agent(1, dec!(0), dec!(10));
        let config = SimConfig::default();
        let state = crate::world::ProtocolState::new();
        let mut rng = SimRng::seed_from_u64(0);

        let effects = CompensatingBlock.negotiate((0, 1), (&first, &second), &config, &state, &mut rng);
        assert_eq!(effects.len(), 1);
        let Effect::Trade { buyer, seller, da, db, meta, .. } = &effects[0] else {
            panic!("expected a trade, got {:?}", effects[0]);
        };
        assert_eq!((*buyer, *seller), (1, 0));
        assert!(*da > Decimal::ZERO && *db > Decimal::ZERO);
        assert!(meta.buyer_surplus > config.epsilon);
        assert!(meta.seller_surplus > config.epsilon);
    }

    #[test]
    fn no_overlap_unpairs_with_trade_failed() {
        // Identical twins: no price clears epsilon for both.
        let first = quoted_agent(0, dec!(5), dec!(5));
        let second = quoted_agent(1, dec!(5), dec!(5));
        let config = SimConfig::default();
        let state = crate::world::ProtocolState::new();
        let mut rng = SimRng::seed_from_u64(0);

        let effects = CompensatingBlock.negotiate((0, 1), (&first, &second), &config, &state, &mut rng);
        assert_eq!(
            effects,
            vec![Effect::Unpair {
                a: 0,
                b: 1,
                reason: UnpairReason::TradeFailed
            }]
        );
    }

    #[test]
    fn split_difference_picks_most_balanced_trade() {
        let first = quoted_agent(0, dec!(10), dec!(0));
        let second = quoted_agent(1, dec!(0), dec!(10));
        let config = SimConfig::default();
        let state = crate::world::ProtocolState::new();
        let mut rng = SimRng::seed_from_u64(0);

        let effects = SplitDifference.negotiate((0, 1), (&first, &second), &config, &state, &mut rng);
        let Effect::Trade { meta, .. } = &effects[0] else {
            panic!("expected a trade");
        };

        // The chosen split can be no more lopsided than any feasible trade.
        let chosen_gap = (meta.buyer_surplus - meta.seller_surplus).abs();
        for alt in discover_all_feasible(&first, &second, config.epsilon) {
            let gap = (alt.du_buyer - alt.du_seller).abs();
            assert!(chosen_gap <= gap + 1e-12);
        }
    }

    #[test]
    fn take_it_or_leave_it_maximizes_total_surplus() {
        let first = quoted_agent(0, dec!(10), dec!(0));
        let second = quoted_agent(1, dec!(0), dec!(10));
        let config = SimConfig::default();
        let state = crate::world::ProtocolState::new();
        let mut rng = SimRng::seed_from_u64(3);

        let protocol = TakeItOrLeaveIt {
            params: TakeItOrLeaveItParams {
                proposer_power: 1.0,
                proposer: ProposerSelector::Buyer,
            },
        };
        let effects = protocol.negotiate((0, 1), (&first, &second), &config, &state, &mut rng);
        let Effect::Trade { meta, .. } = &effects[0] else {
            panic!("expected a trade");
        };
        let total = meta.buyer_surplus + meta.seller_surplus;
        for alt in discover_all_feasible(&first, &second, config.epsilon) {
            assert!(total >= alt.total_surplus() - 1e-12);
        }
    }

    #[test]
    fn default_timeout_dissolves_the_pair() {
        let first = quoted_agent(0, dec!(5), dec!(5));
        let second = quoted_agent(1, dec!(5), dec!(5));
        let effects = CompensatingBlock.on_timeout((0, 1), (&first, &second));
        assert_eq!(
            effects,
            vec![Effect::Unpair {
                a: 0,
                b: 1,
                reason: UnpairReason::Timeout
            }]
        );
    }
}
