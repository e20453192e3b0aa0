// === TRADE EVALUATION & DISCOVERY ===
//
// Two deliberately separate interfaces serve two phases:
//
// - `evaluate_potential` (matching, Phase 2): quote overlap only. Fast,
//   heuristic, never touches utility functions. Drives pairing decisions.
// - `discover_*` (bargaining, Phase 4): full utility evaluation over
//   integer quantities and a fixed price grid. Produces concrete trades.
//
// Matching must not call the discoverer; bargaining protocols own which
// discoverer they use. This decoupling is the engine's central
// architectural invariant.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::agent::Agent;
use crate::inventory::round_to_quantity;
use crate::quote::Quote;
use crate::types::AgentId;

/// Which way goods flow between an ordered pair `(first, second)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `first` sells A to `second`.
    FirstGivesA,
    /// `second` sells A to `first`.
    SecondGivesA,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::FirstGivesA => "first_gives_a",
            Direction::SecondGivesA => "second_gives_a",
        }
    }
}

/// Result of the lightweight pre-pairing feasibility check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePotential {
    pub is_feasible: bool,
    /// Best bid/ask overlap across both directions, in units of B per A.
    pub estimated_surplus: f64,
    pub preferred_direction: Option<Direction>,
    /// Overlap relative to the quote midpoint, in `[0, 1]`.
    pub confidence: f64,
}

impl TradePotential {
    pub fn infeasible() -> Self {
        Self {
            is_feasible: false,
            estimated_surplus: 0.0,
            preferred_direction: None,
            confidence: 0.0,
        }
    }
}

/// Estimate trade potential between two quote pairs using overlap only.
/// The seller's ask must sit below the buyer's bid for a direction to be
/// open; the overlap width is the estimated surplus per unit.
pub fn evaluate_potential(first: Quote, second: Quote) -> TradePotential {
    let first_sells = second.bid - first.ask;
    let second_sells = first.bid - second.ask;

    let (overlap, direction) = if first_sells >= second_sells {
        (first_sells, Direction::FirstGivesA)
    } else {
        (second_sells, Direction::SecondGivesA)
    };

    if overlap <= 0.0 {
        return TradePotential::infeasible();
    }

    let midpoint = 0.25 * (first.bid + first.ask + second.bid + second.ask);
    let confidence = if midpoint > 0.0 {
        (overlap / midpoint).clamp(0.0, 1.0)
    } else {
        0.0
    };

    TradePotential {
        is_feasible: true,
        estimated_surplus: overlap,
        preferred_direction: Some(direction),
        confidence,
    }
}

// === PRICE CANDIDATES ===

/// Interval fractions scanned by the discoverer, in scan order. Midpoint
/// first so the fairest split is found first; endpoints last. This grid is
/// part of the engine's public contract: determinism of every scenario
/// oracle depends on it, and ports must reproduce it exactly.
const PRICE_FRACTIONS: [f64; 7] = [
    0.5,
    0.25,
    0.75,
    1.0 / 3.0,
    2.0 / 3.0,
    0.0,
    1.0,
];

/// The deterministic finite price grid over `[ask, bid]`, deduplicated by
/// exact equality (a degenerate interval collapses to one candidate).
pub fn price_candidates(ask: f64, bid: f64) -> Vec<f64> {
    let mut candidates = Vec::with_capacity(PRICE_FRACTIONS.len());
    for fraction in PRICE_FRACTIONS {
        let p = ask + (bid - ask) * fraction;
        if !candidates.contains(&p) {
            candidates.push(p);
        }
    }
    candidates
}

// === DISCOVERY ===

/// A concrete mutually beneficial trade. `buyer` gains `da` of A and pays
/// `db` of B to `seller`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredTrade {
    pub buyer: AgentId,
    pub seller: AgentId,
    pub da: Decimal,
    pub db: Decimal,
    pub price: f64,
    pub du_buyer: f64,
    pub du_seller: f64,
    pub pair_name: &'static str,
}

impl DiscoveredTrade {
    pub fn total_surplus(&self) -> f64 {
        self.du_buyer + self.du_seller
    }
}

const PAIR_NAME: &str = "A<->B";

fn utility_delta(agent: &Agent, da: Decimal, db: Decimal) -> f64 {
    let (a, b) = agent.inventory.as_f64();
    let new_a = a + da.to_f64().unwrap_or(0.0);
    let new_b = b + db.to_f64().unwrap_or(0.0);
    agent.utility.value(new_a, new_b) - agent.utility.value(a, b)
}

fn check_candidate(
    seller: &Agent,
    buyer: &Agent,
    da: Decimal,
    price: f64,
    epsilon: f64,
) -> Option<DiscoveredTrade> {
    let raw_db = Decimal::from_f64(price * da.to_f64().unwrap_or(0.0))?;
    let db = round_to_quantity(raw_db);
    if db <= Decimal::ZERO || buyer.inventory.b < db || seller.inventory.a < da {
        return None;
    }

    let du_seller = utility_delta(seller, -da, db);
    let du_buyer = utility_delta(buyer, da, -db);
    if du_seller > epsilon && du_buyer > epsilon {
        Some(DiscoveredTrade {
            buyer: buyer.id,
            seller: seller.id,
            da,
            db,
            price,
            du_buyer,
            du_seller,
            pair_name: PAIR_NAME,
        })
    } else {
        None
    }
}

fn scan_direction(
    seller: &Agent,
    buyer: &Agent,
    epsilon: f64,
    mut on_found: impl FnMut(DiscoveredTrade) -> bool,
) {
    let ask = seller.quote.ask;
    let bid = buyer.quote.bid;
    if ask > bid {
        return; // no quote overlap in this direction
    }

    let max_da = seller.inventory.a.trunc().to_u64().unwrap_or(0);
    let prices = price_candidates(ask, bid);
    for da_units in 1..=max_da {
        let da = Decimal::from(da_units);
        for &price in &prices {
            if let Some(trade) = check_candidate(seller, buyer, da, price, epsilon)
                && !on_found(trade)
            {
                return;
            }
        }
    }
}

/// First-feasible discovery: the compensating-block scan. Directions are
/// tried in `(first gives A, second gives A)` order; within a direction,
/// quantities ascend and prices follow the fixed grid.
pub fn discover_first_feasible(
    first: &Agent,
    second: &Agent,
    epsilon: f64,
) -> Option<DiscoveredTrade> {
    let mut found = None;
    for (seller, buyer) in [(first, second), (second, first)] {
        scan_direction(seller, buyer, epsilon, |trade| {
            found = Some(trade);
            false // stop at the first hit
        });
        if found.is_some() {
            break;
        }
    }
    found
}

/// Exhaustive discovery over both directions, for protocols that optimize
/// across the whole feasible set instead of taking the first hit.
pub fn discover_all_feasible(first: &Agent, second: &Agent, epsilon: f64) -> Vec<DiscoveredTrade> {
    let mut all = Vec::new();
    for (seller, buyer) in [(first, second), (second, first)] {
        scan_direction(seller, buyer, epsilon, |trade| {
            all.push(trade);
            true
        });
    }
    all
}
