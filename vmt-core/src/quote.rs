// Quotes: the (bid, ask) pair an agent publishes for good A priced in B

use serde::{Deserialize, Serialize};

use crate::inventory::Inventory;
use crate::types::Price;
use crate::utility::Utility;

/// Published prices for good A in units of B. `bid` is the most B the agent
/// would pay per unit of A; `ask` is the least B it would accept.
///
/// Quotes are set at init and recomputed only in Phase 7 for agents whose
/// inventory changed; within a tick they are frozen after Phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Price,
    pub ask: Price,
}

impl Quote {
    /// Symmetric spread around the agent's current MRS:
    /// `bid = mrs·(1+s)`, `ask = mrs·(1−s)`.
    pub fn from_mrs(mrs: f64, spread: f64) -> Self {
        Self {
            bid: mrs * (1.0 + spread),
            ask: mrs * (1.0 - spread),
        }
    }

    pub fn compute(utility: &Utility, inventory: &Inventory, spread: f64) -> Self {
        let (a, b) = inventory.as_f64();
        Self::from_mrs(utility.mrs_a_in_b(a, b), spread)
    }
}
