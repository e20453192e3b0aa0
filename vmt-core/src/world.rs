// World state for the barter simulation

use std::collections::BTreeMap;

use rand::SeedableRng;
use rust_decimal::Decimal;

use crate::agent::Agent;
use crate::config::SimConfig;
use crate::effect::{Target, TradeMeta, UnpairReason};
use crate::error::EngineError;
use crate::grid::Grid;
use crate::spatial::SpatialIndex;
use crate::trade_eval::evaluate_potential;
use crate::types::{AgentId, Good, Mode, Position, Tick};
use crate::view::SimRng;

/// Scratch storage for multi-tick protocols, keyed by
/// `(protocol, agent, key)`. Written only through the InternalStateUpdate
/// effect; read-only from inside protocol invocations.
pub type ProtocolState = BTreeMap<(String, AgentId, String), serde_json::Value>;

/// Canonical mutable state of one simulation. Only effect application and
/// the designated phase systems mutate it; protocols see read-only views.
#[derive(Debug)]
pub struct World {
    pub tick: Tick,
    pub mode: Mode,
    pub config: SimConfig,

    /// Dense, id-indexed. Agents are created at init and never destroyed.
    pub agents: Vec<Agent>,
    pub grid: Grid,
    pub spatial: SpatialIndex,

    /// Resource claims: at most one claimant per position. BTreeMap so the
    /// stale-claim sweep iterates deterministically.
    pub claims: BTreeMap<Position, AgentId>,

    pub protocol_state: ProtocolState,

    pub rng: SimRng,

    pub trade_count: u64,
    pub pairing_count: u64,
}

impl World {
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let bucket = config.vision_radius.max(config.interaction_radius);
        Self {
            tick: 0,
            mode: Mode::Both,
            grid: Grid::new(config.width, config.height),
            spatial: SpatialIndex::new(bucket),
            claims: BTreeMap::new(),
            protocol_state: BTreeMap::new(),
            rng: SimRng::seed_from_u64(seed),
            trade_count: 0,
            pairing_count: 0,
            agents: Vec::new(),
            config,
        }
    }

    // === AGENTS ===

    /// Add an agent at init. Ids are assigned densely in insertion order.
    pub fn add_agent(&mut self, mut agent: Agent) -> AgentId {
        let id = self.agents.len() as AgentId;
        agent.id = id;
        self.spatial.add(id, agent.position);
        self.agents.push(agent);
        id
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id as usize]
    }

    pub fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id as usize]
    }

    /// Distinct mutable borrows of two agents.
    pub fn agent_pair_mut(&mut self, a: AgentId, b: AgentId) -> (&mut Agent, &mut Agent) {
        debug_assert_ne!(a, b);
        let (a, b) = (a as usize, b as usize);
        if a < b {
            let (lo, hi) = self.agents.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.agents.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Move an agent, keeping the spatial index in sync.
    pub fn move_agent(&mut self, id: AgentId, new_pos: Position) {
        self.agents[id as usize].position = new_pos;
        self.spatial.update(id, new_pos);
    }

    // === PAIRING ===

    /// Apply a Pair effect. Rejected (returning false) when either endpoint
    /// is already paired; a successful pairing clears the mutual cooldowns
    /// and points both agents at each other.
    pub fn apply_pair(&mut self, a: AgentId, b: AgentId) -> bool {
        if a == b || self.agent(a).is_paired() || self.agent(b).is_paired() {
            return false;
        }

        // Estimated per-side surpluses for the pairing event log.
        let potential = evaluate_potential(self.agent(a).quote, self.agent(b).quote);
        let half = potential.estimated_surplus * 0.5;

        let tick = self.tick;
        let (agent_a, agent_b) = self.agent_pair_mut(a, b);
        agent_a.paired_with = Some(b);
        agent_a.paired_at_tick = Some(tick);
        agent_a.target_agent = Some(b);
        agent_a.target_pos = Some(agent_b.position);
        agent_a.trade_cooldowns.remove(&b);
        agent_a.forage_commitment = None;

        agent_b.paired_with = Some(a);
        agent_b.paired_at_tick = Some(tick);
        agent_b.target_agent = Some(a);
        agent_b.target_pos = Some(agent_a.position);
        agent_b.trade_cooldowns.remove(&a);
        agent_b.forage_commitment = None;

        self.pairing_count += 1;

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "pairing",
            tick = self.tick,
            a = a,
            b = b,
            kind = "pair",
            reason = "matched",
            surplus_a = half,
            surplus_b = half,
        );
        #[cfg(not(feature = "instrument"))]
        let _ = half;

        true
    }

    /// Apply an Unpair effect. Only `TradeFailed` starts the mutual
    /// cooldown window on both sides.
    pub fn apply_unpair(&mut self, a: AgentId, b: AgentId, reason: UnpairReason) {
        let cooldown_until = self.tick + self.config.trade_cooldown_ticks;
        let set_cooldown = matches!(reason, UnpairReason::TradeFailed);

        for (me, other) in [(a, b), (b, a)] {
            let agent = self.agent_mut(me);
            if agent.paired_with == Some(other) {
                agent.paired_with = None;
                agent.paired_at_tick = None;
                agent.target_agent = None;
                agent.target_pos = None;
            }
            if set_cooldown {
                agent.trade_cooldowns.insert(other, cooldown_until);
            }
        }

        #[cfg(feature = "instrument")]
        tracing::info!(
            target: "pairing",
            tick = self.tick,
            a = a,
            b = b,
            kind = "unpair",
            reason = reason.label(),
            surplus_a = 0.0,
            surplus_b = 0.0,
        );
    }

    /// Every agent's pairing must point back at it. Phase 7 verifies this;
    /// the decision phase also repairs on sight.
    pub fn pairing_is_symmetric(&self, id: AgentId) -> bool {
        match self.agent(id).paired_with {
            None => true,
            Some(other) => self.agent(other).paired_with == Some(id),
        }
    }

    // === TRADE ===

    /// Apply a Trade effect: atomic inventory swap plus bookkeeping. Deltas
    /// the inventories cannot sustain are a contract violation — the
    /// protocol produced an impossible trade — and fail the whole tick.
    pub fn apply_trade(
        &mut self,
        buyer: AgentId,
        seller: AgentId,
        da: Decimal,
        db: Decimal,
        price: f64,
        meta: &TradeMeta,
        protocol: &str,
    ) -> Result<(), EngineError> {
        let violation = || EngineError::TradeInsufficientInventory {
            tick: self.tick,
            buyer,
            seller,
            protocol: protocol.to_string(),
        };

        if da <= Decimal::ZERO || db <= Decimal::ZERO {
            return Err(violation());
        }
        if !self.agent(buyer).inventory.can_apply(da, -db)
            || !self.agent(seller).inventory.can_apply(-da, db)
        {
            return Err(violation());
        }

        let (buyer_agent, seller_agent) = self.agent_pair_mut(buyer, seller);
        buyer_agent.inventory.apply(da, -db);
        buyer_agent.inventory_changed = true;
        buyer_agent.trades_completed += 1;
        seller_agent.inventory.apply(-da, db);
        seller_agent.inventory_changed = true;
        seller_agent.trades_completed += 1;
        self.trade_count += 1;

        #[cfg(feature = "instrument")]
        {
            use rust_decimal::prelude::ToPrimitive;
            let pos = self.agent(buyer).position;
            tracing::info!(
                target: "trade",
                tick = self.tick,
                x = pos.x,
                y = pos.y,
                buyer_id = buyer,
                seller_id = seller,
                da = da.to_f64().unwrap_or(0.0),
                db = db.to_f64().unwrap_or(0.0),
                price = price,
                direction = "seller_gives_a",
                pair_type = meta.pair_name,
                buyer_surplus = meta.buyer_surplus,
                seller_surplus = meta.seller_surplus,
            );
        }
        #[cfg(not(feature = "instrument"))]
        let _ = (price, meta);

        Ok(())
    }

    // === CLAIMS ===

    /// Apply a ClaimResource effect. At most one claimant per position;
    /// a second claim is rejected. No-op when claiming is disabled.
    pub fn apply_claim(&mut self, agent: AgentId, pos: Position) -> bool {
        if !self.config.enable_resource_claiming {
            return false;
        }
        match self.claims.get(&pos) {
            Some(&owner) if owner != agent => false,
            _ => {
                self.claims.insert(pos, agent);
                true
            }
        }
    }

    pub fn apply_release(&mut self, pos: Position) {
        self.claims.remove(&pos);
    }

    // === TARGETING & SCRATCH ===

    pub fn apply_set_target(&mut self, id: AgentId, target: Target) {
        let agent = self.agent_mut(id);
        match target {
            Target::Agent(other) => {
                agent.target_agent = Some(other);
                agent.target_pos = None;
                agent.forage_commitment = None;
            }
            Target::Cell(pos) => {
                agent.target_agent = None;
                agent.target_pos = Some(pos);
                agent.forage_commitment = Some(crate::agent::ForageCommitment { pos });
            }
        }
    }

    pub fn apply_internal_state(
        &mut self,
        protocol: String,
        agent: AgentId,
        key: String,
        value: serde_json::Value,
    ) {
        self.protocol_state.insert((protocol, agent, key), value);
    }

    // === ACCOUNTING ===

    /// Total units of `good` across agents and grid resources. Changes only
    /// through foraging (grid → agent) and regeneration (bounded growth).
    pub fn total_good(&self, good: Good) -> Decimal {
        let held: Decimal = self.agents.iter().map(|a| a.inventory.get(good)).sum();
        let on_grid: Decimal = self
            .grid
            .resource_positions()
            .iter()
            .filter_map(|&pos| self.grid.resource(pos))
            .filter(|r| r.kind == good)
            .map(|r| r.amount)
            .sum();
        held + on_grid
    }
}
