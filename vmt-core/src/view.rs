// Read-only views handed to protocols. `WorldView` is agent-scoped (built
// from the Phase 1 perception cache); `ProtocolContext` is
// simulation-scoped (built once for matching). Protocols receive these by
// shared reference and return effects; they never touch the world.

use std::collections::BTreeMap;

use crate::agent::{Agent, PerceptionView};
use crate::config::SimConfig;
use crate::inventory::Inventory;
use crate::quote::Quote;
use crate::types::{AgentId, Mode, Position, Tick};
use crate::utility::Utility;

/// The single shared RNG, threaded `&mut` into every protocol invocation.
/// Wall-clock, thread-local, and global randomness are forbidden.
pub type SimRng = rand_pcg::Pcg64;

/// Agent-scoped immutable view for search protocols.
pub struct WorldView<'a> {
    pub agent_id: AgentId,
    pub position: Position,
    pub inventory: Inventory,
    pub utility: &'a Utility,
    pub quote: Quote,
    pub perception: &'a PerceptionView,
    pub cooldowns: &'a BTreeMap<AgentId, Tick>,
    pub tick: Tick,
    pub mode: Mode,
    pub config: &'a SimConfig,
}

impl WorldView<'_> {
    pub fn in_cooldown_with(&self, other: AgentId) -> bool {
        self.cooldowns
            .get(&other)
            .is_some_and(|&until| self.tick < until)
    }
}

/// Essential per-agent fields exposed to matching protocols.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub id: AgentId,
    pub position: Position,
    pub quote: Quote,
    pub paired_with: Option<AgentId>,
    pub cooldowns: BTreeMap<AgentId, Tick>,
}

/// Simulation-scoped immutable view for matching protocols.
pub struct ProtocolContext<'a> {
    pub tick: Tick,
    pub mode: Mode,
    pub config: &'a SimConfig,
    /// Indexed by agent id (ids are dense).
    pub agents: Vec<AgentContext>,
}

impl<'a> ProtocolContext<'a> {
    pub fn agent(&self, id: AgentId) -> &AgentContext {
        &self.agents[id as usize]
    }

    /// A pair is blocked while either side still holds a cooldown against
    /// the other.
    pub fn in_mutual_cooldown(&self, a: AgentId, b: AgentId) -> bool {
        let blocked = |from: &AgentContext, to: AgentId| {
            from.cooldowns
                .get(&to)
                .is_some_and(|&until| self.tick < until)
        };
        blocked(self.agent(a), b) || blocked(self.agent(b), a)
    }

    pub fn from_agents(
        agents: &[Agent],
        tick: Tick,
        mode: Mode,
        config: &'a SimConfig,
    ) -> ProtocolContext<'a> {
        ProtocolContext {
            tick,
            mode,
            config,
            agents: agents
                .iter()
                .map(|a| AgentContext {
                    id: a.id,
                    position: a.position,
                    quote: a.quote,
                    paired_with: a.paired_with,
                    cooldowns: a.trade_cooldowns.clone(),
                })
                .collect(),
        }
    }
}
