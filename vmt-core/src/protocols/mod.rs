// === PROTOCOLS ===
//
// Search, matching, and bargaining are pluggable strategies. Each category
// has a trait with one or two primary operations, a name-keyed registry,
// and default implementations shipped with the engine. Protocols read
// immutable views, draw randomness only from the shared RNG, and return
// effects for the host phase to validate and apply.

pub mod bargaining;
pub mod matching;
pub mod search;

use std::collections::{BTreeMap, HashMap};

use crate::agent::Agent;
use crate::config::{ProtocolSpec, SimConfig};
use crate::effect::{Effect, Target, UnpairReason};
use crate::error::EngineError;
use crate::types::AgentId;
use crate::view::{ProtocolContext, SimRng, WorldView};

/// One ranked search candidate: a trade partner or a resource cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preference {
    pub target: Target,
    pub score: f64,
}

/// Per-agent preference lists collected by the decision phase and handed
/// to the matching protocol.
pub type PreferenceMap = BTreeMap<AgentId, Vec<Preference>>;

pub trait SearchProtocol {
    fn name(&self) -> &'static str;

    /// Ranked candidate list for this agent, best first.
    fn build_preferences(&self, view: &WorldView<'_>, rng: &mut SimRng) -> Vec<Preference>;

    /// Targeting effects for this agent (SetTarget / ClaimResource /
    /// ReleaseClaim). An empty list means idle this tick.
    fn select_target(&self, view: &WorldView<'_>, rng: &mut SimRng) -> Vec<Effect>;
}

pub trait MatchingProtocol {
    fn name(&self) -> &'static str;

    /// Pair effects formed from the global context and preference lists.
    fn form_pairs(
        &self,
        ctx: &ProtocolContext<'_>,
        preferences: &PreferenceMap,
        rng: &mut SimRng,
    ) -> Vec<Effect>;
}

pub trait BargainingProtocol {
    fn name(&self) -> &'static str;

    /// Negotiate between a paired pair. Agents arrive as read-only
    /// references to their full state, `state` is the read-only scratch
    /// map multi-tick variants fill through InternalStateUpdate effects.
    /// Returns a single Trade (stay paired), a single Unpair (dissolve +
    /// cooldown), or an empty list meaning "still negotiating".
    fn negotiate(
        &self,
        pair: (AgentId, AgentId),
        agents: (&Agent, &Agent),
        config: &SimConfig,
        state: &crate::world::ProtocolState,
        rng: &mut SimRng,
    ) -> Vec<Effect>;

    /// Called when a pair has negotiated for `negotiation_timeout_ticks`
    /// without producing a trade. The default dissolves the pair.
    fn on_timeout(&self, pair: (AgentId, AgentId), _agents: (&Agent, &Agent)) -> Vec<Effect> {
        vec![Effect::Unpair {
            a: pair.0,
            b: pair.1,
            reason: UnpairReason::Timeout,
        }]
    }
}

// === REGISTRY ===

type SearchCtor = fn(&serde_json::Value) -> Result<Box<dyn SearchProtocol>, EngineError>;
type MatchingCtor = fn(&serde_json::Value) -> Result<Box<dyn MatchingProtocol>, EngineError>;
type BargainingCtor = fn(&serde_json::Value) -> Result<Box<dyn BargainingProtocol>, EngineError>;

/// Name → constructor maps for the three protocol categories. Populated at
/// engine startup; unknown names fail loudly as contract violations.
pub struct ProtocolRegistry {
    search: HashMap<&'static str, SearchCtor>,
    matching: HashMap<&'static str, MatchingCtor>,
    bargaining: HashMap<&'static str, BargainingCtor>,
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ProtocolRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            search: HashMap::new(),
            matching: HashMap::new(),
            bargaining: HashMap::new(),
        };
        registry.register_search("distance_discounted_search", search::distance_discounted);
        registry.register_search("random_walk_search", search::random_walk);
        registry.register_matching("three_pass_matching", matching::three_pass);
        registry.register_matching("random_matching", matching::random_matching);
        registry.register_bargaining("compensating_block", bargaining::compensating_block);
        registry.register_bargaining("split_difference", bargaining::split_difference);
        registry.register_bargaining("take_it_or_leave_it", bargaining::take_it_or_leave_it);
        registry
    }

    pub fn register_search(&mut self, name: &'static str, ctor: SearchCtor) {
        self.search.insert(name, ctor);
    }

    pub fn register_matching(&mut self, name: &'static str, ctor: MatchingCtor) {
        self.matching.insert(name, ctor);
    }

    pub fn register_bargaining(&mut self, name: &'static str, ctor: BargainingCtor) {
        self.bargaining.insert(name, ctor);
    }

    pub fn build_search(&self, spec: &ProtocolSpec) -> Result<Box<dyn SearchProtocol>, EngineError> {
        let ctor = self
            .search
            .get(spec.name.as_str())
            .ok_or_else(|| EngineError::UnknownProtocol {
                category: "search",
                name: spec.name.clone(),
            })?;
        ctor(&spec.params)
    }

    pub fn build_matching(
        &self,
        spec: &ProtocolSpec,
    ) -> Result<Box<dyn MatchingProtocol>, EngineError> {
        let ctor = self
            .matching
            .get(spec.name.as_str())
            .ok_or_else(|| EngineError::UnknownProtocol {
                category: "matching",
                name: spec.name.clone(),
            })?;
        ctor(&spec.params)
    }

    pub fn build_bargaining(
        &self,
        spec: &ProtocolSpec,
    ) -> Result<Box<dyn BargainingProtocol>, EngineError> {
        let ctor = self
            .bargaining
            .get(spec.name.as_str())
            .ok_or_else(|| EngineError::UnknownProtocol {
                category: "bargaining",
                name: spec.name.clone(),
            })?;
        ctor(&spec.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_and_unknown_names_fail() {
        let registry = ProtocolRegistry::with_defaults();
        assert!(registry
            .build_search(&ProtocolSpec::named("distance_discounted_search"))
            .is_ok());
        assert!(registry
            .build_matching(&ProtocolSpec::named("three_pass_matching"))
            .is_ok());
        assert!(registry
            .build_bargaining(&ProtocolSpec::named("compensating_block"))
            .is_ok());

        let err = registry.build_bargaining(&ProtocolSpec::named("haggle_forever"));
        assert!(matches!(err, Err(EngineError::UnknownProtocol { .. })));
    }
}
