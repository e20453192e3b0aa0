// Matching protocols: form bilateral pairs from search preferences

use std::collections::BTreeSet;

use crate::effect::{Effect, Target};
use crate::error::EngineError;
use crate::trade_eval::evaluate_potential;
use crate::types::AgentId;
use crate::view::{ProtocolContext, SimRng};

use super::{MatchingProtocol, PreferenceMap};

pub fn three_pass(params: &serde_json::Value) -> Result<Box<dyn MatchingProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "matching",
            name: "three_pass_matching".to_string(),
            message: "takes no params".to_string(),
        });
    }
    Ok(Box::new(ThreePass))
}

pub fn random_matching(
    params: &serde_json::Value,
) -> Result<Box<dyn MatchingProtocol>, EngineError> {
    if !params.is_null() {
        return Err(EngineError::InvalidProtocolParams {
            category: "matching",
            name: "random_matching".to_string(),
            message: "takes no params".to_string(),
        });
    }
    Ok(Box::new(RandomMatching))
}

/// Unordered candidate pairs drawn from the preference lists: every agent
/// with at least one trade candidate, paired with each candidate, both
/// unpaired. One-sided interest is enough to make a pair a candidate.
fn candidate_pairs(ctx: &ProtocolContext<'_>, preferences: &PreferenceMap) -> BTreeSet<(AgentId, AgentId)> {
    let mut pairs = BTreeSet::new();
    for (&i, prefs) in preferences {
        if ctx.agent(i).paired_with.is_some() {
            continue;
        }
        for pref in prefs {
            let Target::Agent(j) = pref.target else {
                continue;
            };
            if i == j || ctx.agent(j).paired_with.is_some() {
                continue;
            }
            pairs.insert((i.min(j), i.max(j)));
        }
    }
    pairs
}

// === THREE-PASS GREEDY SURPLUS (default) ===

/// The historical "three-pass" matcher, specified as a single sorted
/// sweep: score every candidate pair with the quote-overlap evaluator,
/// discount by distance, sort deterministically, and greedily pair
/// endpoints that are still free. Never calls the trade discoverer.
pub struct ThreePass;

impl MatchingProtocol for ThreePass {
    fn name(&self) -> &'static str {
        "three_pass_matching"
    }

    fn form_pairs(
        &self,
        ctx: &ProtocolContext<'_>,
        preferences: &PreferenceMap,
        _rng: &mut SimRng,
    ) -> Vec<Effect> {
        let beta = ctx.config.beta;

        struct Candidate {
            i: AgentId,
            j: AgentId,
            discounted: f64,
        }

        let mut candidates: Vec<Candidate> = candidate_pairs(ctx, preferences)
            .into_iter()
            .filter(|&(i, j)| !ctx.in_mutual_cooldown(i, j))
            .filter_map(|(i, j)| {
                let potential = evaluate_potential(ctx.agent(i).quote, ctx.agent(j).quote);
                if !potential.is_feasible {
                    return None;
                }
                let d = ctx.agent(i).position.distance(ctx.agent(j).position);
                let discounted = potential.estimated_surplus * beta.powi(d as i32);
                // beta = 0 leaves only co-located candidates in play.
                (discounted > 0.0).then_some(Candidate { i, j, discounted })
            })
            .collect();

        // Sort key (−discounted, i, j): descending discounted score with
        // fully deterministic id tie-breaks. Feasibility already implies a
        // positive estimated surplus, so no sign key is needed.
        candidates.sort_by(|lhs, rhs| {
            rhs.discounted
                .total_cmp(&lhs.discounted)
                .then_with(|| lhs.i.cmp(&rhs.i))
                .then_with(|| lhs.j.cmp(&rhs.j))
        });

        let mut taken: BTreeSet<AgentId> = BTreeSet::new();
        let mut effects = Vec::new();
        for candidate in candidates {
            if taken.contains(&candidate.i) || taken.contains(&candidate.j) {
                continue;
            }
            taken.insert(candidate.i);
            taken.insert(candidate.j);
            effects.push(Effect::Pair {
                a: candidate.i,
                b: candidate.j,
            });
        }
        effects
    }
}

// === RANDOM MATCHING ===

/// Shuffles the eligible pool with the shared RNG and pairs adjacent
/// entries. A baseline matcher for comparing against surplus-driven
/// pairing; skips cooldown-blocked and overlap-free adjacencies.
pub struct RandomMatching;

impl MatchingProtocol for RandomMatching {
    fn name(&self) -> &'static str {
        "random_matching"
    }

    fn form_pairs(
        &self,
        ctx: &ProtocolContext<'_>,
        preferences: &PreferenceMap,
        rng: &mut SimRng,
    ) -> Vec<Effect> {
        use rand::seq::SliceRandom;

        let mut pool: Vec<AgentId> = BTreeSet::from_iter(
            candidate_pairs(ctx, preferences)
                .into_iter()
                .flat_map(|(i, j)| [i, j]),
        )
        .into_iter()
        .collect();
        pool.shuffle(rng);

        let mut effects = Vec::new();
        for window in pool.chunks(2) {
            let &[i, j] = window else { continue };
            if ctx.in_mutual_cooldown(i, j) {
                continue;
            }
            if !evaluate_potential(ctx.agent(i).quote, ctx.agent(j).quote).is_feasible {
                continue;
            }
            effects.push(Effect::Pair {
                a: i.min(j),
                b: i.max(j),
            });
        }
        effects
    }
}
