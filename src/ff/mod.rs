//! Feature functions and the scoring protocol.
//!
//! Every hyperedge is scored by running all registered feature functions
//! once. A feature reports its contribution through an [`Accumulator`]: the
//! hot path uses [`ScoreAccumulator`] (dot product with the weight vector,
//! no allocation), and output assembly replays the same computation into a
//! [`FeatureAccumulator`] to recover the per-feature breakdown.

mod feature_vector;
mod state;

pub mod lm;
pub mod oov_penalty;
pub mod phrase_model;
pub mod word_penalty;

pub use feature_vector::{FeatureId, FeatureMap, FeatureVector};
pub use state::{DpState, NgramState};

use crate::chart::SourcePath;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;

/// Sink for feature contributions fired during edge scoring.
pub trait Accumulator {
    fn add(&mut self, id: FeatureId, value: f32);
}

/// Accumulates the weighted score directly; used during search.
pub struct ScoreAccumulator<'a> {
    score: f32,
    weights: &'a FeatureVector,
}

impl<'a> ScoreAccumulator<'a> {
    pub fn new(weights: &'a FeatureVector) -> Self {
        ScoreAccumulator { score: 0.0, weights }
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}

impl Accumulator for ScoreAccumulator<'_> {
    fn add(&mut self, id: FeatureId, value: f32) {
        self.score += value * self.weights.get_or_default(id);
    }
}

/// Accumulates raw feature values; used when assembling k-best output.
#[derive(Default)]
pub struct FeatureAccumulator {
    features: FeatureVector,
}

impl FeatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_features(self) -> FeatureVector {
        self.features
    }
}

impl Accumulator for FeatureAccumulator {
    fn add(&mut self, id: FeatureId, value: f32) {
        self.features.add(id, value);
    }
}

/// One feature function.
///
/// Stateless features score an edge from the rule alone. Stateful features
/// additionally read their [`DpState`] slot on the tail nodes and return the
/// state for the new node; they own a fixed `state_index` assigned at
/// registration.
pub trait FeatureFunction: Send + Sync {
    /// Feature-map name this function fires under (for weight lookup).
    fn name(&self) -> &str;

    /// Slot in each node's DP-state array, if stateful.
    fn state_index(&self) -> Option<usize> {
        None
    }

    /// Scores one edge application and returns the new DP state (stateful
    /// features only).
    fn compute(
        &self,
        rule: &Rule,
        tails: &[&HgNode],
        span: Span,
        path: &SourcePath,
        sentence: &Sentence,
        acc: &mut dyn Accumulator,
    ) -> Option<DpState>;

    /// Scores the transition onto the goal node, where no rule applies.
    fn compute_final(
        &self,
        _tail: &HgNode,
        _span: Span,
        _sentence: &Sentence,
        _acc: &mut dyn Accumulator,
    ) {
    }

    /// Outside estimate of the cost still to be paid for this state; added
    /// to the Viterbi score for pruning comparisons only.
    fn estimate_future_cost(&self, _state: &DpState, _sentence: &Sentence) -> f32 {
        0.0
    }

    /// Per-sentence teardown hook, called once when a sentence finishes.
    fn end_sentence(&self, _sentence: &Sentence) {}
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("feature functions {first} and {second} claim state index {index}")]
    DuplicateStateIndex {
        first: String,
        second: String,
        index: usize,
    },
    #[error("state indexes must be dense 0..{count}, missing {index}")]
    MissingStateIndex { count: usize, index: usize },
}

/// The fixed set of feature functions for a decoder instance.
#[derive(Default)]
pub struct FeatureRegistry {
    functions: Vec<Box<dyn FeatureFunction>>,
    state_count: usize,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ff: Box<dyn FeatureFunction>) {
        if ff.state_index().is_some() {
            self.state_count += 1;
        }
        self.functions.push(ff);
    }

    /// Checks that stateful features claim exactly the indexes
    /// `0..state_count`, each once. Node DP-state arrays are indexed by
    /// these slots, so gaps or collisions would corrupt recombination.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut claimed: Vec<Option<&str>> = vec![None; self.state_count];
        for ff in &self.functions {
            if let Some(index) = ff.state_index() {
                // out-of-range index leaves a lower slot unclaimed, reported below
                if let Some(slot) = claimed.get_mut(index) {
                    if let Some(first) = *slot {
                        return Err(RegistryError::DuplicateStateIndex {
                            first: first.to_string(),
                            second: ff.name().to_string(),
                            index,
                        });
                    }
                    *slot = Some(ff.name());
                }
            }
        }
        if let Some(index) = claimed.iter().position(Option::is_none) {
            return Err(RegistryError::MissingStateIndex {
                count: self.state_count,
                index,
            });
        }
        Ok(())
    }

    pub fn functions(&self) -> &[Box<dyn FeatureFunction>] {
        &self.functions
    }

    /// Number of DP-state slots each node carries.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
