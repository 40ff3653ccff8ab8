//! Stateful n-gram language model feature.
//!
//! Scores every complete n-gram the moment its full context exists, and
//! carries boundary words as DP state so that n-grams crossing constituent
//! boundaries are charged exactly once, on the edge that completes them.
//! Words whose full left context never materializes inside the derivation
//! are settled on the goal transition ([`LanguageModel::compute_final`]).

mod ngram;

pub use ngram::NgramModel;

use crate::chart::SourcePath;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;
use crate::vocab::{is_nonterminal, WordId};

use super::{Accumulator, DpState, FeatureFunction, FeatureId, NgramState};

pub struct LanguageModel {
    feature_id: FeatureId,
    state_index: usize,
    weight: f32,
    model: NgramModel,
    start_id: WordId,
}

impl LanguageModel {
    pub const NAME: &'static str = "lm_0";

    pub fn new(
        feature_id: FeatureId,
        state_index: usize,
        weight: f32,
        model: NgramModel,
        start_id: WordId,
    ) -> Self {
        LanguageModel {
            feature_id,
            state_index,
            weight,
            model,
            start_id,
        }
    }

    fn tail_state<'a>(&self, tail: &'a HgNode) -> &'a NgramState {
        match tail.dp_state(self.state_index) {
            DpState::Ngram(state) => state,
        }
    }
}

impl FeatureFunction for LanguageModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn state_index(&self) -> Option<usize> {
        Some(self.state_index)
    }

    fn compute(
        &self,
        rule: &Rule,
        tails: &[&HgNode],
        _span: Span,
        _path: &SourcePath,
        _sentence: &Sentence,
        acc: &mut dyn Accumulator,
    ) -> Option<DpState> {
        let order = self.model.order();
        // sliding window over the target string; never longer than `order`
        let mut current: Vec<WordId> = Vec::with_capacity(order);
        let mut left_context: Option<Vec<WordId>> = None;

        let push = |word: WordId,
                        current: &mut Vec<WordId>,
                        left_context: &mut Option<Vec<WordId>>,
                        acc: &mut dyn Accumulator| {
            current.push(word);
            if current.len() == order {
                acc.add(self.feature_id, self.model.log_prob(current));
                current.remove(0);
            }
            if left_context.is_none() && current.len() + 1 == order {
                *left_context = Some(current.clone());
            }
        };

        for &tok in &rule.target {
            if is_nonterminal(tok) {
                let tail = tails[(-tok - 1) as usize];
                let state = self.tail_state(tail);
                // The tail's interior is already paid for; feeding its left
                // context completes exactly the n-grams that cross into it.
                for &word in &state.left {
                    push(word, &mut current, &mut left_context, acc);
                }
                // From here on only the tail's boundary words matter.
                let start = current.len() - state.right.len();
                current[start..].copy_from_slice(&state.right);
            } else {
                push(tok, &mut current, &mut left_context, acc);
            }
        }

        let left = left_context.unwrap_or_else(|| current.clone());
        Some(DpState::Ngram(NgramState::new(left, current)))
    }

    /// Settles the words of the goal state's left context, which were never
    /// scored with full context inside the derivation. Starts from bigrams:
    /// the leading `<s>` is a context marker, not a predicted event.
    fn compute_final(
        &self,
        tail: &HgNode,
        _span: Span,
        _sentence: &Sentence,
        acc: &mut dyn Accumulator,
    ) {
        let state = self.tail_state(tail);
        let order = self.model.order();
        let mut ngram: Vec<WordId> = Vec::with_capacity(order);
        for &word in &state.left {
            ngram.push(word);
            if ngram.len() >= 2 {
                acc.add(self.feature_id, self.model.log_prob(&ngram));
            }
            if ngram.len() == order {
                ngram.remove(0);
            }
        }
    }

    /// Optimistic estimate for the left-context words: score each with only
    /// the in-state context available. `<s>` at position 0 is free, matching
    /// the final transition.
    fn estimate_future_cost(&self, state: &DpState, _sentence: &Sentence) -> f32 {
        let DpState::Ngram(state) = state;
        let mut estimate = 0.0;
        for (i, _) in state.left.iter().enumerate() {
            if i == 0 && state.left[0] == self.start_id {
                continue;
            }
            estimate += self.model.log_prob(&state.left[..=i]);
        }
        self.weight * estimate
    }
}
