//! Edge scoring: runs every feature function over one rule application.

use crate::ff::{
    DpState, FeatureAccumulator, FeatureRegistry, FeatureVector, ScoreAccumulator,
};
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;

use super::SourcePath;

/// Everything the chart needs to know about one candidate edge: its own
/// weighted score, the Viterbi score through it, the outside estimate used
/// for pruning, and the DP states the resulting node would carry.
#[derive(Debug)]
pub struct NodeResult {
    pub transition_cost: f32,
    pub viterbi_cost: f32,
    pub future_cost_estimate: f32,
    pub dp_states: Vec<Option<DpState>>,
}

impl NodeResult {
    /// Score used for pruning comparisons; never reported in output.
    pub fn pruning_estimate(&self) -> f32 {
        self.viterbi_cost + self.future_cost_estimate
    }
}

/// Scores one application of `rule` to `tails` over `span`.
pub fn compute_node_result(
    registry: &FeatureRegistry,
    weights: &FeatureVector,
    rule: &Rule,
    tails: &[&HgNode],
    span: Span,
    path: &SourcePath,
    sentence: &Sentence,
) -> NodeResult {
    let tail_total: f32 = tails.iter().map(|t| t.score).sum();
    let mut acc = ScoreAccumulator::new(weights);
    let mut dp_states: Vec<Option<DpState>> = vec![None; registry.state_count()];
    let mut future = 0.0;

    for ff in registry.functions() {
        let state = ff.compute(rule, tails, span, path, sentence, &mut acc);
        if let Some(index) = ff.state_index() {
            let state = state
                .unwrap_or_else(|| panic!("stateful feature {} produced no state", ff.name()));
            future += ff.estimate_future_cost(&state, sentence);
            dp_states[index] = Some(state);
        }
    }

    let transition = acc.score() + path.score();
    NodeResult {
        transition_cost: transition,
        viterbi_cost: tail_total + transition,
        future_cost_estimate: future,
        dp_states,
    }
}

/// Scores the rule-less transition from a goal candidate onto the goal node.
pub fn compute_final_cost(
    registry: &FeatureRegistry,
    weights: &FeatureVector,
    tail: &HgNode,
    span: Span,
    sentence: &Sentence,
) -> f32 {
    let mut acc = ScoreAccumulator::new(weights);
    for ff in registry.functions() {
        ff.compute_final(tail, span, sentence, &mut acc);
    }
    acc.score()
}

/// Replays edge scoring into a raw feature vector; used when assembling
/// k-best output, never during search.
pub fn compute_transition_features(
    registry: &FeatureRegistry,
    rule: Option<&Rule>,
    tails: &[&HgNode],
    span: Span,
    path: &SourcePath,
    sentence: &Sentence,
) -> FeatureVector {
    let mut acc = FeatureAccumulator::new();
    match rule {
        Some(rule) => {
            for ff in registry.functions() {
                ff.compute(rule, tails, span, path, sentence, &mut acc);
            }
        }
        None => {
            for ff in registry.functions() {
                ff.compute_final(tails[0], span, sentence, &mut acc);
            }
        }
    }
    acc.into_features()
}
