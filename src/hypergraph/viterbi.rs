//! Best-derivation walks over a finished hypergraph.

use crate::chart::compute_transition_features;
use crate::ff::{FeatureRegistry, FeatureVector};
use crate::sentence::Sentence;
use crate::vocab::{is_nonterminal, WordId};

use super::{HgNode, HyperGraph, NodeId, WordAlignmentState};

/// Target tokens of the single best derivation, markers included.
pub fn viterbi_tokens(graph: &HyperGraph) -> Vec<WordId> {
    let mut out = Vec::new();
    if let Some(goal) = graph.goal() {
        node_tokens(graph, goal, &mut out);
    }
    out
}

fn node_tokens(graph: &HyperGraph, node_id: NodeId, out: &mut Vec<WordId>) {
    let Some(edge_id) = graph.node(node_id).best_edge else {
        return;
    };
    let edge = graph.edge(edge_id);
    match &edge.rule {
        None => node_tokens(graph, edge.tails[0], out),
        Some(rule) => {
            for &tok in &rule.target {
                if is_nonterminal(tok) {
                    node_tokens(graph, edge.tails[(-tok - 1) as usize], out);
                } else {
                    out.push(tok);
                }
            }
        }
    }
}

/// Word alignment of the best derivation, assembled bottom-up along the
/// best-edge walk.
pub fn viterbi_alignment(graph: &HyperGraph) -> String {
    graph
        .goal()
        .and_then(|goal| node_alignment(graph, goal))
        .map(|state| state.final_string())
        .unwrap_or_default()
}

fn node_alignment(graph: &HyperGraph, node_id: NodeId) -> Option<WordAlignmentState> {
    let node = graph.node(node_id);
    let edge = graph.edge(node.best_edge?);
    match &edge.rule {
        None => node_alignment(graph, edge.tails[0]),
        Some(rule) => {
            let mut state = WordAlignmentState::new(rule, node.span.start);
            for &tail in &edge.tails {
                state.substitute_in(node_alignment(graph, tail)?);
            }
            Some(state)
        }
    }
}

/// Weighted score of the best derivation.
pub fn viterbi_score(graph: &HyperGraph) -> f32 {
    graph
        .goal()
        .map(|goal| graph.node(goal).score)
        .unwrap_or(f32::NEG_INFINITY)
}

/// Per-feature breakdown of the best derivation, replayed edge by edge.
pub fn viterbi_features(
    graph: &HyperGraph,
    registry: &FeatureRegistry,
    sentence: &Sentence,
) -> FeatureVector {
    let mut features = FeatureVector::new();
    if let Some(goal) = graph.goal() {
        node_features(graph, registry, sentence, goal, &mut features);
    }
    features
}

fn node_features(
    graph: &HyperGraph,
    registry: &FeatureRegistry,
    sentence: &Sentence,
    node_id: NodeId,
    features: &mut FeatureVector,
) {
    let node = graph.node(node_id);
    let Some(edge_id) = node.best_edge else {
        return;
    };
    let edge = graph.edge(edge_id);
    let tails: Vec<&HgNode> = edge.tails.iter().map(|&t| graph.node(t)).collect();
    let edge_features = compute_transition_features(
        registry,
        edge.rule.as_deref(),
        &tails,
        node.span,
        &edge.source_path,
        sentence,
    );
    features.add_in_place(&edge_features);
    for &tail in &edge.tails {
        node_features(graph, registry, sentence, tail, features);
    }
}
