//! One chart cell: the items built over a single source span.
//!
//! Recombination happens here: two rule applications whose resulting
//! (lhs, DP states) signatures are equal land on the same node, so the
//! forest stays packed and k-best extraction sees every alternative.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::ff::DpState;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, HyperEdge, HyperGraph, NodeId, Span};
use crate::settings::{PruningPolicy, PruningSettings};
use crate::vocab::WordId;

use super::compute::NodeResult;
use super::SourcePath;

#[derive(Debug, PartialEq, Eq, Hash)]
struct Signature {
    lhs: WordId,
    states: Vec<Option<DpState>>,
}

#[derive(Debug)]
pub struct Cell {
    span: Span,
    index: HashMap<Signature, NodeId>,
    node_ids: Vec<NodeId>,
}

impl Cell {
    pub fn new(span: Span) -> Self {
        Cell {
            span,
            index: HashMap::new(),
            node_ids: Vec::new(),
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Node ids in this cell; sorted best-first once [`Cell::prune`] has run.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Records one scored rule application, recombining it into an existing
    /// node when the signature matches.
    pub fn add_edge(
        &mut self,
        graph: &mut HyperGraph,
        rule: Arc<Rule>,
        tails: Vec<NodeId>,
        path: SourcePath,
        result: NodeResult,
    ) -> NodeId {
        let lhs = rule.lhs;
        let edge_id = graph.add_edge(HyperEdge {
            rule: Some(rule),
            tails,
            source_path: path,
            transition_score: result.transition_cost,
            best_derivation_score: result.viterbi_cost,
        });

        let signature = Signature {
            lhs,
            states: result.dp_states.clone(),
        };
        let node_id = match self.index.get(&signature) {
            Some(&node_id) => node_id,
            None => {
                let node_id = graph.add_node(HgNode {
                    span: self.span,
                    lhs,
                    dp_states: result.dp_states,
                    edges: Vec::new(),
                    best_edge: None,
                    score: f32::NEG_INFINITY,
                    future_estimate: result.future_cost_estimate,
                });
                self.index.insert(signature, node_id);
                self.node_ids.push(node_id);
                node_id
            }
        };
        graph.attach_edge(node_id, edge_id);
        node_id
    }

    /// Applies the configured pruning policy, then orders the survivors
    /// best-first (ties broken by construction order).
    pub fn prune(&mut self, graph: &HyperGraph, pruning: &PruningSettings) {
        let before = self.node_ids.len();
        if before == 0 {
            return;
        }

        if pruning.per_lhs {
            let mut groups: HashMap<WordId, Vec<NodeId>> = HashMap::new();
            for &id in &self.node_ids {
                groups.entry(graph.node(id).lhs).or_default().push(id);
            }
            let mut kept = Vec::with_capacity(before);
            for ids in groups.into_values() {
                kept.extend(prune_group(ids, graph, pruning));
            }
            self.node_ids = kept;
        } else {
            self.node_ids = prune_group(std::mem::take(&mut self.node_ids), graph, pruning);
        }

        self.node_ids
            .sort_by(|&a, &b| match graph.node(b).score.total_cmp(&graph.node(a).score) {
                std::cmp::Ordering::Equal => a.cmp(&b),
                other => other,
            });

        if self.node_ids.len() < before {
            debug!(
                span.start = self.span.start,
                span.end = self.span.end,
                kept = self.node_ids.len(),
                dropped = before - self.node_ids.len(),
                "pruned cell"
            );
        }
    }
}

fn prune_group(mut ids: Vec<NodeId>, graph: &HyperGraph, pruning: &PruningSettings) -> Vec<NodeId> {
    match pruning.policy {
        PruningPolicy::Beam => {
            let best = ids
                .iter()
                .map(|&id| graph.node(id).pruning_estimate())
                .fold(f32::NEG_INFINITY, f32::max);
            let cutoff = best - pruning.beam_width;
            ids.retain(|&id| graph.node(id).pruning_estimate() >= cutoff);
            ids
        }
        PruningPolicy::Histogram => {
            ids.sort_by(|&a, &b| {
                match graph
                    .node(b)
                    .pruning_estimate()
                    .total_cmp(&graph.node(a).pruning_estimate())
                {
                    std::cmp::Ordering::Equal => a.cmp(&b),
                    other => other,
                }
            });
            ids.truncate(pruning.histogram_cap);
            ids
        }
    }
}
