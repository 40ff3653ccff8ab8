//! The packed forest produced by chart parsing.
//!
//! Nodes and edges live in flat arenas addressed by index, so sharing a
//! tail node between thousands of edges costs one `usize` and the whole
//! structure drops in one deallocation per arena.

mod alignment;
mod kbest;
mod viterbi;

pub use alignment::WordAlignmentState;
pub use kbest::{Derivation, KBestExtractor};
pub use viterbi::{viterbi_alignment, viterbi_features, viterbi_score, viterbi_tokens};

use std::sync::Arc;

use crate::chart::SourcePath;
use crate::ff::DpState;
use crate::grammar::Rule;
use crate::vocab::WordId;

pub type NodeId = usize;
pub type EdgeId = usize;

/// Half-open source span `[start, end)` over sentence token positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// One rule application. `rule` is `None` only on final transitions into
/// the goal node. `tails` follow the rule's source nonterminal order.
#[derive(Debug)]
pub struct HyperEdge {
    pub rule: Option<Arc<Rule>>,
    pub tails: Vec<NodeId>,
    pub source_path: SourcePath,
    /// Weighted feature score of this edge alone.
    pub transition_score: f32,
    /// Transition score plus the best score of each tail.
    pub best_derivation_score: f32,
}

/// A chart item: one (span, lhs, DP states) equivalence class.
#[derive(Debug)]
pub struct HgNode {
    pub span: Span,
    pub lhs: WordId,
    /// One slot per registered stateful feature, indexed by state index.
    pub dp_states: Vec<Option<DpState>>,
    pub edges: Vec<EdgeId>,
    pub best_edge: Option<EdgeId>,
    /// Best (Viterbi) derivation score reachable at this node.
    pub score: f32,
    /// Outside estimate added to `score` for pruning comparisons.
    pub future_estimate: f32,
}

impl HgNode {
    /// DP state of the feature owning `index`. The registry guarantees every
    /// slot is filled before a node is built, so a miss is a programming
    /// error, not a data condition.
    pub fn dp_state(&self, index: usize) -> &DpState {
        match self.dp_states.get(index) {
            Some(Some(state)) => state,
            _ => panic!("node has no DP state in slot {index}"),
        }
    }

    pub fn pruning_estimate(&self) -> f32 {
        self.score + self.future_estimate
    }
}

#[derive(Debug, Default)]
pub struct HyperGraph {
    nodes: Vec<HgNode>,
    edges: Vec<HyperEdge>,
    goal: Option<NodeId>,
}

impl HyperGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: HgNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_edge(&mut self, edge: HyperEdge) -> EdgeId {
        self.edges.push(edge);
        self.edges.len() - 1
    }

    /// Hangs an existing edge off a node, promoting it to best edge if it
    /// improves the node's Viterbi score.
    pub fn attach_edge(&mut self, node_id: NodeId, edge_id: EdgeId) {
        let score = self.edges[edge_id].best_derivation_score;
        let node = &mut self.nodes[node_id];
        node.edges.push(edge_id);
        if node.best_edge.is_none() || score > node.score {
            node.best_edge = Some(edge_id);
            node.score = score;
        }
    }

    pub fn node(&self, id: NodeId) -> &HgNode {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &HyperEdge {
        &self.edges[id]
    }

    pub fn set_goal(&mut self, id: NodeId) {
        self.goal = Some(id);
    }

    pub fn goal(&self) -> Option<NodeId> {
        self.goal
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
