//! Bottom-up CYK parsing over source spans.
//!
//! Spans are processed in order of increasing width, so every possible tail
//! node exists before any edge that needs it. Rule matching walks the
//! grammar tries left to right over a span, branching into completed
//! narrower cells at nonterminal arcs.

mod cell;
mod compute;
mod source_path;

pub use cell::Cell;
pub use compute::{
    compute_final_cost, compute_node_result, compute_transition_features, NodeResult,
};
pub use source_path::SourcePath;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, warn};

use crate::decoder::DecoderConfig;
use crate::grammar::{Grammar, TrieNode};
use crate::hypergraph::{HgNode, HyperEdge, HyperGraph, NodeId, Span};
use crate::sentence::Sentence;

pub struct Chart<'a> {
    config: &'a DecoderConfig,
    grammars: &'a [&'a Grammar],
    sentence: &'a Sentence,
    graph: HyperGraph,
    cells: HashMap<(usize, usize), Cell>,
}

impl<'a> Chart<'a> {
    pub fn new(
        config: &'a DecoderConfig,
        grammars: &'a [&'a Grammar],
        sentence: &'a Sentence,
    ) -> Self {
        Chart {
            config,
            grammars,
            sentence,
            graph: HyperGraph::new(),
            cells: HashMap::new(),
        }
    }

    /// Parses the sentence and returns the packed forest. A missing goal
    /// node in the result means the parse failed (or ran out of time).
    pub fn parse(mut self) -> HyperGraph {
        let _span = debug_span!("parse", sentence = self.sentence.id()).entered();
        let n = self.sentence.len();
        let budget = self.config.settings.search.time_budget_ms;
        let deadline =
            (budget > 0).then(|| Instant::now() + Duration::from_millis(budget));

        for width in 1..=n {
            if let Some(deadline) = deadline {
                if Instant::now() > deadline {
                    warn!(
                        sentence = self.sentence.id(),
                        width, "time budget exhausted, abandoning parse"
                    );
                    return HyperGraph::new();
                }
            }
            for start in 0..=(n - width) {
                self.build_cell(Span::new(start, start + width));
            }
        }

        self.finish()
    }

    fn build_cell(&mut self, span: Span) {
        let mut matches = Vec::new();
        for grammar in self.grammars {
            let limit = grammar.span_limit();
            if limit > 0 && span.width() > limit {
                continue;
            }
            let mut tails = Vec::new();
            self.collect_matches(grammar.root(), span.start, span.end, &mut tails, &mut matches);
        }

        let mut cell = Cell::new(span);
        for (trie, tails) in matches {
            for rule in trie.rules() {
                let path = SourcePath::free();
                let result = {
                    let tail_nodes: Vec<&HgNode> =
                        tails.iter().map(|&id| self.graph.node(id)).collect();
                    compute_node_result(
                        &self.config.registry,
                        &self.config.weights,
                        rule,
                        &tail_nodes,
                        span,
                        &path,
                        self.sentence,
                    )
                };
                cell.add_edge(&mut self.graph, Arc::clone(rule), tails.clone(), path, result);
            }
        }

        cell.prune(&self.graph, &self.config.settings.pruning);
        if !cell.is_empty() {
            self.cells.insert((span.start, span.end), cell);
        }
    }

    /// Walks `trie` over `[pos, end)`, pushing every completed match. At a
    /// nonterminal arc the walk branches into each already-built cell over a
    /// proper subspan; the cell for the span under construction is not in
    /// the map yet, which also rules out unary self-loops.
    fn collect_matches<'g>(
        &self,
        trie: &'g TrieNode,
        pos: usize,
        end: usize,
        tails: &mut Vec<NodeId>,
        out: &mut Vec<(&'g TrieNode, Vec<NodeId>)>,
    ) {
        if pos == end {
            if !trie.rules().is_empty() {
                out.push((trie, tails.clone()));
            }
            return;
        }

        if let Some(child) = trie.child(self.sentence.word(pos)) {
            self.collect_matches(child, pos + 1, end, tails, out);
        }

        for mid in (pos + 1)..=end {
            let Some(cell) = self.cells.get(&(pos, mid)) else {
                continue;
            };
            for (key, child) in trie.nonterminal_children() {
                for &node_id in cell.node_ids() {
                    if self.graph.node(node_id).lhs == -key {
                        tails.push(node_id);
                        self.collect_matches(child, mid, end, tails, out);
                        tails.pop();
                    }
                }
            }
        }
    }

    /// Folds every full-span goal item into the single goal node via
    /// rule-less final transitions.
    fn finish(mut self) -> HyperGraph {
        let n = self.sentence.len();
        let span = Span::new(0, n);
        let Some(cell) = self.cells.get(&(0, n)) else {
            debug!(sentence = self.sentence.id(), "no full-span cell, parse failed");
            return self.graph;
        };

        let mut candidates = Vec::new();
        for &id in cell.node_ids() {
            let node = self.graph.node(id);
            if node.lhs != self.config.goal_id {
                continue;
            }
            let final_cost = compute_final_cost(
                &self.config.registry,
                &self.config.weights,
                node,
                span,
                self.sentence,
            );
            candidates.push((id, final_cost));
        }
        if candidates.is_empty() {
            debug!(sentence = self.sentence.id(), "no goal item, parse failed");
            return self.graph;
        }

        let goal = self.graph.add_node(HgNode {
            span,
            lhs: self.config.goal_id,
            dp_states: Vec::new(),
            edges: Vec::new(),
            best_edge: None,
            score: f32::NEG_INFINITY,
            future_estimate: 0.0,
        });
        for (id, final_cost) in candidates {
            let best = self.graph.node(id).score + final_cost;
            let edge = self.graph.add_edge(HyperEdge {
                rule: None,
                tails: vec![id],
                source_path: SourcePath::free(),
                transition_score: final_cost,
                best_derivation_score: best,
            });
            self.graph.attach_edge(goal, edge);
        }
        self.graph.set_goal(goal);
        debug!(
            sentence = self.sentence.id(),
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "chart complete"
        );
        self.graph
    }
}
