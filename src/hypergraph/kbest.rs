//! Lazy k-best derivation extraction.
//!
//! Per-node frontiers enumerate derivations best-first: a node's next-best
//! derivation is always the best unexplored candidate, and exploring a
//! candidate only materializes the tail derivations it actually references.
//! Work is therefore proportional to what the caller consumes, not to the
//! forest size.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;

use crate::chart::compute_transition_features;
use crate::ff::{FeatureRegistry, FeatureVector};
use crate::sentence::Sentence;
use crate::vocab::{is_nonterminal, Vocabulary, WordId};

use super::{EdgeId, HgNode, HyperGraph, NodeId, WordAlignmentState};

/// One fully realized derivation at the goal node.
#[derive(Debug)]
pub struct Derivation {
    /// Target tokens, sentence markers included.
    pub tokens: Vec<WordId>,
    /// Surface string, markers stripped.
    pub text: String,
    pub score: f32,
    pub features: FeatureVector,
    /// `src-trg` word alignment pairs, marker-adjusted.
    pub alignment: String,
}

/// A not-yet-extracted derivation: one edge plus a rank into each tail's
/// own derivation list.
struct Candidate {
    edge_id: EdgeId,
    ranks: Vec<usize>,
    score: f32,
    /// Creation order; earlier candidates win score ties, which pins the
    /// extraction order for equal-scoring derivations.
    seq: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// An extracted derivation at some node: the winning candidate, frozen.
struct Extracted {
    edge_id: EdgeId,
    ranks: Vec<usize>,
    score: f32,
}

#[derive(Default)]
struct VirtualNode {
    extracted: Vec<Extracted>,
    frontier: BinaryHeap<Candidate>,
    visited: HashSet<(EdgeId, Vec<usize>)>,
}

pub struct KBestExtractor<'a> {
    graph: &'a HyperGraph,
    registry: &'a FeatureRegistry,
    sentence: &'a Sentence,
    vocab: &'a Vocabulary,
    unique: bool,
    nodes: Vec<Option<VirtualNode>>,
    seq: u64,
}

impl<'a> KBestExtractor<'a> {
    pub fn new(
        graph: &'a HyperGraph,
        registry: &'a FeatureRegistry,
        sentence: &'a Sentence,
        vocab: &'a Vocabulary,
        unique: bool,
    ) -> Self {
        KBestExtractor {
            graph,
            registry,
            sentence,
            vocab,
            unique,
            nodes: (0..graph.node_count()).map(|_| None).collect(),
            seq: 0,
        }
    }

    /// The `k` best derivations of the goal node, best first. With
    /// uniqueness on, derivations realizing an already-seen surface string
    /// are skipped and extraction continues. Fewer than `k` results means
    /// the forest was exhausted.
    pub fn derivations(&mut self, k: usize) -> Vec<Derivation> {
        let Some(goal) = self.graph.goal() else {
            return Vec::new();
        };
        let want = k.max(1);
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut rank = 0;
        while out.len() < want {
            if !self.lazy_kth(goal, rank) {
                break;
            }
            let derivation = self.realize_derivation(goal, rank);
            rank += 1;
            if self.unique && !seen.insert(derivation.text.clone()) {
                continue;
            }
            out.push(derivation);
        }
        debug!(
            sentence = self.sentence.id(),
            requested = want,
            extracted = out.len(),
            explored = rank,
            "k-best extraction done"
        );
        out
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Ensures the node has at least `k + 1` extracted derivations; false
    /// once the node's frontier runs dry first.
    fn lazy_kth(&mut self, node_id: NodeId, k: usize) -> bool {
        self.ensure_init(node_id);
        loop {
            let vn = self.nodes[node_id].as_mut().expect("initialized above");
            if vn.extracted.len() > k {
                return true;
            }
            let Some(candidate) = vn.frontier.pop() else {
                return false;
            };
            self.push_successors(node_id, &candidate);
            self.nodes[node_id]
                .as_mut()
                .expect("initialized above")
                .extracted
                .push(Extracted {
                    edge_id: candidate.edge_id,
                    ranks: candidate.ranks,
                    score: candidate.score,
                });
        }
    }

    /// Seeds the node's frontier with the best candidate of each incoming
    /// edge.
    fn ensure_init(&mut self, node_id: NodeId) {
        if self.nodes[node_id].is_some() {
            return;
        }
        self.nodes[node_id] = Some(VirtualNode::default());
        let edge_ids = self.graph.node(node_id).edges.clone();
        for edge_id in edge_ids {
            let ranks = vec![0; self.graph.edge(edge_id).tails.len()];
            if let Some(score) = self.candidate_score(edge_id, &ranks) {
                let seq = self.next_seq();
                let vn = self.nodes[node_id].as_mut().expect("set above");
                vn.visited.insert((edge_id, ranks.clone()));
                vn.frontier.push(Candidate {
                    edge_id,
                    ranks,
                    score,
                    seq,
                });
            }
        }
    }

    /// Pushes the next candidate along every tail dimension.
    fn push_successors(&mut self, node_id: NodeId, candidate: &Candidate) {
        let tail_count = candidate.ranks.len();
        for i in 0..tail_count {
            let mut ranks = candidate.ranks.clone();
            ranks[i] += 1;
            let already = self.nodes[node_id]
                .as_ref()
                .expect("initialized")
                .visited
                .contains(&(candidate.edge_id, ranks.clone()));
            if already {
                continue;
            }
            let Some(score) = self.candidate_score(candidate.edge_id, &ranks) else {
                continue;
            };
            let seq = self.next_seq();
            let vn = self.nodes[node_id].as_mut().expect("initialized");
            vn.visited.insert((candidate.edge_id, ranks.clone()));
            vn.frontier.push(Candidate {
                edge_id: candidate.edge_id,
                ranks,
                score,
                seq,
            });
        }
    }

    /// Score of applying `edge_id` with the given tail ranks; `None` if some
    /// tail cannot produce its requested rank.
    fn candidate_score(&mut self, edge_id: EdgeId, ranks: &[usize]) -> Option<f32> {
        let edge = self.graph.edge(edge_id);
        let mut score = edge.transition_score;
        let tails = edge.tails.clone();
        for (i, &tail) in tails.iter().enumerate() {
            if !self.lazy_kth(tail, ranks[i]) {
                return None;
            }
            score += self.nodes[tail].as_ref().expect("realized").extracted[ranks[i]].score;
        }
        Some(score)
    }

    fn realize_derivation(&self, node_id: NodeId, k: usize) -> Derivation {
        let mut tokens = Vec::new();
        let mut features = FeatureVector::new();
        let alignment_state = self.realize(node_id, k, &mut tokens, &mut features);
        let text = tokens
            .iter()
            .filter(|&&t| t != self.vocab.start_id() && t != self.vocab.stop_id())
            .map(|&t| self.vocab.word(t))
            .collect::<Vec<_>>()
            .join(" ");
        let score = self.nodes[node_id].as_ref().expect("realized").extracted[k].score;
        Derivation {
            tokens,
            text,
            score,
            features,
            alignment: alignment_state.final_string(),
        }
    }

    fn realize(
        &self,
        node_id: NodeId,
        k: usize,
        tokens: &mut Vec<WordId>,
        features: &mut FeatureVector,
    ) -> WordAlignmentState {
        let extracted = &self.nodes[node_id].as_ref().expect("realized").extracted[k];
        let node = self.graph.node(node_id);
        let edge = self.graph.edge(extracted.edge_id);
        let tail_nodes: Vec<&HgNode> = edge.tails.iter().map(|&t| self.graph.node(t)).collect();
        features.add_in_place(&compute_transition_features(
            self.registry,
            edge.rule.as_deref(),
            &tail_nodes,
            node.span,
            &edge.source_path,
            self.sentence,
        ));

        match &edge.rule {
            None => self.realize(edge.tails[0], extracted.ranks[0], tokens, features),
            Some(rule) => {
                // realize children in source (tail) order, splicing their
                // alignment states into this rule's slots as we go
                let mut state = WordAlignmentState::new(rule, node.span.start);
                let mut children: Vec<Option<Vec<WordId>>> = Vec::with_capacity(edge.tails.len());
                for (i, &tail) in edge.tails.iter().enumerate() {
                    let mut child_tokens = Vec::new();
                    let child_state =
                        self.realize(tail, extracted.ranks[i], &mut child_tokens, features);
                    state.substitute_in(child_state);
                    children.push(Some(child_tokens));
                }
                for &tok in &rule.target {
                    if is_nonterminal(tok) {
                        let child = children[(-tok - 1) as usize]
                            .take()
                            .expect("each slot referenced once");
                        tokens.extend(child);
                    } else {
                        tokens.push(tok);
                    }
                }
                state
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::SourcePath;
    use crate::grammar::Rule;
    use crate::hypergraph::{HyperEdge, Span};
    use std::sync::Arc;

    fn leaf_rule(vocab: &Vocabulary, word: &str) -> Arc<Rule> {
        let id = vocab.id(word);
        Arc::new(Rule {
            lhs: vocab.id("X"),
            source: vec![vocab.id("src")],
            target: vec![id],
            arity: 0,
            features: FeatureVector::new(),
            alignment: vec![(0, 0)],
            owner: 0,
        })
    }

    fn node(span: Span, lhs: WordId) -> HgNode {
        HgNode {
            span,
            lhs,
            dp_states: Vec::new(),
            edges: Vec::new(),
            best_edge: None,
            score: f32::NEG_INFINITY,
            future_estimate: 0.0,
        }
    }

    fn leaf_edge(graph: &mut HyperGraph, rule: Arc<Rule>, score: f32) -> EdgeId {
        graph.add_edge(HyperEdge {
            rule: Some(rule),
            tails: vec![],
            source_path: SourcePath::default(),
            transition_score: score,
            best_derivation_score: score,
        })
    }

    fn goal_over(graph: &mut HyperGraph, tail: NodeId, vocab: &Vocabulary) -> NodeId {
        let goal = graph.add_node(node(Span::new(0, 3), vocab.id("GOAL")));
        let best = graph.node(tail).score;
        let edge = graph.add_edge(HyperEdge {
            rule: None,
            tails: vec![tail],
            source_path: SourcePath::default(),
            transition_score: 0.0,
            best_derivation_score: best,
        });
        graph.attach_edge(goal, edge);
        graph.set_goal(goal);
        goal
    }

    fn extract(
        graph: &HyperGraph,
        vocab: &Vocabulary,
        sentence: &Sentence,
        registry: &FeatureRegistry,
        unique: bool,
        k: usize,
    ) -> Vec<Derivation> {
        KBestExtractor::new(graph, registry, sentence, vocab, unique).derivations(k)
    }

    #[test]
    fn alternatives_come_out_best_first() {
        let vocab = Vocabulary::new();
        let sentence = Sentence::new(0, "src", &vocab);
        let registry = FeatureRegistry::new();
        let mut graph = HyperGraph::new();

        let n = graph.add_node(node(Span::new(1, 2), vocab.id("X")));
        let e1 = leaf_edge(&mut graph, leaf_rule(&vocab, "A"), -1.0);
        let e2 = leaf_edge(&mut graph, leaf_rule(&vocab, "B"), -2.0);
        graph.attach_edge(n, e1);
        graph.attach_edge(n, e2);

        // marker wrapper, glue style: <s> [X,1] </s>
        let wrapper = Arc::new(Rule {
            lhs: vocab.id("GOAL"),
            source: vec![vocab.start_id(), -vocab.id("X"), vocab.stop_id()],
            target: vec![vocab.start_id(), -1, vocab.stop_id()],
            arity: 1,
            features: FeatureVector::new(),
            alignment: Vec::new(),
            owner: 0,
        });
        let full = graph.add_node(node(Span::new(0, 3), vocab.id("GOAL")));
        let wrapper_edge = graph.add_edge(HyperEdge {
            rule: Some(wrapper),
            tails: vec![n],
            source_path: SourcePath::default(),
            transition_score: 0.0,
            best_derivation_score: -1.0,
        });
        graph.attach_edge(full, wrapper_edge);
        goal_over(&mut graph, full, &vocab);

        let out = extract(&graph, &vocab, &sentence, &registry, false, 5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "A");
        assert_eq!(out[0].score, -1.0);
        assert_eq!(out[1].text, "B");
        assert_eq!(out[1].score, -2.0);
        // child "A" covers source token 1, target position 1; both shift
        // down by one for the markers
        assert_eq!(out[0].alignment, "0-0");
    }

    #[test]
    fn combinations_enumerate_lazily_in_order() {
        let vocab = Vocabulary::new();
        let sentence = Sentence::new(0, "src src", &vocab);
        let registry = FeatureRegistry::new();
        let mut graph = HyperGraph::new();

        let left = graph.add_node(node(Span::new(1, 2), vocab.id("X")));
        let a = leaf_edge(&mut graph, leaf_rule(&vocab, "A"), -1.0);
        graph.attach_edge(left, a);
        let b = leaf_edge(&mut graph, leaf_rule(&vocab, "B"), -2.0);
        graph.attach_edge(left, b);

        let right = graph.add_node(node(Span::new(2, 3), vocab.id("X")));
        let c = leaf_edge(&mut graph, leaf_rule(&vocab, "C"), -0.5);
        graph.attach_edge(right, c);
        let d = leaf_edge(&mut graph, leaf_rule(&vocab, "D"), -1.5);
        graph.attach_edge(right, d);

        let pair_rule = Arc::new(Rule {
            lhs: vocab.id("X"),
            source: vec![-vocab.id("X"), -vocab.id("X")],
            target: vec![-1, -2],
            arity: 2,
            features: FeatureVector::new(),
            alignment: Vec::new(),
            owner: 0,
        });
        let parent = graph.add_node(node(Span::new(1, 3), vocab.id("X")));
        let pair_edge = graph.add_edge(HyperEdge {
            rule: Some(pair_rule),
            tails: vec![left, right],
            source_path: SourcePath::default(),
            transition_score: -0.1,
            best_derivation_score: -1.6,
        });
        graph.attach_edge(parent, pair_edge);
        goal_over(&mut graph, parent, &vocab);

        let out = extract(&graph, &vocab, &sentence, &registry, false, 10);
        let texts: Vec<&str> = out.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["A C", "B C", "A D", "B D"]);
        let scores: Vec<f32> = out.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![-1.6, -2.6, -2.6, -3.6]);
        // monotone non-increasing
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn uniqueness_skips_repeated_strings() {
        let vocab = Vocabulary::new();
        let sentence = Sentence::new(0, "src", &vocab);
        let registry = FeatureRegistry::new();
        let mut graph = HyperGraph::new();

        let n = graph.add_node(node(Span::new(1, 2), vocab.id("X")));
        // two distinct derivations with the same surface string
        let a1 = leaf_edge(&mut graph, leaf_rule(&vocab, "A"), -1.0);
        graph.attach_edge(n, a1);
        let a2 = leaf_edge(&mut graph, leaf_rule(&vocab, "A"), -3.0);
        graph.attach_edge(n, a2);
        let b = leaf_edge(&mut graph, leaf_rule(&vocab, "B"), -2.0);
        graph.attach_edge(n, b);
        goal_over(&mut graph, n, &vocab);

        let all = extract(&graph, &vocab, &sentence, &registry, false, 10);
        assert_eq!(all.len(), 3);

        let unique = extract(&graph, &vocab, &sentence, &registry, true, 10);
        let texts: Vec<&str> = unique.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn empty_forest_yields_nothing() {
        let vocab = Vocabulary::new();
        let sentence = Sentence::new(0, "src", &vocab);
        let registry = FeatureRegistry::new();
        let graph = HyperGraph::new();
        assert!(extract(&graph, &vocab, &sentence, &registry, true, 3).is_empty());
    }
}
