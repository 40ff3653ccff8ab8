//! Source-side rule trie.
//!
//! Arcs are keyed by source token id (negative keys are nonterminal arcs).
//! A `BTreeMap` keeps child iteration deterministic, which in turn keeps
//! hypergraph construction order — and therefore k-best tie-breaking —
//! reproducible across runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::vocab::WordId;

use super::rule::Rule;

#[derive(Debug, Default)]
pub struct TrieNode {
    children: BTreeMap<WordId, TrieNode>,
    rules: Vec<Arc<Rule>>,
}

impl TrieNode {
    pub fn child(&self, sym: WordId) -> Option<&TrieNode> {
        self.children.get(&sym)
    }

    /// Nonterminal arcs (negative keys), in ascending key order.
    pub fn nonterminal_children(&self) -> impl Iterator<Item = (WordId, &TrieNode)> {
        self.children.range(..0).map(|(&k, v)| (k, v))
    }

    /// Rules whose source side ends exactly at this node.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub(super) fn insert(&mut self, rule: Arc<Rule>) {
        let mut node = self;
        for &tok in &rule.source {
            node = node.children.entry(tok).or_default();
        }
        node.rules.push(rule);
    }
}
