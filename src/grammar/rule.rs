//! Synchronous grammar rules.

use std::collections::HashMap;

use crate::ff::FeatureVector;
use crate::vocab::{is_nonterminal, Vocabulary, WordId};

/// One synchronous rule.
///
/// Source-side nonterminal slots are stored as the negated symbol id
/// (`-id("X")`); target-side slots are `-1..-arity`, referencing source
/// nonterminals in source order. Tail-node lists everywhere follow that same
/// source order.
#[derive(Debug, Clone)]
pub struct Rule {
    pub lhs: WordId,
    pub source: Vec<WordId>,
    pub target: Vec<WordId>,
    pub arity: usize,
    /// Features read from the grammar line, already resolved to ids.
    pub features: FeatureVector,
    /// `(source index, target index)` terminal alignment points, rule-local.
    pub alignment: Vec<(usize, usize)>,
    /// Owner grammar (interned), used by owner-scoped features.
    pub owner: u16,
}

impl Rule {
    /// Number of terminal words on the target side.
    pub fn target_terminal_count(&self) -> usize {
        self.target.len() - self.arity
    }

    /// Rule-local source positions of the nonterminal slots, in source order.
    pub fn nonterminal_source_positions(&self) -> Vec<usize> {
        self.source
            .iter()
            .enumerate()
            .filter(|(_, &t)| is_nonterminal(t))
            .map(|(p, _)| p)
            .collect()
    }

    /// Target index -> aligned source indices, rule-local.
    pub fn alignment_map(&self) -> HashMap<usize, Vec<usize>> {
        let mut map: HashMap<usize, Vec<usize>> = HashMap::new();
        for &(src, trg) in &self.alignment {
            map.entry(trg).or_default().push(src);
        }
        map
    }

    /// Debug rendering in grammar-line shape.
    pub fn render(&self, vocab: &Vocabulary) -> String {
        let side = |tokens: &[WordId]| -> String {
            tokens
                .iter()
                .map(|&t| {
                    if is_nonterminal(t) {
                        format!("[{}]", vocab.word(t))
                    } else {
                        vocab.word(t)
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!(
            "[{}] ||| {} ||| {}",
            vocab.word(self.lhs),
            side(&self.source),
            side(&self.target)
        )
    }
}
