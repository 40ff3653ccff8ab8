//! Dynamic-programming state attached to hypergraph nodes.
//!
//! Each stateful feature function owns one state slot per node, addressed by
//! its fixed state index. Two derivations recombine iff every slot compares
//! equal, so state types must carry exactly the information relevant to the
//! owning feature's future scoring — no more, no less.

use crate::vocab::WordId;

/// Per-feature DP state. A closed set of variants: adding a stateful feature
/// kind means adding a variant here, which keeps equality and hashing plain
/// value comparisons with no runtime type inspection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DpState {
    Ngram(NgramState),
}

/// Boundary word context for an n-gram language model: the first and last
/// `order - 1` target words of the derivation (fewer if the derivation is
/// shorter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NgramState {
    pub left: Vec<WordId>,
    pub right: Vec<WordId>,
}

impl NgramState {
    pub fn new(left: Vec<WordId>, right: Vec<WordId>) -> Self {
        NgramState { left, right }
    }
}
