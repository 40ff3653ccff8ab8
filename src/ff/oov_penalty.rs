//! OOV penalty: charges derivations that pass an unknown word through.

use crate::chart::SourcePath;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;

use super::{Accumulator, DpState, FeatureFunction, FeatureId};

/// Fires a fixed value whenever a rule from the per-sentence OOV grammar is
/// applied. With the conventional large-negative value this makes OOV
/// pass-through a last resort without ever making a sentence unparseable.
pub struct OovPenalty {
    feature_id: FeatureId,
    owner: u16,
    value: f32,
}

impl OovPenalty {
    pub const NAME: &'static str = "oov_penalty";

    pub fn new(feature_id: FeatureId, owner: u16, value: f32) -> Self {
        OovPenalty {
            feature_id,
            owner,
            value,
        }
    }
}

impl FeatureFunction for OovPenalty {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn compute(
        &self,
        rule: &Rule,
        _tails: &[&HgNode],
        _span: Span,
        _path: &SourcePath,
        _sentence: &Sentence,
        acc: &mut dyn Accumulator,
    ) -> Option<DpState> {
        if rule.owner == self.owner {
            acc.add(self.feature_id, self.value);
        }
        None
    }
}
