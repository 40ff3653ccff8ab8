//! Translation-model feature: replays the rule's own feature values.

use crate::chart::SourcePath;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;

use super::{Accumulator, DpState, FeatureFunction};

/// Fires the stored feature values of every rule belonging to one grammar.
/// One instance is registered per grammar, keyed by owner, so weights can
/// differ between, say, the main translation grammar and the glue grammar.
pub struct PhraseModel {
    name: String,
    owner: u16,
}

impl PhraseModel {
    pub fn new(owner_name: &str, owner: u16) -> Self {
        PhraseModel {
            name: owner_name.to_string(),
            owner,
        }
    }
}

impl FeatureFunction for PhraseModel {
    fn name(&self) -> &str {
        &self.name
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
            for (id, value) in rule.features.iter() {
                acc.add(id, value);
            }
        }
        None
    }
}
