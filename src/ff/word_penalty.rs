//! Word-penalty feature: a fixed charge per emitted target word.

use crate::chart::SourcePath;
use crate::grammar::Rule;
use crate::hypergraph::{HgNode, Span};
use crate::sentence::Sentence;

use super::{Accumulator, DpState, FeatureFunction, FeatureId};

/// Per-word charge, expressed in the same base-10 log domain the language
/// model scores in: -log10(e).
const OMEGA: f32 = -0.434_294_5;

pub struct WordPenalty {
    feature_id: FeatureId,
}

impl WordPenalty {
    pub const NAME: &'static str = "word_penalty";

    pub fn new(feature_id: FeatureId) -> Self {
        WordPenalty { feature_id }
    }
}

impl FeatureFunction for WordPenalty {
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
        let words = rule.target_terminal_count();
        if words > 0 {
            acc.add(self.feature_id, OMEGA * words as f32);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ff::{FeatureAccumulator, FeatureVector};
    use crate::vocab::Vocabulary;

    #[test]
    fn charges_terminals_not_slots() {
        let vocab = Vocabulary::new();
        let sentence = Sentence::new(0, "a", &vocab);
        let rule = Rule {
            lhs: 1,
            source: vec![5, -10],
            target: vec![-1, 6, 7],
            arity: 1,
            features: FeatureVector::new(),
            alignment: Vec::new(),
            owner: 0,
        };
        let ff = WordPenalty::new(4);
        let mut acc = FeatureAccumulator::new();
        ff.compute(
            &rule,
            &[],
            Span::new(0, 2),
            &SourcePath::default(),
            &sentence,
            &mut acc,
        );
        let fv = acc.into_features();
        assert!((fv.get_or_default(4) - 2.0 * OMEGA).abs() < 1e-6);
    }
}
