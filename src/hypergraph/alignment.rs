//! Word-alignment assembly for extracted derivations.
//!
//! A derivation's alignment is built bottom-up: each rule application
//! starts from its rule-local alignment points mapped to absolute source
//! positions, then child states are spliced into the nonterminal slots in
//! source order, shifting this state's positions right of the child to
//! make room for the words the child actually covers.

use crate::grammar::Rule;

/// Aligned source positions for one target token.
#[derive(Debug, Clone)]
struct AlignedPoint {
    sources: Vec<i32>,
    /// Target word with no alignment; never shifted, never printed.
    is_null: bool,
    /// Unsubstituted nonterminal slot; `sources[0]` is the slot's absolute
    /// source start.
    is_nonterminal: bool,
    /// Came from an already-substituted child; its positions are settled.
    is_final: bool,
}

impl AlignedPoint {
    fn terminal(sources: Vec<i32>) -> Self {
        AlignedPoint {
            is_null: sources.is_empty(),
            sources,
            is_nonterminal: false,
            is_final: false,
        }
    }

    fn nonterminal(source_start: i32) -> Self {
        AlignedPoint {
            sources: vec![source_start],
            is_null: false,
            is_nonterminal: true,
            is_final: false,
        }
    }

    fn shift_by(&mut self, source_position: i32, shift: i32) {
        if self.is_final || self.is_null {
            return;
        }
        for s in &mut self.sources {
            if *s > source_position {
                *s += shift;
            }
        }
    }
}

/// Alignment state of one (possibly partial) derivation.
#[derive(Debug, Clone)]
pub struct WordAlignmentState {
    points: Vec<AlignedPoint>,
    src_start: i32,
    src_length: i32,
    pending_slots: usize,
}

impl WordAlignmentState {
    /// State for a virgin rule application starting at absolute source
    /// position `start` (token position, markers included).
    pub fn new(rule: &Rule, start: usize) -> Self {
        let start = start as i32;
        let alignment_map = rule.alignment_map();
        let nt_positions = rule.nonterminal_source_positions();

        let mut points = Vec::with_capacity(rule.target.len());
        for (trg_index, &tok) in rule.target.iter().enumerate() {
            if tok < 0 {
                let slot = (-tok - 1) as usize;
                points.push(AlignedPoint::nonterminal(start + nt_positions[slot] as i32));
            } else {
                let sources = alignment_map
                    .get(&trg_index)
                    .map(|srcs| srcs.iter().map(|&s| start + s as i32).collect())
                    .unwrap_or_default();
                points.push(AlignedPoint::terminal(sources));
            }
        }

        WordAlignmentState {
            points,
            src_start: start,
            src_length: rule.source.len() as i32,
            pending_slots: rule.arity,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending_slots == 0
    }

    /// Splices `child` into the leftmost (by source position) open
    /// nonterminal slot, widening this state by the span the child covers.
    pub fn substitute_in(&mut self, child: WordAlignmentState) {
        let shift = child.src_length - 1;
        let mut slot_index = 0;
        let mut slot_position = i32::MAX;
        for (i, point) in self.points.iter_mut().enumerate() {
            point.shift_by(child.src_start, shift);
            if point.is_nonterminal && point.sources[0] < slot_position {
                slot_position = point.sources[0];
                slot_index = i;
            }
        }

        let spliced = child.points.into_iter().map(|mut p| {
            p.is_final = true;
            p
        });
        self.points.splice(slot_index..=slot_index, spliced);

        self.src_length += shift;
        self.pending_slots -= 1;
    }

    /// `src-trg` pairs in target order, both sides shifted down by one so
    /// the sentence markers (position 0 on each side) disappear.
    pub fn final_string(&self) -> String {
        let mut out = String::new();
        for (t, point) in self.points.iter().enumerate() {
            for &s in &point.sources {
                if point.is_nonterminal {
                    continue;
                }
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&format!("{}-{}", s - 1, t as i32 - 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ff::FeatureVector;
    use crate::vocab::WordId;

    fn rule(
        source: Vec<WordId>,
        target: Vec<WordId>,
        arity: usize,
        alignment: Vec<(usize, usize)>,
    ) -> Rule {
        Rule {
            lhs: 10,
            source,
            target,
            arity,
            features: FeatureVector::new(),
            alignment,
            owner: 0,
        }
    }

    /// Glue-style wrapper `<s> [X,1] </s>` at position 0. The markers carry
    /// no alignment, so `final_string`'s shift-by-one lands rule-local
    /// positions at their intuitive unmarked indices, just like in a real
    /// derivation.
    fn wrap_with_markers(child: WordAlignmentState) -> WordAlignmentState {
        let mut wrapper =
            WordAlignmentState::new(&rule(vec![1, -5, 2], vec![1, -1, 2], 1, vec![]), 0);
        wrapper.substitute_in(child);
        wrapper
    }

    #[test]
    fn swapped_alignment_follows_target_order() {
        // parent: a [X,1] -> A [X,1] at position 1
        let mut parent =
            WordAlignmentState::new(&rule(vec![20, -5], vec![40, -1], 1, vec![(0, 0)]), 1);
        // child: "b c" -> "C B" swapped, at position 2
        let child = WordAlignmentState::new(
            &rule(vec![21, 22], vec![32, 31], 0, vec![(0, 1), (1, 0)]),
            2,
        );
        parent.substitute_in(child);
        assert!(parent.is_complete());
        assert_eq!(wrap_with_markers(parent).final_string(), "0-0 2-1 1-2");
    }

    #[test]
    fn substitution_without_shift() {
        let child = WordAlignmentState::new(&rule(vec![20], vec![30], 0, vec![(0, 0)]), 1);
        // [X,1] b -> [X,1] B at position 1
        let mut parent =
            WordAlignmentState::new(&rule(vec![-5, 21], vec![-1, 31], 1, vec![(1, 1)]), 1);
        assert!(!parent.is_complete());
        parent.substitute_in(child);
        assert!(parent.is_complete());
        assert_eq!(wrap_with_markers(parent).final_string(), "0-0 1-1");
    }

    #[test]
    fn substitution_shifts_positions_past_child() {
        // child covers two source words starting at 1
        let child = WordAlignmentState::new(
            &rule(vec![20, 21], vec![30, 31], 0, vec![(0, 0), (1, 1)]),
            1,
        );
        // parent [X,1] c -> [X,1] C at position 1; c sits right after the slot
        let mut parent =
            WordAlignmentState::new(&rule(vec![-5, 22], vec![-1, 32], 1, vec![(1, 1)]), 1);
        parent.substitute_in(child);
        assert_eq!(wrap_with_markers(parent).final_string(), "0-0 1-1 2-2");
    }

    #[test]
    fn leftmost_source_slot_substituted_first() {
        // parent [X,1] [X,2] -> [X,2] [X,1] (target order inverted)
        let mut parent = WordAlignmentState::new(&rule(vec![-5, -5], vec![-2, -1], 2, vec![]), 1);
        let left_child = WordAlignmentState::new(&rule(vec![20], vec![30], 0, vec![(0, 0)]), 1);
        let right_child = WordAlignmentState::new(&rule(vec![21], vec![31], 0, vec![(0, 0)]), 2);
        // source-order traversal hands us the left child first; it lands in
        // the target-second slot
        parent.substitute_in(left_child);
        parent.substitute_in(right_child);
        assert!(parent.is_complete());
        assert_eq!(wrap_with_markers(parent).final_string(), "1-0 0-1");
    }

    #[test]
    fn unaligned_words_print_nothing() {
        let r = rule(vec![20], vec![30, 31], 0, vec![(0, 1)]);
        let state = WordAlignmentState::new(&r, 1);
        assert_eq!(state.final_string(), "0-0");
    }
}
