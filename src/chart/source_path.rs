//! Source-side path cost for an edge.
//!
//! Plain-text input makes every path free; the indirection keeps edge
//! scoring shaped for weighted inputs (confusion networks), where a rule
//! application would also pay for the arcs it consumed.

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourcePath {
    score: f32,
}

impl SourcePath {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn with_score(score: f32) -> Self {
        SourcePath { score }
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}
