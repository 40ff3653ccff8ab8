//! Backoff n-gram language model.

use std::collections::HashMap;

use crate::vocab::WordId;

/// Log-probability assigned to a unigram the model has never seen.
const UNSEEN_FLOOR: f32 = -100.0;

/// In-memory backoff model: each stored n-gram carries its log-probability
/// and the backoff weight applied when a longer n-gram falls through to its
/// suffix. Log domain throughout, higher is better.
#[derive(Debug)]
pub struct NgramModel {
    order: usize,
    entries: HashMap<Vec<WordId>, (f32, f32)>,
    floor: f32,
}

impl NgramModel {
    pub fn new(order: usize) -> Self {
        NgramModel {
            order,
            entries: HashMap::new(),
            floor: UNSEEN_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    pub fn add(&mut self, ngram: Vec<WordId>, log_prob: f32, backoff: f32) {
        debug_assert!(!ngram.is_empty() && ngram.len() <= self.order);
        self.entries.insert(ngram, (log_prob, backoff));
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log-probability of the last word of `ngram` given the preceding
    /// words, truncated to the model order, with standard backoff:
    /// `p(w | ctx) = backoff(ctx) + p(w | shorter ctx)` when the full
    /// n-gram is unseen.
    pub fn log_prob(&self, ngram: &[WordId]) -> f32 {
        let start = ngram.len().saturating_sub(self.order);
        self.backoff_prob(&ngram[start..])
    }

    fn backoff_prob(&self, ngram: &[WordId]) -> f32 {
        if let Some(&(log_prob, _)) = self.entries.get(ngram) {
            return log_prob;
        }
        if ngram.len() <= 1 {
            return self.floor;
        }
        let context = &ngram[..ngram.len() - 1];
        let backoff = self
            .entries
            .get(context)
            .map(|&(_, backoff)| backoff)
            .unwrap_or(0.0);
        backoff + self.backoff_prob(&ngram[1..])
    }
}
