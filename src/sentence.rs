//! Tokenized input sentence.
//!
//! Tokens are interned word ids bracketed by the `<s>`/`</s>` markers; the
//! chart parses the full marked sequence, with the glue grammar translating
//! the markers themselves.

use crate::vocab::{Vocabulary, WordId};

#[derive(Debug, Clone)]
pub struct Sentence {
    id: usize,
    source: String,
    tokens: Vec<WordId>,
}

impl Sentence {
    /// Tokenizes `text` on whitespace and interns every word.
    pub fn new(id: usize, text: &str, vocab: &Vocabulary) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut tokens = Vec::with_capacity(words.len() + 2);
        tokens.push(vocab.start_id());
        for w in &words {
            tokens.push(vocab.id(w));
        }
        tokens.push(vocab.stop_id());
        Sentence {
            id,
            source: words.join(" "),
            tokens,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Original (whitespace-normalized) source text, markers excluded.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Token count including the sentence markers.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if the sentence holds no source words (markers only).
    pub fn is_blank(&self) -> bool {
        self.tokens.len() == 2
    }

    pub fn is_empty(&self) -> bool {
        self.is_blank()
    }

    /// Number of source words, markers excluded.
    pub fn word_count(&self) -> usize {
        self.tokens.len() - 2
    }

    pub fn word(&self, pos: usize) -> WordId {
        self.tokens[pos]
    }

    pub fn tokens(&self) -> &[WordId] {
        &self.tokens
    }
}
