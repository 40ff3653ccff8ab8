//! Interning symbol table shared by grammars, sentences and output assembly.
//!
//! Word ids are positive `i32`s; id 0 is reserved for `<unk>`. Nonterminal
//! symbols get ordinary positive ids for their bare name (`GOAL`, `X`);
//! rule token arrays encode nonterminal *slots* as negative values, so a
//! token id is a terminal iff it is positive.

use std::collections::HashMap;
use std::sync::RwLock;

pub type WordId = i32;

pub const UNKNOWN: WordId = 0;

/// Start- and stop-of-sentence markers, present in every tokenized sentence
/// and in the glue grammar.
pub const START_SYM: &str = "<s>";
pub const STOP_SYM: &str = "</s>";

/// Returns true if the token id denotes a nonterminal slot.
pub fn is_nonterminal(id: WordId) -> bool {
    id < 0
}

struct Inner {
    words: Vec<String>,
    ids: HashMap<String, WordId>,
}

/// Thread-safe interning vocabulary.
///
/// Grammars intern at load time; sentences intern previously unseen source
/// words at decode time, which is why lookup takes `&self` behind a lock.
/// Reads vastly outnumber writes once decoding starts.
pub struct Vocabulary {
    inner: RwLock<Inner>,
    start_id: WordId,
    stop_id: WordId,
}

impl Vocabulary {
    pub fn new() -> Self {
        let mut inner = Inner {
            words: vec!["<unk>".to_string()],
            ids: HashMap::new(),
        };
        inner.ids.insert("<unk>".to_string(), UNKNOWN);
        let start_id = Self::intern(&mut inner, START_SYM);
        let stop_id = Self::intern(&mut inner, STOP_SYM);
        Vocabulary {
            inner: RwLock::new(inner),
            start_id,
            stop_id,
        }
    }

    fn intern(inner: &mut Inner, word: &str) -> WordId {
        if let Some(&id) = inner.ids.get(word) {
            return id;
        }
        let id = inner.words.len() as WordId;
        inner.words.push(word.to_string());
        inner.ids.insert(word.to_string(), id);
        id
    }

    /// Returns the id for `word`, interning it if unseen.
    pub fn id(&self, word: &str) -> WordId {
        if let Some(&id) = self.inner.read().expect("vocabulary lock").ids.get(word) {
            return id;
        }
        let mut inner = self.inner.write().expect("vocabulary lock");
        Self::intern(&mut inner, word)
    }

    /// Lookup without interning.
    pub fn get(&self, word: &str) -> Option<WordId> {
        self.inner
            .read()
            .expect("vocabulary lock")
            .ids
            .get(word)
            .copied()
    }

    /// Resolves an id back to its surface string. Negative (nonterminal
    /// slot) ids resolve to the symbol they negate.
    pub fn word(&self, id: WordId) -> String {
        let inner = self.inner.read().expect("vocabulary lock");
        let idx = id.unsigned_abs() as usize;
        match inner.words.get(idx) {
            Some(w) => w.clone(),
            None => inner.words[UNKNOWN as usize].clone(),
        }
    }

    pub fn start_id(&self) -> WordId {
        self.start_id
    }

    pub fn stop_id(&self) -> WordId {
        self.stop_id
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("vocabulary lock").words.len()
    }

    pub fn is_empty(&self) -> bool {
        false // always holds <unk> and the sentence markers
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
