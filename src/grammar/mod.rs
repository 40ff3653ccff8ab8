//! Grammar storage: rules indexed by a source-side trie.
//!
//! Rule *loading* beyond the Hiero text format (packed/binary grammars) is
//! out of scope; this module covers the in-memory form the chart consumes,
//! the line parser, and the generated glue grammar.

mod reader;
mod rule;
mod trie;

pub use reader::{glue_grammar, parse_rule};
pub use rule::Rule;
pub use trie::TrieNode;

use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("malformed rule line (expected `[LHS] ||| source ||| target ...`): {line}")]
    BadFormat { line: String },
    #[error("malformed nonterminal token: {token}")]
    BadNonterminal { token: String },
    #[error("source nonterminal indices must be 1..=arity in order: {line}")]
    NonterminalOrder { line: String },
    #[error("target nonterminal references unknown source slot: {token}")]
    UnknownCoindex { token: String },
    #[error("malformed feature value: {token}")]
    BadFeature { token: String },
    #[error("malformed alignment point (expected `src-trg`): {token}")]
    BadAlignment { token: String },
}

/// Interns grammar-owner names to compact ids carried on every rule.
#[derive(Debug, Default)]
pub struct OwnerMap {
    names: Vec<String>,
}

impl OwnerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> u16 {
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            return pos as u16;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u16
    }

    pub fn name(&self, id: u16) -> &str {
        &self.names[id as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One grammar: an owner, a span limit and the rule trie.
#[derive(Debug)]
pub struct Grammar {
    owner: u16,
    owner_name: String,
    span_limit: usize,
    root: TrieNode,
    rule_count: usize,
}

impl Grammar {
    /// `span_limit == 0` means unlimited (used by the glue grammar).
    pub fn new(owner_name: &str, span_limit: usize, owners: &mut OwnerMap) -> Self {
        Self::with_owner(owner_name, owners.intern(owner_name), span_limit)
    }

    /// Grammar with a pre-interned owner; the per-sentence pass-through
    /// grammar is built this way at decode time, when the owner map is
    /// already frozen.
    pub fn with_owner(owner_name: &str, owner: u16, span_limit: usize) -> Self {
        Grammar {
            owner,
            owner_name: owner_name.to_string(),
            span_limit,
            root: TrieNode::default(),
            rule_count: 0,
        }
    }

    /// Parses Hiero-format lines into a fresh grammar. Any malformed line is
    /// fatal: configuration errors must surface before decoding starts.
    pub fn from_lines<I, S>(
        lines: I,
        owner_name: &str,
        span_limit: usize,
        vocab: &crate::vocab::Vocabulary,
        feature_map: &mut crate::ff::FeatureMap,
        owners: &mut OwnerMap,
    ) -> Result<Self, GrammarError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut grammar = Grammar::new(owner_name, span_limit, owners);
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rule = parse_rule(line, grammar.owner, owner_name, vocab, feature_map)?;
            grammar.add_rule(rule);
        }
        Ok(grammar)
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.root.insert(Arc::new(rule));
        self.rule_count += 1;
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    pub fn owner(&self) -> u16 {
        self.owner
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    pub fn span_limit(&self) -> usize {
        self.span_limit
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// True if some rule's source side starts with the given terminal.
    /// Used to decide which sentence words need OOV rules.
    pub fn covers_terminal(&self, word: crate::vocab::WordId) -> bool {
        self.root.child(word).is_some()
    }
}
