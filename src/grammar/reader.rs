//! Hiero text-format rule parsing and the generated glue grammar.
//!
//! Line shape: `[LHS] ||| source ||| target ||| features ||| alignments`,
//! with the last two fields optional. Source nonterminals are written
//! `[X,1]` with 1-based coindexes that must ascend left to right; target
//! nonterminals reference those coindexes.

use crate::ff::{FeatureMap, FeatureVector};
use crate::vocab::{Vocabulary, WordId, START_SYM, STOP_SYM};

use super::{Grammar, GrammarError, OwnerMap, Rule};

const FIELD_SEP: &str = " ||| ";

/// `[X,1]` -> `("X", Some(1))`; `[GOAL]` -> `("GOAL", None)`.
fn parse_nonterminal(token: &str) -> Option<(&str, Option<usize>)> {
    let inner = token.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() {
        return None;
    }
    match inner.split_once(',') {
        None => Some((inner, None)),
        Some((sym, idx)) => {
            let idx: usize = idx.parse().ok()?;
            if sym.is_empty() || idx == 0 {
                return None;
            }
            Some((sym, Some(idx)))
        }
    }
}

fn is_nonterminal_token(token: &str) -> bool {
    token.len() > 2 && token.starts_with('[') && token.ends_with(']')
}

/// Parses one grammar line into a [`Rule`].
///
/// Unlabeled (bare numeric) feature values are named `{owner}_{index}` by
/// position; labeled values use `name=value`. Values are taken verbatim, with
/// the convention that higher is better (log-probabilities are negative).
pub fn parse_rule(
    line: &str,
    owner: u16,
    owner_name: &str,
    vocab: &Vocabulary,
    feature_map: &mut FeatureMap,
) -> Result<Rule, GrammarError> {
    let fields: Vec<&str> = line.split(FIELD_SEP).collect();
    if fields.len() < 3 || fields.len() > 5 {
        return Err(GrammarError::BadFormat {
            line: line.to_string(),
        });
    }

    let lhs = match parse_nonterminal(fields[0].trim()) {
        Some((sym, None)) => vocab.id(sym),
        _ => {
            return Err(GrammarError::BadNonterminal {
                token: fields[0].trim().to_string(),
            })
        }
    };

    let mut source = Vec::new();
    let mut arity = 0usize;
    for token in fields[1].split_whitespace() {
        if is_nonterminal_token(token) {
            let (sym, idx) = parse_nonterminal(token).ok_or_else(|| {
                GrammarError::BadNonterminal {
                    token: token.to_string(),
                }
            })?;
            match idx {
                Some(i) if i == arity + 1 => arity += 1,
                _ => {
                    return Err(GrammarError::NonterminalOrder {
                        line: line.to_string(),
                    })
                }
            }
            source.push(-vocab.id(sym));
        } else {
            source.push(vocab.id(token));
        }
    }

    let mut target = Vec::new();
    for token in fields[2].split_whitespace() {
        if is_nonterminal_token(token) {
            let (_, idx) = parse_nonterminal(token).ok_or_else(|| {
                GrammarError::BadNonterminal {
                    token: token.to_string(),
                }
            })?;
            match idx {
                Some(i) if i >= 1 && i <= arity => target.push(-(i as WordId)),
                _ => {
                    return Err(GrammarError::UnknownCoindex {
                        token: token.to_string(),
                    })
                }
            }
        } else {
            target.push(vocab.id(token));
        }
    }

    let mut features = FeatureVector::new();
    if fields.len() >= 4 {
        let mut unlabeled = 0usize;
        for token in fields[3].split_whitespace() {
            if let Some((name, value)) = token.split_once('=') {
                let value: f32 = value.parse().map_err(|_| GrammarError::BadFeature {
                    token: token.to_string(),
                })?;
                features.add(feature_map.intern(name), value);
            } else {
                let value: f32 = token.parse().map_err(|_| GrammarError::BadFeature {
                    token: token.to_string(),
                })?;
                let name = format!("{owner_name}_{unlabeled}");
                features.add(feature_map.intern(&name), value);
                unlabeled += 1;
            }
        }
    }

    let mut alignment = Vec::new();
    if fields.len() == 5 {
        for token in fields[4].split_whitespace() {
            let point = token
                .split_once('-')
                .and_then(|(s, t)| Some((s.parse().ok()?, t.parse().ok()?)));
            match point {
                Some((s, t)) => alignment.push((s, t)),
                None => {
                    return Err(GrammarError::BadAlignment {
                        token: token.to_string(),
                    })
                }
            }
        }
    }

    Ok(Rule {
        lhs,
        source,
        target,
        arity,
        features,
        alignment,
        owner,
    })
}

/// Builds the three-rule monotone glue grammar for `goal` over `default_nt`:
/// start the derivation at `<s>`, append one `default_nt` constituent at a
/// time (paying one unit of the glue feature), and close it at `</s>`.
pub fn glue_grammar(
    goal: &str,
    default_nt: &str,
    vocab: &Vocabulary,
    feature_map: &mut FeatureMap,
    owners: &mut OwnerMap,
) -> Result<Grammar, GrammarError> {
    let lines = [
        format!("[{goal}] ||| {START_SYM} ||| {START_SYM} ||| 0"),
        format!("[{goal}] ||| [{goal},1] [{default_nt},2] ||| [{goal},1] [{default_nt},2] ||| -1"),
        format!("[{goal}] ||| [{goal},1] {STOP_SYM} ||| [{goal},1] {STOP_SYM} ||| 0"),
    ];
    Grammar::from_lines(lines, "glue", 0, vocab, feature_map, owners)
}
