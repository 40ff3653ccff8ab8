//! Decoder assembly and batch decoding.
//!
//! [`DecoderConfig`] is built once from settings, grammar text and an
//! optional language model, then shared read-only across worker threads.
//! Each sentence gets its own chart, hypergraph and extractor; the only
//! shared mutable state is the interning vocabulary behind its lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, debug_span, warn};

use crate::chart::Chart;
use crate::ff::lm::{LanguageModel, NgramModel};
use crate::ff::oov_penalty::OovPenalty;
use crate::ff::phrase_model::PhraseModel;
use crate::ff::word_penalty::WordPenalty;
use crate::ff::{FeatureMap, FeatureRegistry, FeatureVector, RegistryError};
use crate::grammar::{glue_grammar, Grammar, GrammarError, OwnerMap, Rule};
use crate::hypergraph::{
    viterbi_alignment, viterbi_features, viterbi_score, viterbi_tokens, Derivation, HyperGraph,
    KBestExtractor,
};
use crate::sentence::Sentence;
use crate::settings::{DecoderSettings, SettingsError};
use crate::vocab::{Vocabulary, WordId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Everything a worker needs to decode a sentence. Immutable after
/// construction, except for decode-time word interning inside the
/// vocabulary.
pub struct DecoderConfig {
    pub settings: DecoderSettings,
    pub weights: FeatureVector,
    pub feature_map: FeatureMap,
    pub registry: FeatureRegistry,
    pub grammars: Vec<Grammar>,
    pub owners: OwnerMap,
    pub vocab: Vocabulary,
    pub goal_id: WordId,
    pub default_nt_id: WordId,
    oov_owner: u16,
}

impl DecoderConfig {
    /// Assembles a config from `(owner name, grammar text)` pairs. The glue
    /// grammar and the feature stack are derived from the settings; a
    /// language model is attached separately ([`DecoderConfig::attach_lm`])
    /// since its word ids come from this config's vocabulary.
    pub fn new(
        settings: DecoderSettings,
        grammar_sources: &[(&str, &str)],
    ) -> Result<Self, ConfigError> {
        let vocab = Vocabulary::new();
        let mut feature_map = FeatureMap::new();
        let mut owners = OwnerMap::new();

        let goal_id = vocab.id(&settings.search.goal_symbol);
        let default_nt_id = vocab.id(&settings.search.default_nonterminal);

        let mut grammars = Vec::with_capacity(grammar_sources.len() + 1);
        for (owner_name, text) in grammar_sources {
            let grammar = Grammar::from_lines(
                text.lines(),
                owner_name,
                settings.search.span_limit,
                &vocab,
                &mut feature_map,
                &mut owners,
            )?;
            debug!(owner = owner_name, rules = grammar.len(), "loaded grammar");
            grammars.push(grammar);
        }
        grammars.push(glue_grammar(
            &settings.search.goal_symbol,
            &settings.search.default_nonterminal,
            &vocab,
            &mut feature_map,
            &mut owners,
        )?);
        let oov_owner = owners.intern("oov");

        // weight names interned in sorted order so feature ids are stable
        // regardless of hash-map iteration
        let mut weight_names: Vec<&String> = settings.weights.keys().collect();
        weight_names.sort();
        let mut weights = FeatureVector::new();
        for name in weight_names {
            weights.put(feature_map.intern(name), settings.weights[name]);
        }

        let mut registry = FeatureRegistry::new();
        for grammar in &grammars {
            registry.register(Box::new(PhraseModel::new(
                grammar.owner_name(),
                grammar.owner(),
            )));
        }
        if settings.features.word_penalty {
            let id = feature_map.intern(WordPenalty::NAME);
            registry.register(Box::new(WordPenalty::new(id)));
        }
        if settings.features.oov_penalty {
            let id = feature_map.intern(OovPenalty::NAME);
            registry.register(Box::new(OovPenalty::new(
                id,
                oov_owner,
                settings.features.oov_log_prob,
            )));
        }
        registry.validate()?;

        Ok(DecoderConfig {
            settings,
            weights,
            feature_map,
            registry,
            grammars,
            owners,
            vocab,
            goal_id,
            default_nt_id,
            oov_owner,
        })
    }

    /// Registers an n-gram language model feature. Call after building the
    /// model against this config's vocabulary and before constructing the
    /// [`Decoder`].
    pub fn attach_lm(&mut self, model: NgramModel) -> Result<(), ConfigError> {
        let id = self.feature_map.intern(LanguageModel::NAME);
        let weight = self.weights.get_or_default(id);
        let state_index = self.registry.state_count();
        self.registry.register(Box::new(LanguageModel::new(
            id,
            state_index,
            weight,
            model,
            self.vocab.start_id(),
        )));
        self.registry.validate()?;
        Ok(())
    }
}

/// Result of decoding one sentence.
#[derive(Debug, Clone)]
pub struct Translation {
    pub id: usize,
    /// Best-scoring target string, or the source untouched on failure.
    pub text: String,
    pub score: f32,
    /// Formatted k-best output lines per the configured template.
    pub lines: Vec<String>,
    pub failed: bool,
}

pub struct Decoder {
    config: Arc<DecoderConfig>,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Decoder {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode(&self, id: usize, text: &str) -> Translation {
        decode_one(&self.config, id, text)
    }

    /// Decodes a batch, distributing sentences over the configured number
    /// of worker threads. Results come back in input order.
    pub fn decode_all(&self, inputs: &[String]) -> Vec<Translation> {
        let threads = self.config.settings.search.threads.min(inputs.len().max(1));
        if threads <= 1 {
            return inputs
                .iter()
                .enumerate()
                .map(|(id, text)| decode_one(&self.config, id, text))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<Translation>>> = Mutex::new(vec![None; inputs.len()]);
        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| loop {
                    let id = next.fetch_add(1, Ordering::Relaxed);
                    if id >= inputs.len() {
                        break;
                    }
                    let translation = decode_one(&self.config, id, &inputs[id]);
                    slots.lock().expect("result lock")[id] = Some(translation);
                });
            }
        });
        slots
            .into_inner()
            .expect("result lock")
            .into_iter()
            .map(|slot| slot.expect("every sentence decoded"))
            .collect()
    }
}

fn decode_one(config: &DecoderConfig, id: usize, text: &str) -> Translation {
    let _span = debug_span!("decode", sentence = id).entered();
    let sentence = Sentence::new(id, text, &config.vocab);

    if sentence.is_blank() {
        return failed_translation(config, &sentence);
    }
    if sentence.word_count() > config.settings.search.max_source_len {
        warn!(
            sentence = id,
            words = sentence.word_count(),
            limit = config.settings.search.max_source_len,
            "sentence over length limit"
        );
        return failed_translation(config, &sentence);
    }

    let oov_grammar = build_oov_grammar(config, &sentence);
    let mut grammars: Vec<&Grammar> = config.grammars.iter().collect();
    if let Some(grammar) = &oov_grammar {
        grammars.push(grammar);
    }

    let graph = Chart::new(config, &grammars, &sentence).parse();
    let translation = if graph.goal().is_none() {
        failed_translation(config, &sentence)
    } else if config.settings.output.kbest == 0 {
        // plain best-edge walk, no k-best frontier machinery
        let best = viterbi_derivation(config, &graph, &sentence);
        Translation {
            id,
            text: best.text.clone(),
            score: best.score,
            lines: vec![format_line(
                &config.settings.output.format,
                config,
                &sentence,
                &best,
            )],
            failed: false,
        }
    } else {
        let mut extractor = KBestExtractor::new(
            &graph,
            &config.registry,
            &sentence,
            &config.vocab,
            config.settings.output.unique,
        );
        let derivations = extractor.derivations(config.settings.output.kbest);
        match derivations.first() {
            None => failed_translation(config, &sentence),
            Some(best) => Translation {
                id,
                text: best.text.clone(),
                score: best.score,
                lines: derivations
                    .iter()
                    .map(|d| format_line(&config.settings.output.format, config, &sentence, d))
                    .collect(),
                failed: false,
            },
        }
    };

    for ff in config.registry.functions() {
        ff.end_sentence(&sentence);
    }
    debug!(
        sentence = id,
        failed = translation.failed,
        score = translation.score,
        "sentence done"
    );
    translation
}

/// Pass-through rules for source words no grammar can start a rule with.
fn build_oov_grammar(config: &DecoderConfig, sentence: &Sentence) -> Option<Grammar> {
    let mut grammar: Option<Grammar> = None;
    let mut handled: Vec<WordId> = Vec::new();
    for pos in 1..sentence.len() - 1 {
        let word = sentence.word(pos);
        if handled.contains(&word) {
            continue;
        }
        handled.push(word);
        if config.grammars.iter().any(|g| g.covers_terminal(word)) {
            continue;
        }
        let rule = Rule {
            lhs: config.default_nt_id,
            source: vec![word],
            target: vec![word],
            arity: 0,
            features: FeatureVector::new(),
            alignment: vec![(0, 0)],
            owner: config.oov_owner,
        };
        grammar
            .get_or_insert_with(|| Grammar::with_owner("oov", config.oov_owner, 1))
            .add_rule(rule);
    }
    if let Some(grammar) = &grammar {
        debug!(
            sentence = sentence.id(),
            words = grammar.len(),
            "built pass-through grammar"
        );
    }
    grammar
}

fn viterbi_derivation(
    config: &DecoderConfig,
    graph: &HyperGraph,
    sentence: &Sentence,
) -> Derivation {
    let tokens = viterbi_tokens(graph);
    let text = tokens
        .iter()
        .filter(|&&t| t != config.vocab.start_id() && t != config.vocab.stop_id())
        .map(|&t| config.vocab.word(t))
        .collect::<Vec<_>>()
        .join(" ");
    Derivation {
        tokens,
        text,
        score: viterbi_score(graph),
        features: viterbi_features(graph, &config.registry, sentence),
        alignment: viterbi_alignment(graph),
    }
}

fn failed_translation(config: &DecoderConfig, sentence: &Sentence) -> Translation {
    let placeholder = Derivation {
        tokens: Vec::new(),
        text: sentence.source().to_string(),
        score: 0.0,
        features: FeatureVector::new(),
        alignment: String::new(),
    };
    Translation {
        id: sentence.id(),
        text: sentence.source().to_string(),
        score: 0.0,
        lines: vec![format_line(
            &config.settings.output.format,
            config,
            sentence,
            &placeholder,
        )],
        failed: true,
    }
}

/// Fills the output template: `%i` sentence id, `%s` target string, `%c`
/// weighted score, `%f` feature breakdown, `%a` word alignment.
fn format_line(
    template: &str,
    config: &DecoderConfig,
    sentence: &Sentence,
    derivation: &Derivation,
) -> String {
    template
        .replace("%i", &sentence.id().to_string())
        .replace("%s", &derivation.text)
        .replace("%c", &format!("{:.3}", derivation.score))
        .replace("%f", &derivation.features.text_format(&config.feature_map))
        .replace("%a", &derivation.alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn blank_input_fails_cleanly() {
        let decoder = testutil::decoder(testutil::settings());
        let t = decoder.decode(3, "   ");
        assert!(t.failed);
        assert_eq!(t.text, "");
        assert_eq!(t.score, 0.0);
        assert_eq!(t.lines, vec!["3 |||  ||| 0.000"]);
    }

    #[test]
    fn over_length_input_fails() {
        let mut settings = testutil::settings();
        settings.search.max_source_len = 2;
        let decoder = testutil::decoder(settings);
        let t = decoder.decode(0, "a b c");
        assert!(t.failed);
        assert_eq!(t.text, "a b c");
    }

    #[test]
    fn bad_grammar_line_is_a_config_error() {
        let result = DecoderConfig::new(testutil::settings(), &[("tm", "[X] ||| broken")]);
        assert!(matches!(result, Err(ConfigError::Grammar(_))));
    }

    #[test]
    fn oov_grammar_covers_unknown_words_only() {
        let decoder = testutil::decoder(testutil::settings());
        let config = decoder.config();
        let sentence = Sentence::new(0, "a zzz zzz", &config.vocab);
        let grammar = build_oov_grammar(config, &sentence).unwrap();
        // "a" is covered by the fixture grammar; "zzz" appears twice but
        // gets one rule
        assert_eq!(grammar.len(), 1);
        assert!(grammar.covers_terminal(config.vocab.id("zzz")));
        assert!(!grammar.covers_terminal(config.vocab.id("a")));
    }

    #[test]
    fn fully_known_sentence_needs_no_oov_grammar() {
        let decoder = testutil::decoder(testutil::settings());
        let config = decoder.config();
        let sentence = Sentence::new(0, "a b c", &config.vocab);
        assert!(build_oov_grammar(config, &sentence).is_none());
    }
}
