//! Shared fixtures for the test suite: a tiny deterministic grammar with
//! hand-checkable scores, and a bigram model over its target words.

use crate::decoder::{Decoder, DecoderConfig};
use crate::ff::lm::NgramModel;
use crate::settings::{parse_settings_toml, DecoderSettings, DEFAULT_SETTINGS_TOML};
use crate::vocab::Vocabulary;

/// Five rules over the source words a/b/c. With unit weights the four
/// parses of "a b c" score -3.2, -4.5, -4.7 and -6.0 (glue pays -1 per
/// top-level constituent).
pub(crate) const FIXTURE_GRAMMAR: &str = "\
[X] ||| a ||| A ||| -1 ||| 0-0
[X] ||| b ||| B ||| -1 ||| 0-0
[X] ||| c ||| C ||| -1 ||| 0-0
[X] ||| a b ||| AB ||| -1.5 ||| 0-0 1-0
[X] ||| [X,1] c ||| [X,1] C2 ||| -0.7 ||| 1-1
";

/// Default settings with unit weights for every fixture feature.
pub(crate) fn settings() -> DecoderSettings {
    let mut toml = DEFAULT_SETTINGS_TOML.to_string();
    toml.push_str("\"tm_0\" = 1.0\n\"glue_0\" = 1.0\n\"oov_penalty\" = 1.0\n\"lm_0\" = 1.0\n");
    parse_settings_toml(&toml).expect("fixture settings must parse")
}

pub(crate) fn config(settings: DecoderSettings) -> DecoderConfig {
    DecoderConfig::new(settings, &[("tm", FIXTURE_GRAMMAR)]).expect("fixture config must build")
}

pub(crate) fn decoder(settings: DecoderSettings) -> Decoder {
    Decoder::new(config(settings))
}

/// Bigram model pinning "A B C" as the only well-scored target string.
pub(crate) fn bigram_lm(vocab: &Vocabulary) -> NgramModel {
    let (a, b, c) = (vocab.id("A"), vocab.id("B"), vocab.id("C"));
    let (start, stop) = (vocab.start_id(), vocab.stop_id());
    let mut model = NgramModel::new(2);
    for word in [start, stop, a, b, c] {
        model.add(vec![word], -5.0, 0.0);
    }
    model.add(vec![start, a], -0.1, 0.0);
    model.add(vec![a, b], -0.2, 0.0);
    model.add(vec![b, c], -0.3, 0.0);
    model.add(vec![c, stop], -0.4, 0.0);
    model
}

pub(crate) fn decoder_with_lm(settings: DecoderSettings) -> Decoder {
    let mut config = config(settings);
    let model = bigram_lm(&config.vocab);
    config.attach_lm(model).expect("fixture lm must attach");
    Decoder::new(config)
}
