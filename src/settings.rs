//! Decoder settings loaded from TOML.
//!
//! - Default values are embedded via `include_str!("default_settings.toml")`
//! - `parse_settings_toml` validates numeric ranges and reports the offending
//!   field path, so bad configurations fail before any sentence is decoded
//! - Feature weights live in the `[weights]` table, keyed by feature name

use std::collections::HashMap;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderSettings {
    pub search: SearchSettings,
    pub pruning: PruningSettings,
    pub features: FeatureSettings,
    pub output: OutputSettings,
    #[serde(default)]
    pub weights: HashMap<String, f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub goal_symbol: String,
    pub default_nonterminal: String,
    pub span_limit: usize,
    pub max_source_len: usize,
    pub time_budget_ms: u64,
    pub threads: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruningPolicy {
    Beam,
    Histogram,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PruningSettings {
    pub policy: PruningPolicy,
    pub beam_width: f32,
    pub histogram_cap: usize,
    pub per_lhs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSettings {
    pub word_penalty: bool,
    pub oov_penalty: bool,
    pub oov_log_prob: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    pub format: String,
    pub kbest: usize,
    pub unique: bool,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<DecoderSettings, SettingsError> {
    let s: DecoderSettings =
        toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn invalid(field: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn validate(s: &DecoderSettings) -> Result<(), SettingsError> {
    if s.search.goal_symbol.is_empty() {
        return Err(invalid("search.goal_symbol", "must not be empty"));
    }
    if s.search.default_nonterminal.is_empty() {
        return Err(invalid("search.default_nonterminal", "must not be empty"));
    }
    if s.search.max_source_len == 0 {
        return Err(invalid("search.max_source_len", "must be positive"));
    }
    if s.search.threads == 0 {
        return Err(invalid("search.threads", "must be positive"));
    }
    if !(s.pruning.beam_width >= 0.0) {
        return Err(invalid("pruning.beam_width", "must be non-negative"));
    }
    if s.pruning.histogram_cap == 0 {
        return Err(invalid("pruning.histogram_cap", "must be positive"));
    }
    if s.features.oov_log_prob > 0.0 {
        return Err(invalid("features.oov_log_prob", "must be non-positive"));
    }
    if s.output.format.is_empty() {
        return Err(invalid("output.format", "must not be empty"));
    }
    Ok(())
}

impl Default for DecoderSettings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("embedded settings TOML must be valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.search.goal_symbol, "GOAL");
        assert_eq!(s.search.default_nonterminal, "X");
        assert_eq!(s.search.span_limit, 20);
        assert_eq!(s.search.max_source_len, 200);
        assert_eq!(s.search.threads, 1);
        assert_eq!(s.pruning.policy, PruningPolicy::Beam);
        assert!((s.pruning.beam_width - 20.0).abs() < f32::EPSILON);
        assert_eq!(s.pruning.histogram_cap, 50);
        assert!(!s.pruning.per_lhs);
        assert!(!s.features.word_penalty);
        assert!(s.features.oov_penalty);
        assert_eq!(s.output.format, "%i ||| %s ||| %c");
        assert_eq!(s.output.kbest, 1);
        assert!(s.output.unique);
        assert!(s.weights.is_empty());
    }

    #[test]
    fn parse_custom_weights() {
        let mut toml = DEFAULT_SETTINGS_TOML.to_string();
        toml.push_str("\n\"lm_0\" = 1.5\n\"glue_0\" = -1.0\n");
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.weights.get("lm_0"), Some(&1.5));
        assert_eq!(s.weights.get("glue_0"), Some(&-1.0));
    }

    #[test]
    fn error_zero_threads() {
        let toml = DEFAULT_SETTINGS_TOML.replace("threads = 1", "threads = 0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("search.threads"));
    }

    #[test]
    fn error_negative_beam() {
        let toml = DEFAULT_SETTINGS_TOML.replace("beam_width = 20.0", "beam_width = -1.0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("pruning.beam_width"));
    }

    #[test]
    fn error_unknown_policy() {
        let toml = DEFAULT_SETTINGS_TOML.replace("policy = \"beam\"", "policy = \"cube\"");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_section() {
        let err = parse_settings_toml("[search]\ngoal_symbol = \"GOAL\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
