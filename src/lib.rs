//! Chart-based decoder for hierarchical phrase-based translation.
//!
//! Builds a hypergraph over source spans via bottom-up CYK parsing against a
//! synchronous grammar, scores hyperedges with pluggable feature functions
//! (including a stateful n-gram language model), and extracts the k highest
//! scoring derivations lazily from the finished hypergraph.

pub mod chart;
pub mod decoder;
pub mod ff;
pub mod grammar;
pub mod hypergraph;
pub mod sentence;
pub mod settings;
pub mod vocab;

#[cfg(test)]
pub(crate) mod testutil;

pub use decoder::{ConfigError, Decoder, DecoderConfig, Translation};
pub use settings::{parse_settings_toml, DecoderSettings};
pub use vocab::{Vocabulary, WordId};
