//! Embedding providers for knowledge bases.
//!
//! The provider is chosen per base from its `config.yaml` and used for both
//! ingestion and query embedding, so stored and query vectors always match.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
