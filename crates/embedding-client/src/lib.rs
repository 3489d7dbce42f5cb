//! # embedding-client
//!
//! Implementations of the [`EmbeddingProvider`](policy_core::EmbeddingProvider)
//! boundary consumed by the prompt-warden evaluator.
//!
//! Two providers are included:
//!
//! 1. **[`http`]** — a thin HTTP client for an external embedding API, with
//!    a request timeout on the critical path.
//! 2. **[`hashed`]** — a deterministic in-process provider derived from a
//!    SHA-256 digest of the input text.  It carries no semantic meaning and
//!    exists for offline runs and tests, where only determinism and stable
//!    dimensionality matter.

pub mod hashed;
pub mod http;

pub use hashed::HashedEmbeddingProvider;
pub use http::{HttpEmbeddingProvider, HttpProviderConfig};
