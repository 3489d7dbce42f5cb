//! # policy-core
//!
//! Core prompt-policy evaluation logic for the prompt-warden project.  Given
//! a free-text prompt and the organization that submitted it, this crate
//! decides whether the prompt is allowed or blocked, and if blocked,
//! identifies the triggering rule, policy, and similarity score.
//!
//! Two matching strategies are combined: literal/regex keyword matching and
//! embedding-based semantic similarity.  Policies carry one of two opposite
//! aggregation modes (blocklist vs allowlist), and an organization may have
//! several active policies at once.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use policy_core::{Evaluator, ExactCosine, YamlPolicyStore};
//! # use policy_core::{EmbeddingError, EmbeddingProvider};
//! # struct MyProvider;
//! # #[async_trait::async_trait]
//! # impl EmbeddingProvider for MyProvider {
//! #     async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> { Ok(vec![]) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = YamlPolicyStore::load("policies.yaml")?;
//! let evaluator = Evaluator::new(store, MyProvider, ExactCosine);
//! let result = evaluator.evaluate("org_123", "user_456", "how do I reset my password?").await?;
//! println!("blocked: {}", result.blocked);
//! # Ok(())
//! # }
//! ```

mod evaluator;
mod matcher;
pub mod prepare;
pub mod provider;
mod record;
mod schema;
pub mod store;
pub mod vector;

// Re-export primary public API at crate root.
pub use evaluator::{EvalError, Evaluator};
pub use matcher::{effective_threshold, KeywordMatcher, SemanticMatcher};
pub use prepare::{prepare_rules, PrepareReport};
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use record::{DecisionRecord, DecisionRecorder, RecordError};
pub use schema::{
    EvaluationResult, Policy, PolicyMode, Rule, RuleKind, RuleType, DEFAULT_SEMANTIC_THRESHOLD,
};
pub use store::{PolicyStore, StoreError, YamlPolicyStore};
pub use vector::{ExactCosine, SimilarityError, VectorIndex};
