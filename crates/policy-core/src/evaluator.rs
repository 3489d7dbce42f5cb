//! Evaluation orchestrator.
//!
//! Fetches an organization's active policies, partitions them by mode,
//! applies allow-then-block evaluation order, and returns a single
//! [`EvaluationResult`].  Within one evaluation the prompt embedding is
//! computed at most once, lazily, and reused across every semantic rule
//! check and across policies.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::matcher::{effective_threshold, KeywordMatcher, SemanticMatcher};
use crate::provider::{EmbeddingError, EmbeddingProvider};
use crate::record::{DecisionRecord, DecisionRecorder};
use crate::schema::{EvaluationResult, Policy, PolicyMode, Rule, RuleKind, RuleType};
use crate::store::{PolicyStore, StoreError};
use crate::vector::{SimilarityError, VectorIndex};

/// Reason reported when an allowlist phase exhausts its policies without any
/// rule matching the prompt.
const OFF_TOPIC_REASON: &str = "content not on approved topic list";

/// Errors that abort an evaluation.
///
/// A malformed keyword regex is *not* here: it is recovered locally inside
/// the keyword matcher (logged, rule treated as non-matching) so that a
/// broken rule cannot decide fail-open/fail-closed on its own.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Missing or invalid request fields; rejected before any policy fetch.
    #[error("invalid evaluation request: {0}")]
    Validation(String),

    /// A policy surfaced for an organization that does not own it.
    #[error("policy '{policy_id}' does not belong to organization '{organization_id}'")]
    PolicyAccess {
        policy_id: String,
        organization_id: String,
    },

    /// The policy store failed to produce the active-policy snapshot.
    #[error("failed to load policies: {0}")]
    Store(#[from] StoreError),

    /// The prompt embedding could not be computed.  Fatal for this
    /// evaluation; the remaining semantic phase is cancelled rather than
    /// evaluated with a stale or partial vector.
    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A similarity computation failed.  Fatal for this evaluation; an
    /// indeterminate semantic check must not become a silent "no match".
    #[error("similarity computation failed: {0}")]
    Similarity(#[from] SimilarityError),
}

/// A single rule match bubbling up from a policy.
#[derive(Debug, Clone)]
struct RuleMatch {
    rule_id: String,
    rule_name: String,
    rule_description: Option<String>,
    policy_id: String,
    rule_type: RuleType,
    similarity_score: Option<f64>,
}

/// Lazily computed prompt embedding, shared across every semantic rule check
/// of one evaluation.
struct PromptEmbedding<'a, P> {
    provider: &'a P,
    text: &'a str,
    cached: Option<Vec<f32>>,
}

impl<'a, P: EmbeddingProvider> PromptEmbedding<'a, P> {
    fn new(provider: &'a P, text: &'a str) -> Self {
        Self {
            provider,
            text,
            cached: None,
        }
    }

    async fn get(&mut self) -> Result<&[f32], EvalError> {
        if self.cached.is_none() {
            let vector = self.provider.embed(self.text).await?;
            debug!(dimensions = vector.len(), "computed prompt embedding");
            self.cached = Some(vector);
        }
        Ok(self.cached.as_deref().expect("embedding cached above"))
    }
}

/// The evaluation orchestrator.
///
/// Stateless per request: matchers hold no per-request state and concurrent
/// evaluations only share read-only access to the policy snapshot.
pub struct Evaluator<S, P, V> {
    store: S,
    provider: P,
    keyword: KeywordMatcher,
    semantic: SemanticMatcher<V>,
    recorder: Option<Arc<dyn DecisionRecorder>>,
}

impl<S, P, V> Evaluator<S, P, V>
where
    S: PolicyStore,
    P: EmbeddingProvider,
    V: VectorIndex,
{
    pub fn new(store: S, provider: P, index: V) -> Self {
        Self {
            store,
            provider,
            keyword: KeywordMatcher::new(),
            semantic: SemanticMatcher::new(index),
            recorder: None,
        }
    }

    /// Attach a decision recorder.  Every completed evaluation is forwarded
    /// to it before the result is returned; a recording failure is logged
    /// and the decision stands.
    pub fn with_recorder(mut self, recorder: Arc<dyn DecisionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Evaluate `prompt` against the active policies of `organization_id`.
    pub async fn evaluate(
        &self,
        organization_id: &str,
        user_id: &str,
        prompt: &str,
    ) -> Result<EvaluationResult, EvalError> {
        if organization_id.trim().is_empty() {
            return Err(EvalError::Validation("organization id is required".into()));
        }
        if prompt.trim().is_empty() {
            return Err(EvalError::Validation("prompt must not be empty".into()));
        }

        let policies = self.store.list_active_policies(organization_id).await?;
        for policy in &policies {
            if policy.organization_id != organization_id {
                return Err(EvalError::PolicyAccess {
                    policy_id: policy.id.clone(),
                    organization_id: organization_id.to_string(),
                });
            }
        }

        debug!(
            organization = organization_id,
            policies = policies.len(),
            "evaluating prompt"
        );

        let mut prompt_embedding = PromptEmbedding::new(&self.provider, prompt);
        let (allow, block): (Vec<&Policy>, Vec<&Policy>) = policies
            .iter()
            .partition(|p| p.mode == PolicyMode::Allowlist);

        let result = self
            .decide(&allow, &block, prompt, &mut prompt_embedding)
            .await?;

        if let Some(recorder) = &self.recorder {
            let record = DecisionRecord {
                organization_id: organization_id.to_string(),
                user_id: user_id.to_string(),
                prompt: prompt.to_string(),
                result: result.clone(),
                timestamp: Utc::now(),
            };
            if let Err(err) = recorder.record(&record).await {
                warn!(%err, "failed to record evaluation decision; decision stands");
            }
        }

        Ok(result)
    }

    /// Allow-then-block evaluation order.
    ///
    /// When any allowlist policy exists the allow phase always decides: a
    /// match means allowed, exhaustion means blocked as off-topic.  The
    /// block phase only runs when there are no allowlist policies.
    async fn decide(
        &self,
        allow: &[&Policy],
        block: &[&Policy],
        prompt: &str,
        prompt_embedding: &mut PromptEmbedding<'_, P>,
    ) -> Result<EvaluationResult, EvalError> {
        if !allow.is_empty() {
            for policy in allow {
                if self
                    .find_match(policy, prompt, prompt_embedding)
                    .await?
                    .is_some()
                {
                    return Ok(EvaluationResult::allowed());
                }
            }
            // Nothing on the approved list matched.  The reported policy id
            // is the first allow policy; it is not authoritative about which
            // policies were evaluated.
            return Ok(EvaluationResult {
                blocked: true,
                block_reason: Some(OFF_TOPIC_REASON.to_string()),
                matched_rule: None,
                matched_policy: Some(allow[0].id.clone()),
                similarity_score: None,
                rule_type: None,
            });
        }

        for policy in block {
            if let Some(hit) = self.find_match(policy, prompt, prompt_embedding).await? {
                return Ok(EvaluationResult {
                    blocked: true,
                    block_reason: Some(hit.rule_description.unwrap_or(hit.rule_name)),
                    matched_rule: Some(hit.rule_id),
                    matched_policy: Some(hit.policy_id),
                    similarity_score: hit.similarity_score,
                    rule_type: Some(hit.rule_type),
                });
            }
        }

        // No policies, or no block policy matched.
        Ok(EvaluationResult::allowed())
    }

    /// Evaluate one policy's rules in deterministic order and return the
    /// first match, short-circuiting the remaining rules.
    async fn find_match(
        &self,
        policy: &Policy,
        prompt: &str,
        prompt_embedding: &mut PromptEmbedding<'_, P>,
    ) -> Result<Option<RuleMatch>, EvalError> {
        for rule in ordered_rules(policy) {
            match &rule.kind {
                RuleKind::Keyword { pattern } => {
                    if self.keyword.is_match(&rule.id, pattern, prompt) {
                        debug!(rule = %rule.id, policy = %policy.id, "keyword rule matched");
                        return Ok(Some(rule_match(rule, policy, None)));
                    }
                }
                RuleKind::Semantic { embedding, .. } => {
                    if embedding.is_empty() {
                        warn!(
                            rule = %rule.id,
                            "semantic rule has no embedding; skipping (run prepare)"
                        );
                        continue;
                    }
                    let prompt_vector = prompt_embedding.get().await?;
                    let threshold = effective_threshold(rule.threshold, policy.threshold);
                    if let Some(score) =
                        self.semantic
                            .check(&rule.id, embedding, prompt_vector, threshold)?
                    {
                        debug!(rule = %rule.id, policy = %policy.id, score, "semantic rule matched");
                        return Ok(Some(rule_match(rule, policy, Some(score))));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Rules in evaluation order: creation time descending, id ascending as
/// tie-break.
fn ordered_rules(policy: &Policy) -> Vec<&Rule> {
    let mut rules: Vec<&Rule> = policy.rules.iter().collect();
    rules.sort_by(|a, b| {
        Reverse(a.created_at)
            .cmp(&Reverse(b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    rules
}

fn rule_match(rule: &Rule, policy: &Policy, similarity_score: Option<f64>) -> RuleMatch {
    RuleMatch {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        rule_description: rule.description.clone(),
        policy_id: policy.id.clone(),
        rule_type: rule.kind.rule_type(),
        similarity_score,
    }
}
