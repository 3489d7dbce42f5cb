use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Similarity cutoff applied to semantic rules when neither the rule nor its
/// policy carries an explicit threshold.
pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.55;

/// How a policy's rules aggregate into a decision.
///
/// A blocklist policy blocks the prompt as soon as any of its rules matches.
/// An allowlist policy inverts that: the prompt is allowed only when at least
/// one rule matches, and blocked when none do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Blocklist,
    Allowlist,
}

/// An organization-scoped container of rules with a mode and a default
/// similarity threshold for its semantic rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mode: PolicyMode,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Default threshold for semantic rules under this policy, in `[0, 1]`.
    /// Individual rules may override it; see [`crate::effective_threshold`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn default_active() -> bool {
    true
}

/// An atomic match predicate belonging to exactly one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// Filled from the owning policy when loaded from a policy file.
    #[serde(default)]
    pub policy_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Per-rule similarity threshold override, in `[0, 1]`.  Semantic rules
    /// only; ignored for keyword rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

/// The match predicate itself, tagged by rule type.
///
/// Exactly one payload is meaningful per rule: keyword rules carry a pattern,
/// semantic rules carry the descriptive text and its stored embedding.  A
/// rule whose type changes away from semantic loses its embedding with the
/// variant, so no stale vector can survive a type change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Literal substring (case-insensitive) or `/body/flags`-delimited regex
    /// tested against the prompt.
    Keyword { pattern: String },
    /// Embedding compared against the prompt's embedding by cosine
    /// similarity.  `text` is the descriptive text the embedding is derived
    /// from; `embedding` is provider-defined in dimension and is computed by
    /// [`crate::prepare_rules`] when the rule is created or its text changes.
    Semantic {
        text: String,
        #[serde(default)]
        embedding: Vec<f32>,
    },
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::Keyword { .. } => RuleType::Keyword,
            RuleKind::Semantic { .. } => RuleType::Semantic,
        }
    }
}

/// Discriminant-only view of [`RuleKind`], reported in evaluation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Keyword,
    Semantic,
}

/// The outcome of evaluating one prompt against an organization's active
/// policies.  Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    /// Id of the rule that triggered the block, if a specific rule did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Id of the policy the decision is attributed to.  When an allowlist
    /// phase blocks because no rule matched, this is the first allow policy's
    /// id and is not authoritative about which policies were evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,
}

impl EvaluationResult {
    /// An unrestricted "allowed" result with no matched rule or policy.
    pub fn allowed() -> Self {
        Self {
            blocked: false,
            block_reason: None,
            matched_rule: None,
            matched_policy: None,
            similarity_score: None,
            rule_type: None,
        }
    }
}
