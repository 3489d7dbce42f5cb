//! Policy/rule snapshot store.
//!
//! The evaluator consumes the narrow [`PolicyStore`] capability:
//! `list_active_policies(organization_id)` returning each policy with its
//! rules embedded.  [`YamlPolicyStore`] is the file-backed implementation: a
//! YAML policy file is parsed and validated once, and evaluations run against
//! that snapshot.  Concurrent edits to the file never retroactively affect an
//! in-flight evaluation.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::schema::Policy;

/// Errors that can occur while loading or validating a policy set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write policy file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("invalid policy set: {0}")]
    Invalid(String),
}

/// External policy/rule store consumed by the evaluator.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// All active policies owned by `organization_id`, each with its rules
    /// embedded.
    async fn list_active_policies(&self, organization_id: &str)
        -> Result<Vec<Policy>, StoreError>;
}

/// On-disk shape of a policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    pub policies: Vec<Policy>,
}

/// Load and validate a policy file from disk.
pub fn load_policies(path: impl AsRef<Path>) -> Result<Vec<Policy>, StoreError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_policies(&contents)
}

/// Parse and validate a policy set from a YAML string.
pub fn parse_policies(yaml: &str) -> Result<Vec<Policy>, StoreError> {
    let file: PolicyFile = serde_yml::from_str(yaml)?;
    let mut policies = file.policies;
    for policy in &mut policies {
        for rule in &mut policy.rules {
            if rule.policy_id.is_empty() {
                rule.policy_id = policy.id.clone();
            }
        }
    }
    validate(&policies)?;
    Ok(policies)
}

/// Serialise a policy set back to a YAML policy file.
pub fn write_policies(path: impl AsRef<Path>, policies: &[Policy]) -> Result<(), StoreError> {
    let path = path.as_ref();
    let file = PolicyFile {
        policies: policies.to_vec(),
    };
    let yaml = serde_yml::to_string(&file)?;
    std::fs::write(path, yaml).map_err(|source| StoreError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn validate(policies: &[Policy]) -> Result<(), StoreError> {
    let mut policy_ids = HashSet::new();
    let mut rule_ids = HashSet::new();
    let mut embedding_dims: Option<usize> = None;

    for policy in policies {
        if policy.id.is_empty() {
            return Err(StoreError::Invalid("policy id must not be empty".into()));
        }
        if policy.organization_id.is_empty() {
            return Err(StoreError::Invalid(format!(
                "policy '{}' has no organization id",
                policy.id
            )));
        }
        if !policy_ids.insert(&policy.id) {
            return Err(StoreError::Invalid(format!(
                "duplicate policy id: '{}'",
                policy.id
            )));
        }
        if let Some(t) = policy.threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(StoreError::Invalid(format!(
                    "policy '{}' threshold {t} is outside [0, 1]",
                    policy.id
                )));
            }
        }

        for rule in &policy.rules {
            if rule.id.is_empty() {
                return Err(StoreError::Invalid(format!(
                    "policy '{}' contains a rule with no id",
                    policy.id
                )));
            }
            if !rule_ids.insert(&rule.id) {
                return Err(StoreError::Invalid(format!(
                    "duplicate rule id: '{}'",
                    rule.id
                )));
            }
            if rule.policy_id != policy.id {
                return Err(StoreError::Invalid(format!(
                    "rule '{}' names policy '{}' but is embedded under policy '{}'",
                    rule.id, rule.policy_id, policy.id
                )));
            }
            if let Some(t) = rule.threshold {
                if !(0.0..=1.0).contains(&t) {
                    return Err(StoreError::Invalid(format!(
                        "rule '{}' threshold {t} is outside [0, 1]",
                        rule.id
                    )));
                }
            }
            if let crate::schema::RuleKind::Semantic { embedding, .. } = &rule.kind {
                if !embedding.is_empty() {
                    match embedding_dims {
                        None => embedding_dims = Some(embedding.len()),
                        Some(dims) if dims != embedding.len() => {
                            return Err(StoreError::Invalid(format!(
                                "rule '{}' embedding has {} dimensions, expected {dims}",
                                rule.id,
                                embedding.len()
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

/// File-backed [`PolicyStore`] holding an in-memory snapshot.
#[derive(Debug, Clone)]
pub struct YamlPolicyStore {
    policies: Vec<Policy>,
}

impl YamlPolicyStore {
    /// Load a snapshot from a YAML policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            policies: load_policies(path)?,
        })
    }

    /// Build a store from an already-parsed policy set, re-validating it.
    pub fn new(policies: Vec<Policy>) -> Result<Self, StoreError> {
        validate(&policies)?;
        Ok(Self { policies })
    }
}

#[async_trait]
impl PolicyStore for YamlPolicyStore {
    async fn list_active_policies(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .policies
            .iter()
            .filter(|p| p.is_active && p.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
policies:
  - id: "pol_block"
    organization_id: "org_1"
    name: "Security"
    mode: blocklist
    threshold: 0.7
    rules:
      - id: "rule_kw"
        name: "password sharing"
        description: "blocks password sharing talk"
        created_at: "2026-02-01T08:00:00Z"
        type: keyword
        pattern: "share your password"
      - id: "rule_sem"
        name: "violence"
        created_at: "2026-01-15T08:00:00Z"
        type: semantic
        text: "violent content"
        embedding: [0.6, 0.8]
  - id: "pol_inactive"
    organization_id: "org_1"
    name: "Old"
    mode: blocklist
    is_active: false
  - id: "pol_other_org"
    organization_id: "org_2"
    name: "Other"
    mode: allowlist
"#;

    #[test]
    fn parses_and_fills_rule_policy_ids() {
        let policies = parse_policies(SAMPLE).unwrap();
        assert_eq!(policies.len(), 3);
        for rule in &policies[0].rules {
            assert_eq!(rule.policy_id, "pol_block");
        }
    }

    #[tokio::test]
    async fn lists_only_active_policies_of_the_organization() {
        let store = YamlPolicyStore::new(parse_policies(SAMPLE).unwrap()).unwrap();
        let policies = store.list_active_policies("org_1").await.unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].id, "pol_block");

        let other = store.list_active_policies("org_2").await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, "pol_other_org");

        let none = store.list_active_policies("org_unknown").await.unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn rejects_duplicate_policy_ids() {
        let yaml = r#"
policies:
  - id: "dup"
    organization_id: "org_1"
    name: "a"
    mode: blocklist
  - id: "dup"
    organization_id: "org_1"
    name: "b"
    mode: blocklist
"#;
        let err = parse_policies(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate policy id"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let yaml = r#"
policies:
  - id: "p"
    organization_id: "org_1"
    name: "a"
    mode: blocklist
    threshold: 1.5
"#;
        let err = parse_policies(yaml).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"), "{err}");
    }

    #[test]
    fn rejects_missing_organization() {
        let yaml = r#"
policies:
  - id: "p"
    organization_id: ""
    name: "a"
    mode: blocklist
"#;
        let err = parse_policies(yaml).unwrap_err();
        assert!(err.to_string().contains("no organization id"), "{err}");
    }

    #[test]
    fn rejects_inconsistent_embedding_dimensions() {
        let yaml = r#"
policies:
  - id: "p"
    organization_id: "org_1"
    name: "a"
    mode: blocklist
    rules:
      - id: "r1"
        name: "a"
        created_at: "2026-01-01T00:00:00Z"
        type: semantic
        text: "one"
        embedding: [0.1, 0.2]
      - id: "r2"
        name: "b"
        created_at: "2026-01-01T00:00:00Z"
        type: semantic
        text: "two"
        embedding: [0.1, 0.2, 0.3]
"#;
        let err = parse_policies(yaml).unwrap_err();
        assert!(err.to_string().contains("dimensions"), "{err}");
    }

    #[test]
    fn load_from_nonexistent_file_fails_with_path() {
        let err = load_policies("/does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("/does/not/exist.yaml"), "{err}");
    }

    #[test]
    fn round_trips_through_write_and_load() {
        let policies = parse_policies(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.yaml");
        write_policies(&path, &policies).unwrap();
        let reloaded = load_policies(&path).unwrap();
        assert_eq!(reloaded.len(), policies.len());
        assert_eq!(reloaded[0].rules.len(), policies[0].rules.len());
    }
}
