//! Stateless match predicates for the two rule types.
//!
//! [`KeywordMatcher`] tests a rule's literal/regex pattern against the
//! prompt, compiling each pattern at most once per (rule id, pattern text).
//! [`SemanticMatcher`] compares a rule's stored embedding against the
//! prompt's embedding through a [`VectorIndex`] and applies the resolved
//! threshold with strict inequality.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::schema::DEFAULT_SEMANTIC_THRESHOLD;
use crate::vector::{SimilarityError, VectorIndex};

/// Resolve the similarity cutoff for one semantic rule: rule-level override,
/// else policy-level default, else the system default.
pub fn effective_threshold(rule: Option<f64>, policy: Option<f64>) -> f64 {
    rule.or(policy).unwrap_or(DEFAULT_SEMANTIC_THRESHOLD)
}

// ---------------------------------------------------------------------------
// Keyword matching
// ---------------------------------------------------------------------------

/// A keyword pattern compiled into its evaluable form.
#[derive(Debug, Clone)]
enum CompiledPattern {
    /// Case-insensitive substring test; the needle is stored lowercased.
    Substring(String),
    Regex(Regex),
    /// Malformed `/body/flags` pattern.  Never matches; the compile failure
    /// was logged once when the pattern entered the cache.
    Invalid,
}

#[derive(Debug, Clone)]
struct CacheSlot {
    /// Pattern text the compiled form was built from.  A rule whose pattern
    /// changes gets recompiled on its next evaluation.
    pattern: String,
    compiled: CompiledPattern,
}

/// Keyword rule predicate with a per-rule compiled-pattern cache.
#[derive(Debug, Default)]
pub struct KeywordMatcher {
    cache: RwLock<HashMap<String, CacheSlot>>,
}

impl KeywordMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Does `pattern` (belonging to the rule `rule_id`) appear in `prompt`?
    ///
    /// A pattern delimited as `/body/flags` is treated as a regular
    /// expression; anything else is a case-insensitive substring test.  A
    /// malformed regex never matches and never aborts evaluation.
    pub fn is_match(&self, rule_id: &str, pattern: &str, prompt: &str) -> bool {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = cache.get(rule_id) {
                if slot.pattern == pattern {
                    return Self::test(&slot.compiled, prompt);
                }
            }
        }

        let compiled = compile_pattern(rule_id, pattern);
        let matched = Self::test(&compiled, prompt);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            rule_id.to_string(),
            CacheSlot {
                pattern: pattern.to_string(),
                compiled,
            },
        );
        matched
    }

    fn test(compiled: &CompiledPattern, prompt: &str) -> bool {
        match compiled {
            CompiledPattern::Substring(needle) => prompt.to_lowercase().contains(needle),
            CompiledPattern::Regex(re) => re.is_match(prompt),
            CompiledPattern::Invalid => false,
        }
    }
}

fn compile_pattern(rule_id: &str, pattern: &str) -> CompiledPattern {
    let Some((body, flags)) = split_delimited(pattern) else {
        return CompiledPattern::Substring(pattern.to_lowercase());
    };

    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            // `g`, `u`, and `y` affect iteration semantics, not whether the
            // pattern matches; accepted and ignored.
            _ => {}
        }
    }

    match builder.build() {
        Ok(re) => CompiledPattern::Regex(re),
        Err(e) => {
            warn!(
                rule = rule_id,
                pattern,
                error = %e,
                "failed to compile keyword rule regex; treating as non-match"
            );
            CompiledPattern::Invalid
        }
    }
}

/// Split a `/body/flags` pattern into body and flags.  Returns `None` when
/// the pattern is not slash-delimited (leading slash, trailing slash followed
/// only by valid flag characters).
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let idx = rest.rfind('/')?;
    let body = &rest[..idx];
    let flags = &rest[idx + 1..];
    if flags.chars().all(|c| matches!(c, 'g' | 'i' | 'm' | 'u' | 'y')) {
        Some((body, flags))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Semantic matching
// ---------------------------------------------------------------------------

/// Semantic rule predicate backed by a [`VectorIndex`].
#[derive(Debug)]
pub struct SemanticMatcher<V> {
    index: V,
}

impl<V: VectorIndex> SemanticMatcher<V> {
    pub fn new(index: V) -> Self {
        Self { index }
    }

    /// Compare a rule's embedding against the prompt's embedding.
    ///
    /// Returns `Ok(Some(score))` when `score > threshold` (strict: a score
    /// exactly equal to the threshold does not match), `Ok(None)` otherwise.
    /// A similarity-computation failure propagates; a blocking decision
    /// cannot be trusted without it.
    pub fn check(
        &self,
        rule_id: &str,
        rule_embedding: &[f32],
        prompt_embedding: &[f32],
        threshold: f64,
    ) -> Result<Option<f64>, SimilarityError> {
        let score = self.index.similarity(rule_embedding, prompt_embedding)?;
        debug!(rule = rule_id, score, threshold, "semantic match check");

        if score > threshold {
            Ok(Some(score))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ExactCosine;

    // ---- threshold precedence ----

    #[test]
    fn rule_threshold_wins_over_policy() {
        assert_eq!(effective_threshold(Some(0.9), Some(0.5)), 0.9);
    }

    #[test]
    fn policy_threshold_used_when_rule_unset() {
        assert_eq!(effective_threshold(None, Some(0.6)), 0.6);
    }

    #[test]
    fn system_default_used_when_both_unset() {
        assert_eq!(effective_threshold(None, None), DEFAULT_SEMANTIC_THRESHOLD);
    }

    // ---- keyword: substring ----

    #[test]
    fn substring_is_case_insensitive() {
        let m = KeywordMatcher::new();
        assert!(m.is_match("r1", "reset password", "Please RESET PASSWORD now"));
        assert!(m.is_match("r1", "Reset Password", "please reset password now"));
    }

    #[test]
    fn substring_requires_presence() {
        let m = KeywordMatcher::new();
        assert!(!m.is_match("r1", "reset password", "hello there"));
    }

    // ---- keyword: regex ----

    #[test]
    fn delimited_pattern_is_a_regex() {
        let m = KeywordMatcher::new();
        assert!(m.is_match("r1", "/ssn|social.?security/i", "what is your SSN"));
        assert!(m.is_match("r1", "/ssn|social.?security/i", "my social security number"));
        assert!(!m.is_match("r1", "/ssn|social.?security/i", "hello"));
    }

    #[test]
    fn regex_without_i_flag_is_case_sensitive() {
        let m = KeywordMatcher::new();
        assert!(m.is_match("r1", "/SSN/", "my SSN"));
        assert!(!m.is_match("r1", "/SSN/", "my ssn"));
    }

    #[test]
    fn malformed_regex_never_matches_and_does_not_panic() {
        let m = KeywordMatcher::new();
        assert!(!m.is_match("r1", "/[/", "anything at all"));
        // Still usable afterwards.
        assert!(m.is_match("r2", "hello", "well hello"));
    }

    #[test]
    fn undelimited_slash_pattern_is_a_substring() {
        // No trailing slash, so this is a literal, not a regex.
        let m = KeywordMatcher::new();
        assert!(m.is_match("r1", "/etc", "look at /etc/passwd"));
        assert!(!m.is_match("r2", "/a.c", "abc"));
    }

    #[test]
    fn trailing_garbage_after_slash_is_not_flags() {
        let m = KeywordMatcher::new();
        // `/x` after the closing slash is not a valid flag set, so the whole
        // thing is a substring test.
        assert!(m.is_match("r1", "/foo/xq", "a /foo/xq b"));
        assert!(!m.is_match("r1", "/foo/xq", "foo"));
    }

    // ---- keyword: cache ----

    #[test]
    fn changed_pattern_recompiles() {
        let m = KeywordMatcher::new();
        assert!(m.is_match("r1", "alpha", "alpha bravo"));
        // Same rule id, new pattern text: the stale compiled form must not
        // be reused.
        assert!(!m.is_match("r1", "charlie", "alpha bravo"));
        assert!(m.is_match("r1", "charlie", "charlie delta"));
    }

    // ---- semantic ----

    #[test]
    fn score_above_threshold_matches() {
        let m = SemanticMatcher::new(ExactCosine);
        // cosine([1,0], [0.6,0.8]) == 0.6 exactly.
        let hit = m.check("r1", &[1.0, 0.0], &[0.6, 0.8], 0.55).unwrap();
        let score = hit.expect("0.6 > 0.55 should match");
        assert!((score - 0.6).abs() < 1e-7);
    }

    #[test]
    fn score_equal_to_threshold_does_not_match() {
        let m = SemanticMatcher::new(ExactCosine);
        // Identical unit vectors score exactly 1.0; equality is not a match.
        let hit = m.check("r1", &[1.0, 0.0], &[1.0, 0.0], 1.0).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn score_just_above_threshold_matches() {
        let m = SemanticMatcher::new(ExactCosine);
        let hit = m.check("r1", &[1.0, 0.0], &[1.0, 0.0], 0.999).unwrap();
        let score = hit.expect("1.0 > 0.999 should match");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn similarity_failure_propagates() {
        let m = SemanticMatcher::new(ExactCosine);
        let err = m.check("r1", &[1.0, 0.0], &[1.0], 0.5).unwrap_err();
        assert!(matches!(err, SimilarityError::DimensionMismatch { .. }));
    }
}
