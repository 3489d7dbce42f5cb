//! Rule-embedding preparation.
//!
//! A semantic rule's embedding is derived from its descriptive text by the
//! embedding provider.  [`prepare_rules`] walks a policy set and fills in
//! every missing embedding (or recomputes all of them with `force`, for use
//! after rule text edits).  Keyword rules carry no embedding at all, so a
//! rule whose type changed away from semantic needs no explicit clearing.

use tracing::{debug, info};

use crate::provider::{EmbeddingError, EmbeddingProvider};
use crate::schema::{Policy, RuleKind};

/// What [`prepare_rules`] did to a policy set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Semantic rules whose embedding was (re)computed.
    pub embedded: usize,
    /// Semantic rules left untouched (already embedded, no `force`).
    pub unchanged: usize,
}

/// Fill in embeddings for the semantic rules of `policies`.
///
/// Embeds each semantic rule's text when the rule has no embedding yet, or
/// unconditionally when `force` is set.  Fails on the first provider error;
/// policies already updated keep their new embeddings, so a retry resumes
/// where it stopped.
pub async fn prepare_rules<P: EmbeddingProvider>(
    policies: &mut [Policy],
    provider: &P,
    force: bool,
) -> Result<PrepareReport, EmbeddingError> {
    let mut report = PrepareReport::default();

    for policy in policies.iter_mut() {
        for rule in policy.rules.iter_mut() {
            let RuleKind::Semantic { text, embedding } = &mut rule.kind else {
                continue;
            };
            if !embedding.is_empty() && !force {
                report.unchanged += 1;
                continue;
            }
            debug!(rule = %rule.id, "embedding semantic rule text");
            *embedding = provider.embed(text).await?;
            report.embedded += 1;
        }
    }

    info!(
        embedded = report.embedded,
        unchanged = report.unchanged,
        "prepared semantic rule embeddings"
    );
    Ok(report)
}
