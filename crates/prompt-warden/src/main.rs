mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use audit_trail::AuditSink;
use embedding_client::{HashedEmbeddingProvider, HttpEmbeddingProvider, HttpProviderConfig};
use policy_core::{store, EmbeddingProvider, Evaluator, ExactCosine, YamlPolicyStore};

use crate::cli::{Cli, Command};
use crate::config::{Config, ProviderKind};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;
    if let Some(ref policies) = cli.policies {
        cfg.policy_file = policies.clone();
    }

    // 3. Init tracing-subscriber.  Logs go to stderr; stdout carries the
    //    evaluation result.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        config_file = %cli.config.display(),
        policy_file = %cfg.policy_file.display(),
        "prompt-warden starting"
    );

    match cli.command {
        Command::Evaluate {
            organization,
            user,
            prompt,
        } => run_evaluate(&cfg, &organization, &user, &prompt).await,
        Command::Prepare { force } => run_prepare(&cfg, force).await,
    }
}

/// Build the configured embedding provider.
fn build_provider(cfg: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match cfg.embeddings.provider {
        ProviderKind::Hashed => Ok(Arc::new(HashedEmbeddingProvider::new(
            cfg.embeddings.dimensions,
        ))),
        ProviderKind::Http => {
            let api_key = match &cfg.embeddings.api_key_env {
                Some(var) => Some(std::env::var(var).with_context(|| {
                    format!("embedding API key environment variable {var} is not set")
                })?),
                None => None,
            };
            let provider = HttpEmbeddingProvider::new(HttpProviderConfig {
                endpoint: cfg.embeddings.endpoint.clone(),
                api_key,
                model: cfg.embeddings.model.clone(),
                timeout: Duration::from_secs(cfg.embeddings.timeout_secs),
            })
            .context("failed to build HTTP embedding provider")?;
            Ok(Arc::new(provider))
        }
    }
}

async fn run_evaluate(cfg: &Config, organization: &str, user: &str, prompt: &str) -> Result<()> {
    let store = YamlPolicyStore::load(&cfg.policy_file).context("failed to load policy file")?;
    let provider = build_provider(cfg)?;

    let (audit, audit_handle) = AuditSink::start(&cfg.logging.audit_trail_path)
        .await
        .context("failed to open audit trail")?;

    let evaluator = Evaluator::new(store, provider, ExactCosine)
        .with_recorder(Arc::new(audit.clone()));

    let result = evaluator
        .evaluate(organization, user, prompt)
        .await
        .context("evaluation failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    // Close the audit channel so the writer flushes and exits.
    drop(evaluator);
    drop(audit);
    audit_handle.await.ok();

    if result.blocked {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_prepare(cfg: &Config, force: bool) -> Result<()> {
    let mut policies =
        store::load_policies(&cfg.policy_file).context("failed to load policy file")?;
    let provider = build_provider(cfg)?;

    let report = policy_core::prepare_rules(&mut policies, &provider, force)
        .await
        .context("failed to prepare rule embeddings")?;

    store::write_policies(&cfg.policy_file, &policies)
        .context("failed to write policy file")?;

    info!(
        policy_file = %cfg.policy_file.display(),
        embedded = report.embedded,
        unchanged = report.unchanged,
        "policy file updated"
    );
    Ok(())
}
