//! Analyze worker: run the two-stage judgment over claimed postings.

use std::sync::Arc;
use std::time::Duration;

use jobsift_analysis::{
    Analyzer, JudgmentContext, ListingInput, LlmProvider, RetryPolicy, StructuredListing,
};
use jobsift_core::{AppConfig, Stage, Stage2FailurePolicy};
use jobsift_db::{NewAnalysis, PostingRow};
use sqlx::PgPool;
use tracing::{info, warn};

/// Runs the analyze worker loop.
///
/// # Errors
///
/// Returns an error if (with `once`) the single pass fails.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    provider: Arc<dyn LlmProvider>,
    batch: i64,
    idle_secs: u64,
    once: bool,
    role: Option<String>,
) -> anyhow::Result<()> {
    let analyzer = Analyzer::new(provider, RetryPolicy::from_app_config(config));
    let context = JudgmentContext { user_role: role };
    let worker_id = super::worker_id("analyze");
    let lease_secs = config.worker_lease_secs;
    let policy = config.stage2_failure_policy;

    super::poll_loop("analyze", Duration::from_secs(idle_secs), once, || {
        run_pass(
            pool, &analyzer, &context, batch, &worker_id, lease_secs, policy,
        )
    })
    .await
}

/// One analyze pass: claim eligible postings and run each through the full
/// pipeline sequentially.
///
/// Per-item failures (missing snapshot, repository write errors) release the
/// claim and continue; the pass itself only fails when claiming does.
async fn run_pass(
    pool: &PgPool,
    analyzer: &Analyzer,
    context: &JudgmentContext,
    batch: i64,
    worker_id: &str,
    lease_secs: u64,
    policy: Stage2FailurePolicy,
) -> anyhow::Result<usize> {
    let claimed =
        jobsift_db::claim_eligible(pool, Stage::Judgment, batch, worker_id, lease_secs).await?;

    let mut processed = 0usize;
    for row in &claimed {
        match analyze_one(pool, analyzer, context, row, policy).await {
            Ok(()) => processed += 1,
            Err(e) => {
                warn!(posting_id = %row.id, error = %e, "analysis failed, releasing claim");
                if let Err(release_err) = jobsift_db::release_claim(pool, row.id).await {
                    warn!(posting_id = %row.id, error = %release_err, "failed to release claim");
                }
            }
        }
    }

    Ok(processed)
}

/// Analyzes one claimed posting and persists the outcome.
///
/// Attributes stored by an earlier pass skip stage 1 entirely; freshly
/// extracted facts are written through `record_stage1` before the judgment is
/// stored. `run_full` never fails, so even provider outages end in a stored
/// (failure) analysis here — only repository errors surface.
async fn analyze_one(
    pool: &PgPool,
    analyzer: &Analyzer,
    context: &JudgmentContext,
    row: &PostingRow,
    policy: Stage2FailurePolicy,
) -> anyhow::Result<()> {
    let snapshot = jobsift_db::latest_snapshot(pool, row.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("posting has no snapshot text"))?;

    let prior = row.attributes.clone().and_then(|value| {
        match serde_json::from_value::<StructuredListing>(value) {
            Ok(facts) => Some(facts),
            Err(e) => {
                warn!(posting_id = %row.id, error = %e, "stored attributes unreadable, re-extracting");
                None
            }
        }
    });

    let input = ListingInput {
        title: row.title.clone(),
        company: row.company.clone(),
        full_text: snapshot.full_text,
    };

    let outcome = analyzer.run_full(&input, prior, context).await;

    if let Some(facts) = &outcome.structured {
        let attributes = serde_json::to_value(facts)?;
        jobsift_db::record_stage1(pool, row.id, &attributes).await?;
    }

    let analysis = NewAnalysis {
        trust_score: outcome.trust_score,
        verdict: &outcome.verdict,
        red_flags: serde_json::to_value(&outcome.red_flags)?,
        toxic_phrases: serde_json::to_value(&outcome.toxic_phrases)?,
        honest_summary: &outcome.honest_summary,
        provider: &outcome.provider,
        model: &outcome.model,
        prompt_tokens: outcome.usage.prompt_tokens,
        completion_tokens: outcome.usage.completion_tokens,
        error_message: outcome.error_message.as_deref(),
    };
    let analysis_id = jobsift_db::record_stage2(pool, row.id, &analysis, policy).await?;

    info!(
        posting_id = %row.id,
        analysis_id = %analysis_id,
        verdict = %outcome.verdict,
        trust_score = outcome.trust_score,
        tokens = outcome.usage.total(),
        "posting analyzed"
    );
    Ok(())
}
