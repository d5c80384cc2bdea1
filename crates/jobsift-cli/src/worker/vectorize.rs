//! Vectorize worker: embed extracted postings and advance them.

use std::time::Duration;

use jobsift_core::{AppConfig, Stage};
use jobsift_embed::{embedding_input, EmbedClient};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs the vectorize worker loop.
///
/// # Errors
///
/// Returns an error if `EMBEDDING_URL` is unset, the embed client cannot be
/// built, or (with `once`) the single pass fails.
pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    batch: i64,
    idle_secs: u64,
    once: bool,
) -> anyhow::Result<()> {
    let url = config.embedding_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("EMBEDDING_URL is not set; cannot run the vectorize worker")
    })?;
    let client = EmbedClient::new(url, config.embedding_dim, config.embedding_timeout_secs)?;
    let worker_id = super::worker_id("vectorize");
    let lease_secs = config.worker_lease_secs;

    super::poll_loop("vectorize", Duration::from_secs(idle_secs), once, || {
        run_pass(pool, &client, batch, &worker_id, lease_secs)
    })
    .await
}

/// One vectorize pass: claim `extracted` postings, embed their snapshot text
/// in a single batch, and advance them to `vectorized`.
///
/// A failed embed call releases every claim and surfaces the error; statuses
/// are untouched, so the next pass retries the same postings. A claimed
/// posting without a snapshot is released and skipped.
async fn run_pass(
    pool: &PgPool,
    client: &EmbedClient,
    batch: i64,
    worker_id: &str,
    lease_secs: u64,
) -> anyhow::Result<usize> {
    let claimed =
        jobsift_db::claim_eligible(pool, Stage::Vectorization, batch, worker_id, lease_secs)
            .await?;
    if claimed.is_empty() {
        return Ok(0);
    }

    let mut ids: Vec<Uuid> = Vec::with_capacity(claimed.len());
    let mut inputs: Vec<String> = Vec::with_capacity(claimed.len());
    for row in &claimed {
        match jobsift_db::latest_snapshot(pool, row.id).await {
            Ok(Some(snapshot)) => {
                ids.push(row.id);
                inputs.push(embedding_input(&row.title, &row.company, &snapshot.full_text));
            }
            Ok(None) => {
                warn!(posting_id = %row.id, "extracted posting has no snapshot, releasing claim");
                release_quietly(pool, row.id).await;
            }
            Err(e) => {
                warn!(posting_id = %row.id, error = %e, "failed to load snapshot");
                release_quietly(pool, row.id).await;
            }
        }
    }
    if ids.is_empty() {
        return Ok(0);
    }

    let texts: Vec<&str> = inputs.iter().map(String::as_str).collect();
    let embeddings = match client.embed(&texts).await {
        Ok(embeddings) => embeddings,
        Err(e) => {
            for id in &ids {
                release_quietly(pool, *id).await;
            }
            return Err(e.into());
        }
    };

    let updates: Vec<(Uuid, pgvector::Vector)> = ids
        .into_iter()
        .zip(embeddings.into_iter().map(pgvector::Vector::from))
        .collect();
    let advanced = jobsift_db::record_vectors(pool, &updates).await?;

    info!(claimed = claimed.len(), advanced, "vectorized batch");
    Ok(usize::try_from(advanced).unwrap_or(usize::MAX))
}

async fn release_quietly(pool: &PgPool, posting_id: Uuid) {
    if let Err(e) = jobsift_db::release_claim(pool, posting_id).await {
        warn!(posting_id = %posting_id, error = %e, "failed to release claim");
    }
}
