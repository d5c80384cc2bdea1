//! `ingest` command: feed discovery output into the pipeline.

use std::path::Path;

use anyhow::Context;
use jobsift_core::CandidatePosting;
use sqlx::PgPool;

/// Reads a JSON array of discovery candidates and upserts them.
///
/// Re-running over the same file is a no-op: identity conflicts are skipped
/// by the repository, so only genuinely new postings are counted.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the batch
/// insert fails.
pub(crate) async fn run_ingest(pool: &PgPool, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read candidate file {}", file.display()))?;
    let candidates: Vec<CandidatePosting> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse candidate file {}", file.display()))?;

    if candidates.is_empty() {
        println!("no candidates in {}", file.display());
        return Ok(());
    }

    let inserted = jobsift_db::upsert_discovered(pool, &candidates).await?;
    let skipped = candidates.len() as u64 - inserted;
    println!(
        "ingested {inserted} new postings ({skipped} already known) from {}",
        file.display()
    );

    Ok(())
}
