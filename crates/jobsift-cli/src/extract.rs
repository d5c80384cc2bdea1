//! `extract` command: record full posting text behind the `DetailSource` seam.
//!
//! The detail extractor proper (site scraping, HTTP impersonation) lives
//! outside this binary; it hands over its output as a JSON file of detail
//! records which [`FileDetailSource`] serves by posting identity.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use jobsift_core::{hashing, Stage};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;

/// Source of full posting text for the extraction stage.
#[async_trait]
pub(crate) trait DetailSource: Send + Sync {
    /// Full text for one posting; `Ok(None)` when the source has no entry,
    /// `Err` when the fetch itself failed.
    async fn fetch(&self, source: &str, external_id: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct DetailRecord {
    source: String,
    external_id: String,
    full_text: String,
}

/// Detail source backed by a pre-fetched JSON file, keyed by posting identity.
pub(crate) struct FileDetailSource {
    records: HashMap<String, String>,
}

impl FileDetailSource {
    /// Loads detail records from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detail file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to parse detail file {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let records: Vec<DetailRecord> = serde_json::from_str(raw)?;
        // Keyed by identity hash, so lookups normalize case and whitespace
        // exactly like discovery did.
        let records = records
            .into_iter()
            .map(|r| {
                (
                    hashing::identity_hash(&r.source, &r.external_id),
                    r.full_text,
                )
            })
            .collect();
        Ok(Self { records })
    }
}

#[async_trait]
impl DetailSource for FileDetailSource {
    async fn fetch(&self, source: &str, external_id: &str) -> anyhow::Result<Option<String>> {
        let key = hashing::identity_hash(source, external_id);
        Ok(self.records.get(&key).cloned())
    }
}

/// Runs one extraction pass: claim `new` postings and record their full text.
///
/// Per-item outcomes:
/// - detail found: `record_extraction` snapshots changed content and advances
///   the status;
/// - no detail entry: the claim is released so a later pass (with a fuller
///   file) can retry;
/// - fetch error: the posting is marked `failed`.
///
/// Repository write failures release the claim and continue with the next
/// item.
///
/// # Errors
///
/// Returns an error only if claiming itself fails.
pub(crate) async fn run_extract_pass(
    pool: &PgPool,
    source: &dyn DetailSource,
    limit: i64,
    lease_secs: u64,
) -> anyhow::Result<()> {
    let worker_id = crate::worker::worker_id("extract");
    let claimed =
        jobsift_db::claim_eligible(pool, Stage::Extraction, limit, &worker_id, lease_secs).await?;

    if claimed.is_empty() {
        println!("no postings awaiting extraction");
        return Ok(());
    }

    let mut extracted = 0usize;
    let mut snapshots = 0usize;
    let mut missing = 0usize;
    let mut failed = 0usize;

    for row in &claimed {
        match source.fetch(&row.source, &row.external_id).await {
            Ok(Some(text)) => match jobsift_db::record_extraction(pool, row.id, &text).await {
                Ok(created) => {
                    extracted += 1;
                    if created {
                        snapshots += 1;
                    }
                }
                Err(e) => {
                    warn!(posting_id = %row.id, error = %e, "failed to record extraction");
                    release_quietly(pool, row.id).await;
                }
            },
            Ok(None) => {
                missing += 1;
                release_quietly(pool, row.id).await;
            }
            Err(e) => {
                warn!(posting_id = %row.id, error = %e, "detail fetch failed");
                match jobsift_db::record_extraction_failed(pool, row.id).await {
                    Ok(()) => failed += 1,
                    Err(e) => {
                        warn!(posting_id = %row.id, error = %e, "could not mark posting failed");
                        release_quietly(pool, row.id).await;
                    }
                }
            }
        }
    }

    println!(
        "extracted {extracted} postings ({snapshots} new snapshots), \
         {missing} without detail, {failed} failed"
    );
    Ok(())
}

async fn release_quietly(pool: &PgPool, posting_id: uuid::Uuid) {
    if let Err(e) = jobsift_db::release_claim(pool, posting_id).await {
        warn!(posting_id = %posting_id, error = %e, "failed to release claim");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_source_serves_records_by_identity() {
        let source = FileDetailSource::parse(
            r#"[{"source":"dou","external_id":"123","full_text":"We need a Rust dev."}]"#,
        )
        .expect("valid detail file");

        let text = source.fetch("dou", "123").await.expect("fetch");
        assert_eq!(text.as_deref(), Some("We need a Rust dev."));

        let absent = source.fetch("dou", "999").await.expect("fetch");
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn file_source_lookup_is_case_and_whitespace_insensitive() {
        let source = FileDetailSource::parse(
            r#"[{"source":"DOU","external_id":" 123 ","full_text":"text"}]"#,
        )
        .expect("valid detail file");

        let text = source.fetch("dou", "123").await.expect("fetch");
        assert_eq!(text.as_deref(), Some("text"));
    }

    #[test]
    fn malformed_detail_file_is_rejected() {
        assert!(FileDetailSource::parse("{not json").is_err());
        assert!(FileDetailSource::parse(r#"[{"source":"dou"}]"#).is_err());
    }
}
