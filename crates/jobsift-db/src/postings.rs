//! Database operations for `postings` and `posting_snapshots`.
//!
//! The `postings.status` column is the pipeline's work queue: workers claim
//! rows by stage with `FOR UPDATE SKIP LOCKED` plus a lease, and every
//! status transition is a compare-and-set guarded by the current status.

use chrono::{DateTime, Utc};
use jobsift_core::{hashing, CandidatePosting, Stage};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `postings` table.
///
/// The `embedding` column is deliberately absent: it is write-only from the
/// pipeline's point of view and never needed when handling a claimed row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostingRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub identity_hash: String,
    pub url: Option<String>,
    pub title: String,
    pub company: String,
    /// Short description captured at discovery time; full text lives in
    /// `posting_snapshots` once extraction has run.
    pub listing_text: Option<String>,
    /// Hash of the last extracted content; `NULL` until first extraction.
    pub content_hash: Option<String>,
    pub status: String,
    /// Stage-1 structured attributes; `NULL` until first structuring pass.
    pub attributes: Option<Value>,
    pub current_snapshot_id: Option<Uuid>,
    pub current_analysis_id: Option<Uuid>,
    pub claimed_by: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `posting_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub posting_id: Uuid,
    pub content_hash: String,
    pub full_text: String,
    pub captured_at: DateTime<Utc>,
}

/// One `(status, count)` pair from the status summary query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
}

const POSTING_COLUMNS: &str = "id, source, external_id, identity_hash, url, title, company, \
     listing_text, content_hash, status, attributes, current_snapshot_id, \
     current_analysis_id, claimed_by, claimed_until, discovered_at, updated_at";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Inserts newly discovered postings, skipping any already known.
///
/// Identity is the hash of normalized `(source, external_id)`; a conflict on
/// `identity_hash` leaves the existing row untouched, so re-running discovery
/// over the same listings is a no-op. All candidates are inserted in a single
/// transaction.
///
/// Returns the number of rows actually inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; no rows are kept in that
/// case.
pub async fn upsert_discovered(
    pool: &PgPool,
    candidates: &[CandidatePosting],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for candidate in candidates {
        let identity = hashing::identity_hash(&candidate.source, &candidate.external_id);
        let result = sqlx::query(
            "INSERT INTO postings \
                 (source, external_id, identity_hash, url, title, company, listing_text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (identity_hash) DO NOTHING",
        )
        .bind(&candidate.source)
        .bind(&candidate.external_id)
        .bind(&identity)
        .bind(&candidate.url)
        .bind(&candidate.title)
        .bind(&candidate.company)
        .bind(&candidate.listing_text)
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Fetches a posting by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such posting exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_posting(pool: &PgPool, id: Uuid) -> Result<PostingRow, DbError> {
    let sql = format!("SELECT {POSTING_COLUMNS} FROM postings WHERE id = $1");
    let row = sqlx::query_as::<_, PostingRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Fetches a posting by its external identity `(source, external_id)`.
///
/// The pair is normalized and hashed the same way discovery does, so lookups
/// are insensitive to case and surrounding whitespace.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such posting exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_posting_by_identity(
    pool: &PgPool,
    source: &str,
    external_id: &str,
) -> Result<PostingRow, DbError> {
    let identity = hashing::identity_hash(source, external_id);
    let sql = format!("SELECT {POSTING_COLUMNS} FROM postings WHERE identity_hash = $1");
    let row = sqlx::query_as::<_, PostingRow>(&sql)
        .bind(&identity)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Returns the most recent snapshot for a posting, if one exists.
///
/// Ordered by `captured_at DESC, id DESC` so that the first row is always the
/// latest, even when multiple snapshots share the same timestamp.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_snapshot(
    pool: &PgPool,
    posting_id: Uuid,
) -> Result<Option<SnapshotRow>, DbError> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, posting_id, content_hash, full_text, captured_at \
         FROM posting_snapshots \
         WHERE posting_id = $1 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(posting_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Records the result of fetching a posting's full text.
///
/// The content hash covers `title`, `company`, and the fetched text. A new
/// snapshot is written only when that hash differs from the stored one:
///
/// - changed content inserts a snapshot, repoints `current_snapshot_id`,
///   and moves the posting to `extracted` from whatever non-archived status
///   it was in (re-extraction of an already-analyzed posting resets it for
///   re-processing);
/// - unchanged content advances `new -> extracted` and is otherwise just a
///   liveness touch.
///
/// Either way the worker's claim is released. The read-compare-write runs in
/// one transaction with the posting row locked.
///
/// Returns `true` if a snapshot was created.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such posting exists,
/// [`DbError::InvalidPostingTransition`] if the posting is archived, or
/// [`DbError::Sqlx`] if a statement fails.
pub async fn record_extraction(
    pool: &PgPool,
    posting_id: Uuid,
    full_text: &str,
) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let (title, company, stored_hash, status) =
        sqlx::query_as::<_, (String, String, Option<String>, String)>(
            "SELECT title, company, content_hash, status \
             FROM postings \
             WHERE id = $1 \
             FOR UPDATE",
        )
        .bind(posting_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

    if status == "archived" {
        return Err(DbError::InvalidPostingTransition {
            id: posting_id,
            expected_status: "any non-archived status",
        });
    }

    let new_hash = hashing::content_hash(&title, &company, full_text);

    if stored_hash.as_deref() == Some(new_hash.as_str()) {
        // Unchanged content never resets downstream work; only a posting that
        // has not been extracted yet advances.
        let sql = if status == "new" {
            "UPDATE postings \
             SET status = 'extracted', claimed_by = NULL, claimed_until = NULL, \
                 updated_at = NOW() \
             WHERE id = $1"
        } else {
            "UPDATE postings \
             SET claimed_by = NULL, claimed_until = NULL, updated_at = NOW() \
             WHERE id = $1"
        };
        sqlx::query(sql).bind(posting_id).execute(&mut *tx).await?;
        tx.commit().await?;
        return Ok(false);
    }

    let snapshot_id: Uuid = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO posting_snapshots (posting_id, content_hash, full_text) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(posting_id)
    .bind(&new_hash)
    .bind(full_text)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE postings \
         SET content_hash = $2, current_snapshot_id = $3, status = 'extracted', \
             claimed_by = NULL, claimed_until = NULL, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(posting_id)
    .bind(&new_hash)
    .bind(snapshot_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Marks a newly discovered posting as failed after its detail fetch errored.
///
/// Only a `new` posting can fail this way; a posting that already holds
/// extracted content keeps it.
///
/// # Errors
///
/// Returns [`DbError::InvalidPostingTransition`] if the posting is not in
/// `new`, or [`DbError::Sqlx`] if the update fails.
pub async fn record_extraction_failed(pool: &PgPool, posting_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE postings \
         SET status = 'failed', claimed_by = NULL, claimed_until = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = 'new'",
    )
    .bind(posting_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPostingTransition {
            id: posting_id,
            expected_status: "new",
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Claiming
// ---------------------------------------------------------------------------

/// Claims up to `limit` postings eligible for a pipeline stage.
///
/// Rows are eligible when their status matches the stage and they carry no
/// live lease; expired leases are reclaimable, which is how work lost to a
/// crashed worker comes back. `SKIP LOCKED` keeps concurrent claimers from
/// blocking on or double-claiming the same rows, and `updated_at ASC`
/// ordering serves the longest-waiting postings first.
///
/// Claiming does not touch `updated_at`; the queue position of a row is
/// determined by real state changes only.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
#[allow(clippy::cast_precision_loss)]
pub async fn claim_eligible(
    pool: &PgPool,
    stage: Stage,
    limit: i64,
    worker_id: &str,
    lease_secs: u64,
) -> Result<Vec<PostingRow>, DbError> {
    let statuses: Vec<String> = stage
        .eligible_statuses()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();

    let sql = format!(
        "WITH claimable AS ( \
             SELECT id AS posting_id FROM postings \
             WHERE status = ANY($1) \
               AND (claimed_until IS NULL OR claimed_until < NOW()) \
             ORDER BY updated_at ASC \
             LIMIT $2 \
             FOR UPDATE SKIP LOCKED \
         ) \
         UPDATE postings \
         SET claimed_by = $3, claimed_until = NOW() + make_interval(secs => $4) \
         FROM claimable \
         WHERE id = posting_id \
         RETURNING {POSTING_COLUMNS}"
    );

    let rows = sqlx::query_as::<_, PostingRow>(&sql)
        .bind(&statuses)
        .bind(limit)
        .bind(worker_id)
        .bind(lease_secs as f64)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Releases a claim without changing status.
///
/// Used when a worker gives up on an item (transient failure, shutdown) so
/// another worker can pick it up immediately instead of waiting out the
/// lease. `updated_at` is left alone to preserve queue position.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_claim(pool: &PgPool, posting_id: Uuid) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE postings \
         SET claimed_by = NULL, claimed_until = NULL \
         WHERE id = $1",
    )
    .bind(posting_id)
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Stage transitions
// ---------------------------------------------------------------------------

/// Stores embeddings for a batch of extracted postings.
///
/// Each update is a compare-and-set against `extracted`; a posting that moved
/// on (or was archived) since it was claimed is skipped rather than
/// overwritten. The batch is applied in a single transaction and claims are
/// released as part of the transition.
///
/// Returns the number of postings actually advanced to `vectorized`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any update fails; no rows are kept in that
/// case.
pub async fn record_vectors(
    pool: &PgPool,
    updates: &[(Uuid, pgvector::Vector)],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let mut advanced = 0u64;

    for (posting_id, embedding) in updates {
        let result = sqlx::query(
            "UPDATE postings \
             SET embedding = $2, status = 'vectorized', claimed_by = NULL, \
                 claimed_until = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'extracted'",
        )
        .bind(posting_id)
        .bind(embedding)
        .execute(&mut *tx)
        .await?;

        advanced += result.rows_affected();
    }

    tx.commit().await?;
    Ok(advanced)
}

/// Stores stage-1 structured attributes and advances to `structured`.
///
/// The claim is intentionally kept: stage 2 runs in the same worker pass and
/// the lease continues to cover it. Valid starting states are `vectorized`
/// (first pass) and `structured` (stage 1 re-run after a stage-2 failure).
///
/// # Errors
///
/// Returns [`DbError::InvalidPostingTransition`] if the posting is not in
/// `vectorized` or `structured`, or [`DbError::Sqlx`] if the update fails.
pub async fn record_stage1(
    pool: &PgPool,
    posting_id: Uuid,
    attributes: &Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE postings \
         SET attributes = $2, status = 'structured', updated_at = NOW() \
         WHERE id = $1 AND status IN ('vectorized', 'structured')",
    )
    .bind(posting_id)
    .bind(attributes)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPostingTransition {
            id: posting_id,
            expected_status: "vectorized or structured",
        });
    }

    Ok(())
}

/// Archives a posting, removing it from every stage's eligible set.
///
/// Archiving is terminal but idempotent; any pending claim is cleared.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such posting exists, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn mark_archived(pool: &PgPool, posting_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE postings \
         SET status = 'archived', claimed_by = NULL, claimed_until = NULL, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(posting_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Counts postings per status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn status_counts(pool: &PgPool) -> Result<Vec<StatusCountRow>, DbError> {
    let rows = sqlx::query_as::<_, StatusCountRow>(
        "SELECT status, COUNT(*) AS count \
         FROM postings \
         GROUP BY status \
         ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
