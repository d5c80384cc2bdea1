//! Read-model queries backing the HTTP API.
//!
//! These joins denormalize postings with their current analysis so handlers
//! stay thin. Write-path operations live in [`crate::postings`] and
//! [`crate::analyses`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// One row of the posting list view: posting plus its current verdict.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostingSummaryRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub url: Option<String>,
    pub title: String,
    pub company: String,
    pub status: String,
    /// From the current analysis; `NULL` until one exists.
    pub trust_score: Option<i16>,
    pub verdict: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional filters for [`list_postings_dashboard`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PostingListFilters<'a> {
    pub status: Option<&'a str>,
    pub source: Option<&'a str>,
    pub verdict: Option<&'a str>,
    pub limit: Option<i64>,
}

/// Full posting detail: current snapshot text and current analysis inlined.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostingDetailRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub url: Option<String>,
    pub title: String,
    pub company: String,
    pub listing_text: Option<String>,
    pub status: String,
    pub attributes: Option<Value>,
    pub has_embedding: bool,
    /// Text of the current snapshot; `NULL` before first extraction.
    pub full_text: Option<String>,
    pub trust_score: Option<i16>,
    pub verdict: Option<String>,
    pub red_flags: Option<Value>,
    pub toxic_phrases: Option<Value>,
    pub honest_summary: Option<String>,
    pub analysis_provider: Option<String>,
    pub analysis_model: Option<String>,
    pub analysis_error: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lists postings for the dashboard, newest activity first.
///
/// All filters are optional; `NULL` binds disable the corresponding
/// predicate. The verdict filter matches against the current analysis, so
/// postings without one never match it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_postings_dashboard(
    pool: &PgPool,
    filters: PostingListFilters<'_>,
) -> Result<Vec<PostingSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, PostingSummaryRow>(
        "SELECT p.id, p.source, p.external_id, p.url, p.title, p.company, p.status, \
                a.trust_score, a.verdict, p.discovered_at, p.updated_at \
         FROM postings p \
         LEFT JOIN posting_analyses a ON a.id = p.current_analysis_id \
         WHERE ($1::TEXT IS NULL OR p.status = $1) \
           AND ($2::TEXT IS NULL OR p.source = $2) \
           AND ($3::TEXT IS NULL OR a.verdict = $3) \
         ORDER BY p.updated_at DESC, p.id DESC \
         LIMIT COALESCE($4, 9223372036854775807)",
    )
    .bind(filters.status)
    .bind(filters.source)
    .bind(filters.verdict)
    .bind(filters.limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches the full dashboard detail for one posting.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such posting exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_posting_detail(pool: &PgPool, id: Uuid) -> Result<PostingDetailRow, DbError> {
    let row = sqlx::query_as::<_, PostingDetailRow>(
        "SELECT p.id, p.source, p.external_id, p.url, p.title, p.company, p.listing_text, \
                p.status, p.attributes, (p.embedding IS NOT NULL) AS has_embedding, \
                s.full_text, \
                a.trust_score, a.verdict, a.red_flags, a.toxic_phrases, a.honest_summary, \
                a.provider AS analysis_provider, a.model AS analysis_model, \
                a.error_message AS analysis_error, a.created_at AS analyzed_at, \
                p.discovered_at, p.updated_at \
         FROM postings p \
         LEFT JOIN posting_snapshots s ON s.id = p.current_snapshot_id \
         LEFT JOIN posting_analyses a ON a.id = p.current_analysis_id \
         WHERE p.id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}
