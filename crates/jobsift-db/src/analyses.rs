//! Database operations for `posting_analyses`.

use chrono::{DateTime, Utc};
use jobsift_core::Stage2FailurePolicy;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `posting_analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRow {
    pub id: Uuid,
    pub posting_id: Uuid,
    pub trust_score: i16,
    pub verdict: String,
    pub red_flags: Value,
    pub toxic_phrases: Value,
    pub honest_summary: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    /// Set when the analysis records a pipeline failure instead of a real
    /// judgment; such rows carry a zero trust score.
    pub error_message: Option<String>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`record_stage2`].
#[derive(Debug, Clone)]
pub struct NewAnalysis<'a> {
    pub trust_score: i16,
    pub verdict: &'a str,
    pub red_flags: Value,
    pub toxic_phrases: Value,
    pub honest_summary: &'a str,
    pub provider: &'a str,
    pub model: &'a str,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub error_message: Option<&'a str>,
}

const ANALYSIS_COLUMNS: &str = "id, posting_id, trust_score, verdict, red_flags, toxic_phrases, \
     honest_summary, provider, model, prompt_tokens, completion_tokens, error_message, \
     is_current, created_at";

/// Records a stage-2 analysis and makes it the posting's current one.
///
/// In a single transaction: any previous current analysis is demoted, the new
/// row is inserted with `is_current = TRUE` (a partial unique index enforces
/// at most one per posting), and the posting is repointed and its claim
/// released. History is append-only; demoted rows stay queryable.
///
/// Whether the posting advances to `analyzed` depends on the outcome and on
/// `policy`: a successful analysis always advances, and a failure analysis
/// advances too under [`Stage2FailurePolicy::Advance`] but leaves the status
/// alone under [`Stage2FailurePolicy::Retry`] so the posting stays eligible
/// for another pass.
///
/// Valid starting states are `vectorized` and `structured` (the claimed
/// stage-2 set) plus `analyzed`, which accepts re-runs of already-judged
/// postings.
///
/// Returns the id of the inserted analysis.
///
/// # Errors
///
/// Returns [`DbError::InvalidPostingTransition`] if the posting is not in an
/// accepted status (nothing is persisted in that case), or [`DbError::Sqlx`]
/// if a statement fails.
pub async fn record_stage2(
    pool: &PgPool,
    posting_id: Uuid,
    analysis: &NewAnalysis<'_>,
    policy: Stage2FailurePolicy,
) -> Result<Uuid, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE posting_analyses \
         SET is_current = FALSE \
         WHERE posting_id = $1 AND is_current",
    )
    .bind(posting_id)
    .execute(&mut *tx)
    .await?;

    let analysis_id: Uuid = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO posting_analyses \
             (posting_id, trust_score, verdict, red_flags, toxic_phrases, honest_summary, \
              provider, model, prompt_tokens, completion_tokens, error_message, is_current) \
         VALUES ($1, $2, $3, $4, $5, $6, \
                 $7, $8, $9, $10, $11, TRUE) \
         RETURNING id",
    )
    .bind(posting_id)
    .bind(analysis.trust_score)
    .bind(analysis.verdict)
    .bind(&analysis.red_flags)
    .bind(&analysis.toxic_phrases)
    .bind(analysis.honest_summary)
    .bind(analysis.provider)
    .bind(analysis.model)
    .bind(analysis.prompt_tokens)
    .bind(analysis.completion_tokens)
    .bind(analysis.error_message)
    .fetch_one(&mut *tx)
    .await?;

    let advance = analysis.error_message.is_none() || policy == Stage2FailurePolicy::Advance;
    let sql = if advance {
        "UPDATE postings \
         SET current_analysis_id = $2, status = 'analyzed', claimed_by = NULL, \
             claimed_until = NULL, updated_at = NOW() \
         WHERE id = $1 AND status IN ('vectorized', 'structured', 'analyzed')"
    } else {
        "UPDATE postings \
         SET current_analysis_id = $2, claimed_by = NULL, claimed_until = NULL, \
             updated_at = NOW() \
         WHERE id = $1 AND status IN ('vectorized', 'structured', 'analyzed')"
    };

    let result = sqlx::query(sql)
        .bind(posting_id)
        .bind(analysis_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPostingTransition {
            id: posting_id,
            expected_status: "vectorized, structured or analyzed",
        });
    }

    tx.commit().await?;
    Ok(analysis_id)
}

/// Returns the current analysis for a posting, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_current_analysis(
    pool: &PgPool,
    posting_id: Uuid,
) -> Result<Option<AnalysisRow>, DbError> {
    let sql = format!(
        "SELECT {ANALYSIS_COLUMNS} \
         FROM posting_analyses \
         WHERE posting_id = $1 AND is_current"
    );
    let row = sqlx::query_as::<_, AnalysisRow>(&sql)
        .bind(posting_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Lists analyses for a posting, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_analyses(
    pool: &PgPool,
    posting_id: Uuid,
    limit: i64,
) -> Result<Vec<AnalysisRow>, DbError> {
    let sql = format!(
        "SELECT {ANALYSIS_COLUMNS} \
         FROM posting_analyses \
         WHERE posting_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, AnalysisRow>(&sql)
        .bind(posting_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
