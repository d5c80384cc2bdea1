use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use jobsift_core::PostingStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct PostingsQuery {
    pub status: Option<String>,
    pub source: Option<String>,
    pub verdict: Option<String>,
    pub limit: Option<i64>,
}

/// One row of the dashboard list: posting plus its current verdict.
#[derive(Debug, Serialize)]
pub(super) struct PostingItem {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub url: Option<String>,
    pub title: String,
    pub company: String,
    pub status: String,
    pub trust_score: Option<i16>,
    pub verdict: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct PostingDetailItem {
    id: Uuid,
    source: String,
    external_id: String,
    url: Option<String>,
    title: String,
    company: String,
    listing_text: Option<String>,
    status: String,
    attributes: Option<Value>,
    has_embedding: bool,
    full_text: Option<String>,
    trust_score: Option<i16>,
    verdict: Option<String>,
    red_flags: Option<Value>,
    toxic_phrases: Option<Value>,
    honest_summary: Option<String>,
    analysis_provider: Option<String>,
    analysis_model: Option<String>,
    analysis_error: Option<String>,
    analyzed_at: Option<DateTime<Utc>>,
    discovered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AnalysesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct AnalysisItem {
    id: Uuid,
    trust_score: i16,
    verdict: String,
    red_flags: Value,
    toxic_phrases: Value,
    honest_summary: String,
    provider: String,
    model: String,
    prompt_tokens: i64,
    completion_tokens: i64,
    error_message: Option<String>,
    is_current: bool,
    created_at: DateTime<Utc>,
}

pub(super) async fn list_postings(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PostingsQuery>,
) -> Result<Json<ApiResponse<Vec<PostingItem>>>, ApiError> {
    if let Some(status) = query.status.as_deref() {
        if status.parse::<PostingStatus>().is_err() {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("unknown status: {status}"),
            ));
        }
    }

    let filters = jobsift_db::PostingListFilters {
        status: query.status.as_deref(),
        source: query.source.as_deref(),
        verdict: query.verdict.as_deref(),
        limit: Some(normalize_limit(query.limit)),
    };
    let rows = jobsift_db::list_postings_dashboard(&state.pool, filters)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| PostingItem {
            id: row.id,
            source: row.source,
            external_id: row.external_id,
            url: row.url,
            title: row.title,
            company: row.company,
            status: row.status,
            trust_score: row.trust_score,
            verdict: row.verdict,
            discovered_at: row.discovered_at,
            updated_at: row.updated_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_posting(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PostingDetailItem>>, ApiError> {
    let row = jobsift_db::get_posting_detail(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = PostingDetailItem {
        id: row.id,
        source: row.source,
        external_id: row.external_id,
        url: row.url,
        title: row.title,
        company: row.company,
        listing_text: row.listing_text,
        status: row.status,
        attributes: row.attributes,
        has_embedding: row.has_embedding,
        full_text: row.full_text,
        trust_score: row.trust_score,
        verdict: row.verdict,
        red_flags: row.red_flags,
        toxic_phrases: row.toxic_phrases,
        honest_summary: row.honest_summary,
        analysis_provider: row.analysis_provider,
        analysis_model: row.analysis_model,
        analysis_error: row.analysis_error,
        analyzed_at: row.analyzed_at,
        discovered_at: row.discovered_at,
        updated_at: row.updated_at,
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_posting_analyses(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalysesQuery>,
) -> Result<Json<ApiResponse<Vec<AnalysisItem>>>, ApiError> {
    // 404 for unknown postings rather than an empty history.
    jobsift_db::get_posting(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let rows = jobsift_db::list_analyses(&state.pool, id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| AnalysisItem {
            id: row.id,
            trust_score: row.trust_score,
            verdict: row.verdict,
            red_flags: row.red_flags,
            toxic_phrases: row.toxic_phrases,
            honest_summary: row.honest_summary,
            provider: row.provider,
            model: row.model,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            error_message: row.error_message,
            is_current: row.is_current,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
