mod postings;
mod stats;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &jobsift_db::DbError) -> ApiError {
    if matches!(error, jobsift_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "posting not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    // Read-only surface: GET is all the dashboard needs.
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/postings", get(postings::list_postings))
        .route("/api/v1/postings/{id}", get(postings::get_posting))
        .route(
            "/api/v1/postings/{id}/analyses",
            get(postings::list_posting_analyses),
        )
        .route("/api/v1/stats/statuses", get(stats::list_status_counts))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match jobsift_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use jobsift_core::{CandidatePosting, Stage2FailurePolicy};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::postings::PostingItem;
    use super::*;

    #[test]
    fn posting_item_is_serializable() {
        // Proves the type compiles and serde works — no DB needed.
        let item = PostingItem {
            id: Uuid::new_v4(),
            source: "dou".to_string(),
            external_id: "123".to_string(),
            url: None,
            title: "Backend Dev".to_string(),
            company: "Acme".to_string(),
            status: "new".to_string(),
            trust_score: None,
            verdict: None,
            discovered_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&item).expect("serialize");
        assert!(json.contains("\"source\":\"dou\""));
        assert!(json.contains("\"trust_score\":null"));
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn map_db_error_turns_not_found_into_404() {
        let response = map_db_error("req-1".to_string(), &jobsift_db::DbError::NotFound)
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // -------------------------------------------------------------------------
    // Route integration tests (with DB)
    // -------------------------------------------------------------------------

    async fn get_json(
        app: Router,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).expect("json parse");
        (status, json)
    }

    /// Seed one discovered posting and return its id.
    async fn seed_posting(pool: &PgPool, external_id: &str) -> Uuid {
        let candidate = CandidatePosting {
            source: "dou".to_string(),
            external_id: external_id.to_string(),
            url: Some(format!("https://dou.example/jobs/{external_id}")),
            title: "Backend Dev".to_string(),
            company: "Acme".to_string(),
            listing_text: None,
        };
        jobsift_db::upsert_discovered(pool, &[candidate])
            .await
            .expect("upsert failed");
        jobsift_db::get_posting_by_identity(pool, "dou", external_id)
            .await
            .expect("posting missing")
            .id
    }

    /// Drive a posting through extraction and record one current analysis.
    async fn seed_analyzed_posting(pool: &PgPool, external_id: &str) -> Uuid {
        let id = seed_posting(pool, external_id).await;
        jobsift_db::record_extraction(pool, id, "Full posting text.")
            .await
            .expect("record_extraction failed");
        sqlx::query("UPDATE postings SET status = 'structured' WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .expect("status update failed");

        let analysis = jobsift_db::NewAnalysis {
            trust_score: 7,
            verdict: "Safe",
            red_flags: json!([]),
            toxic_phrases: json!([]),
            honest_summary: "Ordinary posting.",
            provider: "openai",
            model: "gpt-4o",
            prompt_tokens: 1200,
            completion_tokens: 300,
            error_message: None,
        };
        jobsift_db::record_stage2(pool, id, &analysis, Stage2FailurePolicy::Advance)
            .await
            .expect("record_stage2 failed");
        id
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok(pool: PgPool) {
        let (status, json) = get_json(build_app(AppState { pool }), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_postings_returns_seeded_posting(pool: PgPool) {
        seed_posting(&pool, "list-1").await;

        let (status, json) = get_json(build_app(AppState { pool }), "/api/v1/postings").await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["external_id"].as_str(), Some("list-1"));
        assert_eq!(data[0]["status"].as_str(), Some("new"));
        assert!(data[0]["trust_score"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_postings_rejects_unknown_status(pool: PgPool) {
        let (status, json) =
            get_json(build_app(AppState { pool }), "/api/v1/postings?status=pending").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn list_postings_filters_by_verdict(pool: PgPool) {
        seed_analyzed_posting(&pool, "verdict-1").await;
        seed_posting(&pool, "verdict-2").await;

        let (status, json) = get_json(
            build_app(AppState { pool }),
            "/api/v1/postings?verdict=Safe",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["external_id"].as_str(), Some("verdict-1"));
        assert_eq!(data[0]["trust_score"].as_i64(), Some(7));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_posting_returns_404_for_unknown_id(pool: PgPool) {
        let uri = format!("/api/v1/postings/{}", Uuid::new_v4());
        let (status, json) = get_json(build_app(AppState { pool }), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_posting_returns_detail_with_current_analysis(pool: PgPool) {
        let id = seed_analyzed_posting(&pool, "detail-1").await;

        let uri = format!("/api/v1/postings/{id}");
        let (status, json) = get_json(build_app(AppState { pool }), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"].as_str(), Some("analyzed"));
        assert_eq!(json["data"]["full_text"].as_str(), Some("Full posting text."));
        assert_eq!(json["data"]["verdict"].as_str(), Some("Safe"));
        assert_eq!(json["data"]["trust_score"].as_i64(), Some(7));
        assert!(json["data"]["analysis_error"].is_null());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn analyses_history_is_newest_first(pool: PgPool) {
        let id = seed_analyzed_posting(&pool, "history-1").await;
        let second = jobsift_db::NewAnalysis {
            trust_score: 3,
            verdict: "Risky",
            red_flags: json!(["vague salary"]),
            toxic_phrases: json!([]),
            honest_summary: "Second look.",
            provider: "openai",
            model: "gpt-4o",
            prompt_tokens: 900,
            completion_tokens: 200,
            error_message: None,
        };
        jobsift_db::record_stage2(&pool, id, &second, Stage2FailurePolicy::Advance)
            .await
            .expect("second record_stage2 failed");

        let uri = format!("/api/v1/postings/{id}/analyses");
        let (status, json) = get_json(build_app(AppState { pool }), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["verdict"].as_str(), Some("Risky"));
        assert_eq!(data[0]["is_current"].as_bool(), Some(true));
        assert_eq!(data[1]["verdict"].as_str(), Some("Safe"));
        assert_eq!(data[1]["is_current"].as_bool(), Some(false));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn status_counts_reflect_seeded_postings(pool: PgPool) {
        seed_posting(&pool, "stats-1").await;
        seed_posting(&pool, "stats-2").await;

        let (status, json) =
            get_json(build_app(AppState { pool }), "/api/v1/stats/statuses").await;
        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().expect("data array");
        let new_row = data
            .iter()
            .find(|r| r["status"].as_str() == Some("new"))
            .expect("new row missing");
        assert_eq!(new_row["count"].as_i64(), Some(2));
    }
}
