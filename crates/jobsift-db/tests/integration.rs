//! Offline unit tests for jobsift-db pool configuration and row types.
//! These tests do not require a live database connection.

use jobsift_core::{AppConfig, Environment, RetryBackoff, Stage2FailurePolicy};
use jobsift_db::{AnalysisRow, PoolConfig, PostingRow};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        llm_api_key: Some("key".to_string()),
        llm_base_url: "https://api.openai.com/v1".to_string(),
        llm_extract_model: "gpt-4o-mini".to_string(),
        llm_judge_model: "gpt-4o".to_string(),
        llm_fallback_api_key: None,
        llm_fallback_base_url: None,
        llm_fallback_extract_model: None,
        llm_fallback_judge_model: None,
        llm_request_timeout_secs: 120,
        llm_max_attempts: 4,
        llm_retry_base_ms: 1000,
        llm_retry_backoff: RetryBackoff::Exponential,
        llm_provider_cooldown_secs: 60,
        stage2_failure_policy: Stage2FailurePolicy::Advance,
        embedding_url: None,
        embedding_dim: 1024,
        embedding_timeout_secs: 30,
        worker_lease_secs: 300,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`PostingRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn posting_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = PostingRow {
        id: Uuid::new_v4(),
        source: "hh".to_string(),
        external_id: "12345".to_string(),
        identity_hash: "ab".repeat(32),
        url: None,
        title: "Senior Rust Engineer".to_string(),
        company: "Initech".to_string(),
        listing_text: None,
        content_hash: None,
        status: "new".to_string(),
        attributes: None,
        current_snapshot_id: None,
        current_analysis_id: None,
        claimed_by: None,
        claimed_until: None,
        discovered_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.source, "hh");
    assert_eq!(row.status, "new");
    assert_eq!(row.identity_hash.len(), 64);
    assert!(row.content_hash.is_none());
    assert!(row.claimed_by.is_none());
}

/// Compile-time smoke test: confirm that [`AnalysisRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn analysis_row_has_expected_fields() {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    let row = AnalysisRow {
        id: Uuid::new_v4(),
        posting_id: Uuid::new_v4(),
        trust_score: 3,
        verdict: "Avoid".to_string(),
        red_flags: json!(["unpaid overtime"]),
        toxic_phrases: json!(["we are a family"]),
        honest_summary: "Wants a senior for junior pay.".to_string(),
        provider: "openai".to_string(),
        model: "gpt-4o".to_string(),
        prompt_tokens: 900,
        completion_tokens: 210,
        error_message: None,
        is_current: true,
        created_at: Utc::now(),
    };

    assert_eq!(row.trust_score, 3);
    assert_eq!(row.verdict, "Avoid");
    assert!(row.is_current);
    assert!(row.error_message.is_none());
}
