//! Shared domain types and configuration for the JobSift pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown posting status: {0}")]
    UnknownStatus(String),
}

/// Errors produced while loading application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

mod app_config;
mod config;
pub mod hashing;
mod status;
mod types;

pub use app_config::{AppConfig, Environment, RetryBackoff};
pub use config::{load_app_config, load_app_config_from_env};
pub use status::{PostingStatus, Stage, Stage2FailurePolicy};
pub use types::CandidatePosting;
