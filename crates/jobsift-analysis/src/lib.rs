//! LLM analysis pipeline for jobsift.
//!
//! Runs job postings through two structured-output stages: extraction pulls
//! typed facts (stack, grade, salary, red-flag keywords) out of the raw
//! text, judgment scores the posting for trust and manipulation against
//! those facts. Providers sit behind [`LlmProvider`], with transparent retry
//! for transient failures and ordered failover between backends.

pub mod analyzer;
pub mod error;
pub mod failover;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod types;

mod exemplars;
mod prompts;
mod schema;

pub use analyzer::Analyzer;
pub use error::LlmError;
pub use failover::FailoverProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use retry::RetryPolicy;
pub use types::{
    AnalysisOutcome, Grade, Judgment, JudgmentContext, ListingInput, StructuredListing,
    TokenUsage, Verdict, FAILED_VERDICT,
};
