//! Provider abstraction for the two LLM stages.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{Judgment, JudgmentContext, ListingInput, StructuredListing, TokenUsage};

/// One backend capable of running both pipeline stages.
///
/// Implementations wrap a concrete API (OpenAI-compatible today) and own
/// their prompting and response parsing. [`crate::FailoverProvider`] composes
/// several of these behind the same interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short label stored alongside every analysis, e.g. "openai".
    fn provider_name(&self) -> String;

    /// Model used for the extraction stage.
    fn extract_model(&self) -> String;

    /// Model used for the judgment stage.
    fn judge_model(&self) -> String;

    /// Extract structured facts from a posting.
    async fn extract(
        &self,
        input: &ListingInput,
    ) -> Result<(StructuredListing, TokenUsage), LlmError>;

    /// Judge a posting given its text and previously extracted facts.
    async fn judge(
        &self,
        input: &ListingInput,
        facts: &StructuredListing,
        context: &JudgmentContext,
    ) -> Result<(Judgment, TokenUsage), LlmError>;
}
