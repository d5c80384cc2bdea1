//! Two-stage analysis pipeline over a single provider seam.
//!
//! Stage 1 extracts structured facts, stage 2 judges the posting against
//! those facts. [`Analyzer::run_full`] never returns an error: whatever
//! happens becomes a storable [`AnalysisOutcome`], so a worker can always
//! record the result and move on.

use std::sync::Arc;

use tracing::error;

use crate::error::LlmError;
use crate::provider::LlmProvider;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::{
    AnalysisOutcome, Judgment, JudgmentContext, ListingInput, StructuredListing, TokenUsage,
};

/// Runs the two LLM stages with retry and token accounting.
pub struct Analyzer {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl Analyzer {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Extracts structured facts, retrying transient provider failures.
    /// Token usage from the successful call is added to `usage`.
    ///
    /// # Errors
    ///
    /// Returns the final [`LlmError`] once the retry budget is spent or a
    /// non-retriable error occurs.
    pub async fn run_stage1(
        &self,
        input: &ListingInput,
        usage: &mut TokenUsage,
    ) -> Result<StructuredListing, LlmError> {
        let (facts, spent) = retry_with_policy(self.retry, || self.provider.extract(input)).await?;
        *usage += spent;
        Ok(facts)
    }

    /// Judges the posting against previously extracted facts, retrying
    /// transient provider failures. Token usage from the successful call is
    /// added to `usage`.
    ///
    /// # Errors
    ///
    /// Returns the final [`LlmError`] once the retry budget is spent or a
    /// non-retriable error occurs.
    pub async fn run_stage2(
        &self,
        input: &ListingInput,
        facts: &StructuredListing,
        context: &JudgmentContext,
        usage: &mut TokenUsage,
    ) -> Result<Judgment, LlmError> {
        let (judgment, spent) =
            retry_with_policy(self.retry, || self.provider.judge(input, facts, context)).await?;
        *usage += spent;
        Ok(judgment)
    }

    /// Runs the full pipeline for one posting.
    ///
    /// When `prior` holds facts from an earlier pass, stage 1 is skipped and
    /// the outcome's `structured` field stays `None`; only freshly extracted
    /// facts are handed back for storage. Failures in either stage produce a
    /// failure outcome carrying the stage's model name and the tokens spent
    /// up to that point.
    pub async fn run_full(
        &self,
        input: &ListingInput,
        prior: Option<StructuredListing>,
        context: &JudgmentContext,
    ) -> AnalysisOutcome {
        let mut usage = TokenUsage::default();

        let (facts, fresh) = match prior {
            Some(facts) => (facts, false),
            None => match self.run_stage1(input, &mut usage).await {
                Ok(facts) => (facts, true),
                Err(err) => {
                    error!(error = %err, "extraction stage failed");
                    return AnalysisOutcome::failed(
                        &err,
                        None,
                        self.provider.provider_name(),
                        self.provider.extract_model(),
                        usage,
                    );
                }
            },
        };

        match self.run_stage2(input, &facts, context, &mut usage).await {
            Ok(judgment) => AnalysisOutcome::from_judgment(
                judgment,
                fresh.then_some(facts),
                self.provider.provider_name(),
                self.provider.judge_model(),
                usage,
            ),
            Err(err) => {
                error!(error = %err, "judgment stage failed");
                AnalysisOutcome::failed(
                    &err,
                    fresh.then_some(facts),
                    self.provider.provider_name(),
                    self.provider.judge_model(),
                    usage,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::{Verdict, FAILED_VERDICT};
    use jobsift_core::RetryBackoff;

    #[derive(Default)]
    struct StubBehavior {
        extract_rate_limits: u32,
        judge_rate_limits: u32,
        extract_always_fails: bool,
        judge_always_fails: bool,
    }

    struct StubProvider {
        behavior: StubBehavior,
        extract_calls: AtomicU32,
        judge_calls: AtomicU32,
    }

    impl StubProvider {
        fn new(behavior: StubBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                extract_calls: AtomicU32::new(0),
                judge_calls: AtomicU32::new(0),
            })
        }

        fn extract_count(&self) -> u32 {
            self.extract_calls.load(Ordering::SeqCst)
        }

        fn judge_count(&self) -> u32 {
            self.judge_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn provider_name(&self) -> String {
            "stub".to_string()
        }

        fn extract_model(&self) -> String {
            "stub-extract".to_string()
        }

        fn judge_model(&self) -> String {
            "stub-judge".to_string()
        }

        async fn extract(
            &self,
            _input: &ListingInput,
        ) -> Result<(StructuredListing, TokenUsage), LlmError> {
            let call = self.extract_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.behavior.extract_always_fails {
                return Err(LlmError::Provider("stub extraction outage".to_string()));
            }
            if call <= self.behavior.extract_rate_limits {
                return Err(LlmError::RateLimited("stub extraction limit".to_string()));
            }
            Ok((
                sample_listing(),
                TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
            ))
        }

        async fn judge(
            &self,
            _input: &ListingInput,
            _facts: &StructuredListing,
            _context: &JudgmentContext,
        ) -> Result<(Judgment, TokenUsage), LlmError> {
            let call = self.judge_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.behavior.judge_always_fails {
                return Err(LlmError::Provider("stub judgment outage".to_string()));
            }
            if call <= self.behavior.judge_rate_limits {
                return Err(LlmError::RateLimited("stub judgment limit".to_string()));
            }
            Ok((
                sample_judgment(),
                TokenUsage {
                    prompt_tokens: 200,
                    completion_tokens: 50,
                },
            ))
        }
    }

    fn sample_listing() -> StructuredListing {
        StructuredListing {
            tech_stack: vec!["Rust".to_string()],
            grade: None,
            work_format: None,
            employment_type: None,
            experience_min_years: None,
            location_city: None,
            location_address: None,
            domain: None,
            salary: None,
            benefits: vec![],
            red_flag_keywords: vec!["fast-paced".to_string()],
        }
    }

    fn sample_judgment() -> Judgment {
        Judgment {
            trust_score: 3,
            red_flags: vec!["no salary stated".to_string()],
            toxic_phrases: vec![],
            honest_summary: "vague and underpaid".to_string(),
            verdict: Verdict::Risky,
        }
    }

    fn sample_input() -> ListingInput {
        ListingInput {
            title: "Rust Developer".to_string(),
            company: "Acme".to_string(),
            full_text: "Fast-paced environment, competitive salary.".to_string(),
        }
    }

    fn analyzer(provider: Arc<StubProvider>, max_attempts: u32) -> Analyzer {
        Analyzer::new(
            provider,
            RetryPolicy {
                max_attempts,
                base_delay_ms: 0,
                backoff: RetryBackoff::Fixed,
            },
        )
    }

    #[tokio::test]
    async fn full_run_accumulates_usage_across_both_stages() {
        let provider = StubProvider::new(StubBehavior::default());
        let outcome = analyzer(Arc::clone(&provider), 3)
            .run_full(&sample_input(), None, &JudgmentContext::default())
            .await;

        assert!(outcome.error_message.is_none());
        assert_eq!(outcome.trust_score, 3);
        assert_eq!(outcome.verdict, "Risky");
        assert_eq!(outcome.provider, "stub");
        assert_eq!(outcome.model, "stub-judge");
        assert_eq!(outcome.usage.prompt_tokens, 300);
        assert_eq!(outcome.usage.completion_tokens, 70);
        assert!(outcome.structured.is_some());
        assert_eq!(provider.extract_count(), 1);
        assert_eq!(provider.judge_count(), 1);
    }

    #[tokio::test]
    async fn prior_attributes_skip_the_extraction_stage() {
        let provider = StubProvider::new(StubBehavior::default());
        let outcome = analyzer(Arc::clone(&provider), 3)
            .run_full(
                &sample_input(),
                Some(sample_listing()),
                &JudgmentContext::default(),
            )
            .await;

        assert!(outcome.error_message.is_none());
        assert!(outcome.structured.is_none());
        assert_eq!(outcome.usage.prompt_tokens, 200);
        assert_eq!(provider.extract_count(), 0);
        assert_eq!(provider.judge_count(), 1);
    }

    #[tokio::test]
    async fn rate_limits_inside_the_budget_still_succeed() {
        let provider = StubProvider::new(StubBehavior {
            extract_rate_limits: 2,
            ..StubBehavior::default()
        });
        let outcome = analyzer(Arc::clone(&provider), 3)
            .run_full(&sample_input(), None, &JudgmentContext::default())
            .await;

        assert!(outcome.error_message.is_none());
        assert_eq!(provider.extract_count(), 3);
        assert_eq!(provider.judge_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_become_a_stored_failure() {
        let provider = StubProvider::new(StubBehavior {
            extract_rate_limits: 5,
            ..StubBehavior::default()
        });
        let outcome = analyzer(Arc::clone(&provider), 2)
            .run_full(&sample_input(), None, &JudgmentContext::default())
            .await;

        assert_eq!(provider.extract_count(), 2);
        assert_eq!(provider.judge_count(), 0);
        assert_eq!(outcome.trust_score, 0);
        assert_eq!(outcome.verdict, FAILED_VERDICT);
        assert_eq!(outcome.model, "stub-extract");
        assert!(outcome.structured.is_none());
        let message = outcome.error_message.expect("failure carries a message");
        assert!(message.contains("rate limited"), "got: {message}");
    }

    #[tokio::test]
    async fn provider_outages_are_not_retried() {
        let provider = StubProvider::new(StubBehavior {
            extract_always_fails: true,
            ..StubBehavior::default()
        });
        let outcome = analyzer(Arc::clone(&provider), 4)
            .run_full(&sample_input(), None, &JudgmentContext::default())
            .await;

        assert_eq!(provider.extract_count(), 1);
        assert_eq!(outcome.verdict, FAILED_VERDICT);
        assert!(outcome.error_message.is_some());
    }

    #[tokio::test]
    async fn judgment_failure_keeps_freshly_extracted_facts() {
        let provider = StubProvider::new(StubBehavior {
            judge_always_fails: true,
            ..StubBehavior::default()
        });
        let outcome = analyzer(Arc::clone(&provider), 2)
            .run_full(&sample_input(), None, &JudgmentContext::default())
            .await;

        assert_eq!(outcome.verdict, FAILED_VERDICT);
        assert_eq!(outcome.model, "stub-judge");
        assert!(outcome.structured.is_some(), "fresh facts must survive");
        assert_eq!(outcome.usage.prompt_tokens, 100);
        assert_eq!(outcome.usage.completion_tokens, 20);
    }

    #[tokio::test]
    async fn judgment_failure_with_prior_facts_stores_nothing_new() {
        let provider = StubProvider::new(StubBehavior {
            judge_always_fails: true,
            ..StubBehavior::default()
        });
        let outcome = analyzer(Arc::clone(&provider), 2)
            .run_full(
                &sample_input(),
                Some(sample_listing()),
                &JudgmentContext::default(),
            )
            .await;

        assert_eq!(outcome.verdict, FAILED_VERDICT);
        assert!(outcome.structured.is_none());
        assert_eq!(outcome.usage.total(), 0);
    }
}
