//! Ordered failover across providers.
//!
//! Providers are tried in the order given. A provider that fails with an
//! infrastructure error is put on cooldown and the next one is tried;
//! errors about the content itself propagate immediately because another
//! backend would refuse or misparse the same posting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::LlmError;
use crate::provider::LlmProvider;
use crate::types::{Judgment, JudgmentContext, ListingInput, StructuredListing, TokenUsage};

/// True when trying another provider could plausibly succeed.
fn is_switchable(error: &LlmError) -> bool {
    matches!(
        error,
        LlmError::Http(_) | LlmError::Provider(_) | LlmError::RateLimited(_)
    )
}

/// [`LlmProvider`] that delegates to the first healthy provider in a fixed
/// order, moving down the list when one fails.
///
/// The model and provider accessors report whichever provider served the
/// most recent call, so stored analyses name the backend that actually
/// produced them.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn LlmProvider>>,
    cooldown: Duration,
    last_used: AtomicUsize,
    unhealthy_until: Mutex<Vec<Option<Instant>>>,
}

impl FailoverProvider {
    #[must_use]
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        fallbacks: Vec<Arc<dyn LlmProvider>>,
        cooldown_secs: u64,
    ) -> Self {
        let mut providers = Vec::with_capacity(1 + fallbacks.len());
        providers.push(primary);
        providers.extend(fallbacks);
        let slots = providers.len();

        Self {
            providers,
            cooldown: Duration::from_secs(cooldown_secs),
            last_used: AtomicUsize::new(0),
            unhealthy_until: Mutex::new(vec![None; slots]),
        }
    }

    /// Indices of providers not currently on cooldown, in preference order.
    async fn candidates(&self) -> Vec<usize> {
        let now = Instant::now();
        let unhealthy = self.unhealthy_until.lock().await;
        (0..self.providers.len())
            .filter(|&idx| unhealthy[idx].is_none_or(|until| until <= now))
            .collect()
    }

    async fn mark_unhealthy(&self, idx: usize) {
        let mut unhealthy = self.unhealthy_until.lock().await;
        unhealthy[idx] = Some(Instant::now() + self.cooldown);
    }

    fn mark_used(&self, idx: usize) {
        self.last_used.store(idx, Ordering::Relaxed);
    }

    fn current(&self) -> &Arc<dyn LlmProvider> {
        let idx = self
            .last_used
            .load(Ordering::Relaxed)
            .min(self.providers.len() - 1);
        &self.providers[idx]
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    fn provider_name(&self) -> String {
        self.current().provider_name()
    }

    fn extract_model(&self) -> String {
        self.current().extract_model()
    }

    fn judge_model(&self) -> String {
        self.current().judge_model()
    }

    async fn extract(
        &self,
        input: &ListingInput,
    ) -> Result<(StructuredListing, TokenUsage), LlmError> {
        let mut last_error = None;
        for idx in self.candidates().await {
            let provider = &self.providers[idx];
            match provider.extract(input).await {
                Ok(result) => {
                    self.mark_used(idx);
                    return Ok(result);
                }
                Err(error) if is_switchable(&error) => {
                    warn!(
                        provider = %provider.provider_name(),
                        error = %error,
                        "provider failed, moving to the next one"
                    );
                    self.mark_unhealthy(idx).await;
                    last_error = Some(error);
                }
                Err(error) => {
                    self.mark_used(idx);
                    return Err(error);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| LlmError::Provider("all providers are cooling down".to_string())))
    }

    async fn judge(
        &self,
        input: &ListingInput,
        facts: &StructuredListing,
        context: &JudgmentContext,
    ) -> Result<(Judgment, TokenUsage), LlmError> {
        let mut last_error = None;
        for idx in self.candidates().await {
            let provider = &self.providers[idx];
            match provider.judge(input, facts, context).await {
                Ok(result) => {
                    self.mark_used(idx);
                    return Ok(result);
                }
                Err(error) if is_switchable(&error) => {
                    warn!(
                        provider = %provider.provider_name(),
                        error = %error,
                        "provider failed, moving to the next one"
                    );
                    self.mark_unhealthy(idx).await;
                    last_error = Some(error);
                }
                Err(error) => {
                    self.mark_used(idx);
                    return Err(error);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| LlmError::Provider("all providers are cooling down".to_string())))
    }
}
