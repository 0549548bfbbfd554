//! A layer that re-runs the layer it wraps when it fails with a transient error.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldx::fxstruct;
use tracing::instrument;

use crate::error::StoreResult;
use crate::request::StoreRequest;
use crate::request::StoreResponse;
use crate::supplier::Hints;
use crate::supplier::Supplied;
use crate::supplier::Supplier;
use crate::supplier::Ticket;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries:        u32,
    pub initial_backoff:    Duration,
    pub max_backoff:        Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries:        3,
            initial_backoff:    Duration::from_millis(50),
            max_backoff:        Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (starting at 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.saturating_sub(1).min(64) as i32);
        let nanos = self.initial_backoff.as_nanos() as f64 * factor;
        Duration::from_nanos(nanos as u64).min(self.max_backoff)
    }
}

#[derive(Debug)]
#[fxstruct(sync, no_new, default(off), builder)]
pub struct RetrySupplier {
    /// The layer being retried.
    #[fieldx(get(clone), builder(required))]
    inner: Arc<dyn Supplier>,

    #[fieldx(get(copy), default(RetryPolicy::default()))]
    policy: RetryPolicy,
}

#[async_trait]
impl Supplier for RetrySupplier {
    fn name(&self) -> &'static str {
        "retry"
    }

    #[instrument(level = "trace", skip(self, request), fields(op = request.op(), inner = self.inner.name()))]
    async fn supply(&self, request: &StoreRequest, hints: &Hints) -> StoreResult<Supplied> {
        let policy = self.policy();
        let mut attempt = 0;
        loop {
            match self.inner.supply(request, hints).await {
                Err(err) if err.is_transient() && attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        "{} failed ({}), retry {attempt}/{} in {delay:?}",
                        request.op(),
                        err.code(),
                        policy.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn after_answer(
        &self,
        request: &StoreRequest,
        response: &StoreResponse,
        hints: &Hints,
        ticket: Ticket,
    ) -> StoreResult<()> {
        self.inner.after_answer(request, response, hints, ticket).await
    }
}
