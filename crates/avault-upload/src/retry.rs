//! Bounded-retry wrapper around an [`UploadClient`].
//!
//! State machine per invocation:
//! ```text
//! Pending ─► Attempting ─┬─► Succeeded
//!                ▲       ├─► RetryWait ─┐   (transient failure, attempts left)
//!                └───────┼──────────────┘
//!                        ├─► ExhaustedFailed (transient failure, budget spent)
//!                        └─► fatal error returned as-is
//! ```

use std::sync::Arc;
use std::time::Duration;

use avault_core::config::{UploadConfig, MAX_UPLOAD_ATTEMPTS};
use avault_core::{FileId, TransportError, UploadError, UploadResult};
use avault_storage::UploadClient;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included; clamped to `1..=MAX_UPLOAD_ATTEMPTS`
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_UPLOAD_ATTEMPTS,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based): doubles each
    /// time, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn attempt_budget(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_UPLOAD_ATTEMPTS)
    }
}

/// A successful upload and how many attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: FileId,
    pub attempts: u32,
}

#[derive(Debug)]
enum State {
    Pending,
    Attempting { attempt: u32 },
    RetryWait { attempt: u32, delay: Duration },
    Succeeded(UploadReceipt),
    ExhaustedFailed { attempts: u32, last: TransportError },
}

pub struct RetryingUploader<C> {
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: UploadClient> RetryingUploader<C> {
    pub fn new(client: Arc<C>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Upload `payload`, retrying transient failures within the attempt budget.
    ///
    /// `cancel` is honoured before each attempt and during backoff. An attempt
    /// already handed to the client runs to completion.
    pub async fn upload(
        &self,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> UploadResult<UploadReceipt> {
        let budget = self.policy.attempt_budget();
        let mut state = State::Pending;

        loop {
            state = match state {
                State::Pending => State::Attempting { attempt: 1 },

                State::Attempting { attempt } => {
                    if cancel.is_cancelled() {
                        return Err(UploadError::Cancelled);
                    }
                    debug!(attempt, max_attempts = budget, bytes = payload.len(), "upload attempt");

                    match self.client.upload(payload.clone()).await {
                        Ok(id) => State::Succeeded(UploadReceipt {
                            id,
                            attempts: attempt,
                        }),
                        Err(e) if !e.transient => {
                            warn!(attempt, error = %e, "upload rejected, not retrying");
                            return Err(UploadError::Transport(e));
                        }
                        Err(e) if attempt >= budget => State::ExhaustedFailed {
                            attempts: attempt,
                            last: e,
                        },
                        Err(e) => {
                            let delay = self.policy.backoff(attempt);
                            warn!(
                                attempt,
                                max_attempts = budget,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "upload attempt failed, retrying"
                            );
                            State::RetryWait { attempt, delay }
                        }
                    }
                }

                State::RetryWait { attempt, delay } => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    State::Attempting {
                        attempt: attempt + 1,
                    }
                }

                State::Succeeded(receipt) => {
                    debug!(id = %receipt.id, attempts = receipt.attempts, "upload succeeded");
                    return Ok(receipt);
                }

                State::ExhaustedFailed { attempts, last } => {
                    warn!(attempts, error = %last, "upload retries exhausted");
                    return Err(UploadError::ExhaustedRetries { attempts, last });
                }
            };
        }
    }
}
