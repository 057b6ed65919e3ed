//! Verify-after-write polling
//!
//! The store's listing and HEAD answers lag behind writes. Every mutating
//! call is followed by a bounded HEAD poll with exponential backoff. A poll
//! never fails: it reports whether the expected state was observed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::transport::StorageTransport;

/// Default number of HEAD attempts
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt
pub const DEFAULT_VERIFY_DELAY_MS: u64 = 1000;

/// Default delay multiplier between attempts
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_VERIFY_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_VERIFY_DELAY_MS),
            factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl BackoffPolicy {
    pub fn new(attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay: Duration::from_millis(initial_delay_ms),
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_delay
            .saturating_mul(self.factor.saturating_pow(exponent))
    }
}

/// Source of delays between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Present,
    Absent,
}

impl Expect {
    fn label(self) -> &'static str {
        match self {
            Self::Present => "exists",
            Self::Absent => "absent",
        }
    }
}

/// Polls HEAD until a path appears or disappears
#[derive(Clone)]
pub struct Verifier {
    transport: Arc<dyn StorageTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: BackoffPolicy,
}

impl Verifier {
    pub fn new(
        transport: Arc<dyn StorageTransport>,
        sleeper: Arc<dyn Sleeper>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// True once HEAD returns 2xx within the attempt budget
    pub async fn verify_exists(&self, path: &str) -> bool {
        self.poll(path, Expect::Present).await
    }

    /// True once HEAD returns 404 within the attempt budget
    pub async fn verify_absent(&self, path: &str) -> bool {
        self.poll(path, Expect::Absent).await
    }

    async fn poll(&self, path: &str, expect: Expect) -> bool {
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            let satisfied = match self.transport.head(path).await {
                Ok(response) => match expect {
                    Expect::Present => response.is_success(),
                    Expect::Absent => response.is_not_found(),
                },
                Err(e) => {
                    tracing::debug!(path, attempt, error = %e, "Verification HEAD failed");
                    false
                }
            };

            if satisfied {
                tracing::trace!(path, attempt, expect = expect.label(), "Verified");
                return true;
            }

            if attempt < attempts {
                let delay = self.policy.delay_after(attempt);
                tracing::debug!(
                    path,
                    attempt,
                    expect = expect.label(),
                    delay_ms = delay.as_millis() as u64,
                    "Not yet visible, backing off"
                );
                self.sleeper.sleep(delay).await;
            }
        }

        tracing::warn!(
            path,
            attempts,
            expect = expect.label(),
            "Verification window exhausted"
        );
        false
    }
}
