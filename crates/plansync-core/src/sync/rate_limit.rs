//! Pacing between sequential tracker calls.
//!
//! The synchronizer pauses through a [`RateLimitPolicy`] after every single
//! create call. Production wires in [`FixedDelay`]; tests use [`NoDelay`].

use std::time::Duration;

use async_trait::async_trait;

/// Delay applied after each sequential create call.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Decides how long to wait between sequential tracker calls.
#[async_trait]
pub trait RateLimitPolicy: Send + Sync {
    async fn pause(&self);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl RateLimitPolicy for NoDelay {
    async fn pause(&self) {}
}

/// Sleeps for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl RateLimitPolicy for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
