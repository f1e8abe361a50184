//! Provider back-off after quota signals.
//!
//! Each quota signal opens a pause window. The provider's `Retry-After` is
//! honored when present; otherwise the window doubles from `BACKOFF_BASE` up to
//! `BACKOFF_MAX`. A successful provider round closes the window and resets the
//! doubling.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{BACKOFF_BASE, BACKOFF_MAX};

#[derive(Debug, Default)]
struct BackoffState {
    consecutive_quota: u32,
    paused_until: Option<Instant>,
}

/// Pause window shared by every batch on one pipeline.
#[derive(Debug)]
pub struct ProviderBackoff {
    base: Duration,
    max: Duration,
    state: Mutex<BackoffState>,
}

impl Default for ProviderBackoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_MAX)
    }
}

impl ProviderBackoff {
    /// Creates a back-off with the given base and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            state: Mutex::new(BackoffState::default()),
        }
    }

    /// Records a quota signal and returns the length of the new window.
    pub async fn record_quota(&self, retry_after: Option<Duration>) -> Duration {
        let mut state = self.state.lock().await;
        state.consecutive_quota = state.consecutive_quota.saturating_add(1);

        let wait = match retry_after {
            Some(requested) => requested.min(self.max),
            None => {
                // base * 2^(n-1), capped
                let exponent = state.consecutive_quota.saturating_sub(1).min(31);
                self.base
                    .checked_mul(1u32 << exponent)
                    .map_or(self.max, |d| d.min(self.max))
            }
        };

        let until = Instant::now() + wait;
        // Never shorten a window that is already open.
        state.paused_until = Some(match state.paused_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });

        log::warn!(
            "Provider quota signal #{}: pausing lookups for {}s",
            state.consecutive_quota,
            wait.as_secs()
        );
        wait
    }

    /// Closes the window after a successful provider round.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.consecutive_quota > 0 || state.paused_until.is_some() {
            log::info!("Provider answered normally, clearing back-off");
        }
        *state = BackoffState::default();
    }

    /// Time left in the current window, if one is open.
    pub async fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        state
            .paused_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_closed_by_default() {
        let backoff = ProviderBackoff::default();
        assert_eq!(backoff.remaining().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_doubles_from_base_up_to_cap() {
        let backoff = ProviderBackoff::new(Duration::from_secs(60), Duration::from_secs(300));

        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(60));
        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(120));
        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(240));
        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(300));
        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_honored_and_capped() {
        let backoff = ProviderBackoff::new(Duration::from_secs(60), Duration::from_secs(3600));

        assert_eq!(
            backoff.record_quota(Some(Duration::from_secs(5))).await,
            Duration::from_secs(5)
        );
        assert_eq!(
            backoff.record_quota(Some(Duration::from_secs(86_400))).await,
            Duration::from_secs(3600)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires() {
        let backoff = ProviderBackoff::new(Duration::from_secs(60), Duration::from_secs(3600));
        backoff.record_quota(None).await;

        assert_eq!(backoff.remaining().await, Some(Duration::from_secs(60)));
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(backoff.remaining().await, Some(Duration::from_secs(15)));
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(backoff.remaining().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_window_and_doubling() {
        let backoff = ProviderBackoff::new(Duration::from_secs(60), Duration::from_secs(3600));
        backoff.record_quota(None).await;
        backoff.record_quota(None).await;

        backoff.record_success().await;
        assert_eq!(backoff.remaining().await, None);
        assert_eq!(backoff.record_quota(None).await, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_retry_after_does_not_shorten_open_window() {
        let backoff = ProviderBackoff::new(Duration::from_secs(60), Duration::from_secs(3600));
        backoff.record_quota(None).await;
        backoff.record_quota(Some(Duration::from_secs(1))).await;

        assert_eq!(backoff.remaining().await, Some(Duration::from_secs(60)));
    }
}
