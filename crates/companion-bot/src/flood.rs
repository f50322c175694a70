//! Per-user flood control.
//!
//! A user may send one conversational message per window. The last-seen
//! marker lives in a moka cache whose time-to-live equals the window, so an
//! entry's presence alone means "too soon".

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// Upper bound on tracked users; older entries are evicted first.
const MAX_TRACKED_USERS: u64 = 100_000;

#[derive(Clone)]
pub struct FloodGuard {
    seen: Option<Cache<i64, ()>>,
}

impl FloodGuard {
    /// A zero window disables flood control.
    pub fn new(window: Duration) -> Self {
        let seen = (!window.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_TRACKED_USERS)
                .time_to_live(window)
                .build()
        });
        Self { seen }
    }

    /// Record a message from `user_id`. `false` if the previous one was too recent.
    pub async fn check(&self, user_id: i64) -> bool {
        let Some(seen) = &self.seen else {
            return true;
        };
        let entry = seen.entry(user_id).or_insert(()).await;
        if !entry.is_fresh() {
            debug!(user_id, "flood control triggered");
        }
        entry.is_fresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_message_inside_window_is_refused() {
        let guard = FloodGuard::new(Duration::from_secs(60));
        assert!(guard.check(1).await);
        assert!(!guard.check(1).await);
        // Other users are independent.
        assert!(guard.check(2).await);
    }

    #[tokio::test]
    async fn window_expiry_allows_again() {
        let guard = FloodGuard::new(Duration::from_millis(100));
        assert!(guard.check(1).await);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(guard.check(1).await);
    }

    #[tokio::test]
    async fn zero_window_never_blocks() {
        let guard = FloodGuard::new(Duration::ZERO);
        for _ in 0..5 {
            assert!(guard.check(1).await);
        }
    }
}
