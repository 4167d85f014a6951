//! Timed-cache-validity token (§4.B): a cheap handle that starts valid and
//! transitions to invalid exactly once, either immediately or after a delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct CacheToken(Arc<State>);

struct State {
    valid: AtomicBool,
    invalidation_scheduled: AtomicBool,
}

impl Default for CacheToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheToken {
    pub fn new() -> Self {
        Self(Arc::new(State {
            valid: AtomicBool::new(true),
            invalidation_scheduled: AtomicBool::new(false),
        }))
    }

    pub fn is_valid(&self) -> bool {
        self.0.valid.load(Ordering::Acquire)
    }

    /// Schedule this token's invalidation (a no-op if one is already
    /// scheduled — at most one pending timer per token) and return a token
    /// the caller can keep using: `self` while it is still valid, or a
    /// freshly constructed valid token once it has flipped.
    pub fn invalidate_and_new(&self, delay: Duration) -> CacheToken {
        let already_scheduled = self.0.invalidation_scheduled.swap(true, Ordering::AcqRel);
        if !already_scheduled {
            if delay.is_zero() {
                self.0.valid.store(false, Ordering::Release);
            } else {
                let state = Arc::clone(&self.0);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    state.valid.store(false, Ordering::Release);
                });
            }
        }

        if self.is_valid() {
            self.clone()
        } else {
            CacheToken::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid() {
        assert!(CacheToken::new().is_valid());
    }

    #[test]
    fn zero_delay_invalidates_immediately_and_returns_new_token() {
        let t1 = CacheToken::new();
        let t2 = t1.invalidate_and_new(Duration::ZERO);
        assert!(!t1.is_valid());
        assert!(t2.is_valid());
        // t2 is a distinct, freshly valid token, not the same handle.
        assert!(!t1.is_valid());
    }

    #[tokio::test]
    async fn delayed_invalidation_keeps_readers_valid_until_it_fires() {
        let t1 = CacheToken::new();
        let t2 = t1.invalidate_and_new(Duration::from_millis(20));
        // Still valid immediately after scheduling.
        assert!(t1.is_valid());
        assert!(t2.is_valid());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!t1.is_valid());
    }

    #[tokio::test]
    async fn repeated_calls_before_the_timer_fires_do_not_reschedule() {
        let t1 = CacheToken::new();
        let _ = t1.invalidate_and_new(Duration::from_millis(200));
        // A second call while still pending must not push the deadline out
        // or spawn a second timer; it just observes the existing schedule.
        let again = t1.invalidate_and_new(Duration::from_millis(5));
        assert!(again.is_valid());
        assert!(t1.is_valid());
    }
}
