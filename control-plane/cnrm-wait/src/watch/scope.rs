use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use super::MAX_TIMEOUT;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeEnd {
    DeadlineExceeded,
    Cancelled,
}

/// Cancellation shared by every task of one wait: ends when the deadline
/// passes or the token is cancelled, whichever comes first.
#[derive(Clone, Debug)]
pub struct WaitScope {
    token: CancellationToken,
    deadline: Instant,
}

impl WaitScope {
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout.min(MAX_TIMEOUT),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking check.
    pub fn ended(&self) -> Option<ScopeEnd> {
        if self.token.is_cancelled() {
            Some(ScopeEnd::Cancelled)
        } else if Instant::now() >= self.deadline {
            Some(ScopeEnd::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the scope ends.
    pub async fn done(&self) -> ScopeEnd {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => ScopeEnd::Cancelled,
            _ = sleep_until(self.deadline) => ScopeEnd::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_ends_scope() {
        let scope = WaitScope::new(CancellationToken::new(), Duration::from_secs(5));
        assert_eq!(scope.ended(), None);
        assert_eq!(scope.done().await, ScopeEnd::DeadlineExceeded);
        assert_eq!(scope.ended(), Some(ScopeEnd::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_timeout_is_clamped() {
        let start = Instant::now();
        let scope = WaitScope::new(CancellationToken::new(), Duration::MAX);
        assert_eq!(scope.ended(), None);
        assert_eq!(scope.deadline, start + MAX_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_deadline() {
        let token = CancellationToken::new();
        let scope = WaitScope::new(token.clone(), Duration::from_secs(60));
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.done().await })
        };
        token.cancel();
        assert_eq!(waiter.await.unwrap(), ScopeEnd::Cancelled);
        assert_eq!(scope.ended(), Some(ScopeEnd::Cancelled));
    }
}
