//! Context - Cancellation and Deadline per Call
//!
//! Every registrar operation receives a [`Context`]. The backend runs its
//! storage I/O through [`Context::run`], which races the operation against
//! the cancellation token and the deadline. When either fires first, the
//! in-flight future is dropped, aborting the underlying request.
//!
//! # Cancellation Semantics
//!
//! - Already cancelled at call time: `Cancelled` without touching storage.
//! - Deadline already passed at call time: `DeadlineExceeded` without touching storage.
//! - Cancelled or expired mid-flight: the operation is dropped and the
//!   matching error returned. Open SQL transactions roll back on drop.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::registry::{RegistryError, RegistryResult};

/// Cancellation token plus optional deadline carried by every call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// A context driven by an existing cancellation token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier existing deadline is kept. The child shares cancellation
    /// with its parent, and cancelling the child does not cancel the parent.
    #[must_use]
    pub fn timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Check the context before starting work.
    ///
    /// # Errors
    /// `Cancelled` or `DeadlineExceeded` when the context is already done.
    pub fn check(&self) -> RegistryResult<()> {
        if self.token.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(RegistryError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run a storage operation bounded by this context.
    ///
    /// # Errors
    /// The operation's own error, or `Cancelled`/`DeadlineExceeded` when the
    /// context finishes first.
    pub async fn run<F, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Future<Output = RegistryResult<T>>,
    {
        // Fail fast if already done
        self.check()?;

        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(RegistryError::Cancelled),
            () = expiry => Err(RegistryError::DeadlineExceeded),
            result = operation => result,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        let value = ctx.run(async { Ok::<_, RegistryError>(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test]
    async fn test_pre_cancelled_context_skips_operation() {
        let ctx = Context::background();
        ctx.cancel();

        let result: RegistryResult<()> = ctx.run(async { panic!("operation must not start") }).await;

        assert!(matches!(result, Err(RegistryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_during_operation() {
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RegistryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_expires_during_operation() {
        let ctx = Context::with_timeout(Duration::from_millis(20));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RegistryError::DeadlineExceeded));
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(50));
        let child = parent.timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child_but_not_reverse() {
        let parent = Context::background();
        let child = parent.timeout(Duration::from_secs(60));
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
