//! Execution context for ledger operations.
//!
//! An [`ExecContext`] carries an optional deadline and a cancellation token.
//! Every ledger operation runs through [`ExecContext::run`]; when the
//! context fires first, the operation future is dropped. Dropping an open
//! `DatabaseTransaction` rolls it back, so an interrupted debit or transfer
//! leaves no partial write behind.

use std::future::Future;
use std::time::Duration;

use ledger_shared::LedgerConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::LedgerError;

/// Cancellable, deadline-bearing context passed to every ledger operation.
#[derive(Debug, Clone)]
pub struct ExecContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl ExecContext {
    /// A context that never times out and is only cancelled explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// A context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// A context using the configured per-operation timeout.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::with_timeout(Duration::from_millis(config.operation_timeout_ms))
    }

    /// Derives a context that is cancelled with its parent.
    ///
    /// The child keeps the earlier of the parent deadline and `timeout`.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let requested = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, requested) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (parent, child) => parent.or(child),
        };

        Self {
            deadline,
            token: self.token.child_token(),
        }
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `operation`, aborting it on cancellation or deadline.
    ///
    /// An already cancelled or expired context never polls `operation`.
    pub async fn run<T, F>(&self, operation: &'static str, future: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        if self.token.is_cancelled() {
            return Err(LedgerError::Cancelled { operation });
        }
        // A timer registered at or after its deadline fires on the next tick, not now.
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(LedgerError::DeadlineExceeded { operation });
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(LedgerError::Cancelled { operation }),
            () = deadline => Err(LedgerError::DeadlineExceeded { operation }),
            result = future => result,
        }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::background()
    }
}
