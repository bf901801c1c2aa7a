//! Per-job cancellation context.
//!
//! Every blocking step of a dispatch (delay sleep, proxy acquire, dial, TLS
//! handshake, HTTP I/O, token acquisition, backoff sleep) runs under a
//! [`JobCtx`], which combines the job's explicit cancel token with its
//! deadline. Cancellation is cooperative: a step that is already inside a
//! system call finishes it, but no new step starts once the token fires.

use crate::base::error::NetError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation context carried by one job for its whole lifetime.
#[derive(Debug, Clone)]
pub struct JobCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl JobCtx {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// A context with no deadline and a fresh token; used by probes and tests.
    pub fn unbounded() -> Self {
        Self { cancel: CancellationToken::new(), deadline: None }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cheap check at a suspension point: has the job been canceled or has
    /// its deadline passed?
    pub fn check(&self) -> Result<(), NetError> {
        if self.cancel.is_cancelled() {
            return Err(NetError::Canceled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(NetError::TimedOut);
            }
        }
        Ok(())
    }

    /// Sleep for `dur`, cut short by cancellation or the deadline.
    pub async fn sleep(&self, dur: Duration) -> Result<(), NetError> {
        self.check()?;
        let capped = match self.remaining() {
            Some(left) if left < dur => left,
            _ => dur,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NetError::Canceled),
            _ = tokio::time::sleep(capped) => {
                // Slept the full requested duration, or hit the deadline.
                if capped < dur { Err(NetError::TimedOut) } else { Ok(()) }
            }
        }
    }

    /// Run a future under this context, bounded by `step_timeout` (and the
    /// job deadline, whichever is sooner). The future is dropped on cancel,
    /// which closes any socket it owns.
    pub async fn run<F, T>(&self, step_timeout: Duration, fut: F) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>>,
    {
        self.check()?;
        let bound = match self.remaining() {
            Some(left) if left < step_timeout => left,
            _ => step_timeout,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(NetError::Canceled),
            out = tokio::time::timeout(bound, fut) => match out {
                Ok(res) => res,
                Err(_) => Err(NetError::TimedOut),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_cut_by_deadline() {
        let ctx = JobCtx::new(
            CancellationToken::new(),
            Some(Instant::now() + Duration::from_millis(100)),
        );
        let err = ctx.sleep(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, NetError::TimedOut);
    }

    #[tokio::test]
    async fn sleep_cut_by_cancel() {
        let token = CancellationToken::new();
        let ctx = JobCtx::new(token.clone(), None);
        let sleeper = tokio::spawn(async move { ctx.sleep(Duration::from_secs(30)).await });
        token.cancel();
        assert_eq!(sleeper.await.unwrap().unwrap_err(), NetError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_per_step() {
        let ctx = JobCtx::unbounded();
        let err = ctx
            .run(Duration::from_millis(50), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, NetError::TimedOut);
    }

    #[tokio::test]
    async fn check_after_cancel() {
        let ctx = JobCtx::unbounded();
        assert!(ctx.check().is_ok());
        ctx.cancel_token().cancel();
        assert_eq!(ctx.check().unwrap_err(), NetError::Canceled);
    }
}
