//! Runner module - drives the stress test.
//!
//! This module provides:
//! - IterationEngine for one evaluate step and the run statistics
//! - EscalationPolicy for picking the recovery action after each cycle
//! - StressLoop, the main loop tying evaluator, plugins and power together

pub mod escalation;
pub mod iteration;
pub mod stress_loop;

pub use escalation::{EscalationPolicy, RecoveryAction};
pub use iteration::{IterationEngine, IterationSettings};
pub use stress_loop::{LoopSettings, RunExit, RunSummary, StressLoop};

use std::future::Future;
use std::io;
use std::time::Duration;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StressError};

/// Race `fut` against the operator interrupt
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StressError::Cancelled),
        result = fut => result,
    }
}

/// Sleep that ends early with `Cancelled` on interrupt
pub(crate) async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    cancellable(cancel, async {
        tokio::time::sleep(duration).await;
        Ok(())
    })
    .await
}

/// Cancel `cancel` on the first interrupt from `signal`, then keep
/// listening. Returns once a second interrupt arrives.
pub async fn watch_interrupts<S, F>(mut signal: S, cancel: CancellationToken) -> io::Result<()>
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    signal().await?;
    warn!("Interrupt received, stopping (interrupt again to exit now)");
    cancel.cancel();
    signal().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_returns() {
        let notify = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let interrupts = notify.clone();
        let signal = move || {
            let interrupts = interrupts.clone();
            async move {
                interrupts.notified().await;
                Ok::<(), io::Error>(())
            }
        };
        let watcher = tokio::spawn(watch_interrupts(signal, cancel.clone()));

        notify.notify_one();
        cancel.cancelled().await;
        assert!(!watcher.is_finished());

        notify.notify_one();
        watcher.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_signal_failure_does_not_cancel() {
        let cancel = CancellationToken::new();
        let signal = || async { Err::<(), _>(io::Error::other("no signal handler")) };

        let result = watch_interrupts(signal, cancel.clone()).await;

        assert!(result.is_err());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cancellable(&cancel, async { Ok(7) }).await;

        assert!(matches!(result, Err(StressError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_interrupted() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = pause(&cancel, Duration::from_secs(3600)).await;

        assert!(matches!(result, Err(StressError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_completes() {
        let cancel = CancellationToken::new();
        pause(&cancel, Duration::from_secs(20)).await.unwrap();
    }
}
