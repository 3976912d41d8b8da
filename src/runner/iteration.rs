//! Iteration engine - one evaluate step per cycle.
//!
//! Each evaluate:
//! 1. Clears the evaluator transcript
//! 2. Waits for the success marker
//! 3. On failure, optionally sends the retry command and waits once more
//! 4. Classifies the result and updates the run statistics

use std::time::Duration;

use log::info;
use tokio_util::sync::CancellationToken;

use super::cancellable;
use crate::domain::{Outcome, RunStats};
use crate::error::Result;
use crate::evaluator::Evaluator;

/// Configuration for the iteration engine.
#[derive(Debug, Clone)]
pub struct IterationSettings {
    /// First wait for the success marker
    pub timeout: Duration,
    /// Diagnostic command sent after a failed first wait; `None` disables the retry
    pub retry_command: Option<String>,
    /// Wait after the retry command
    pub retry_timeout: Duration,
}

impl Default for IterationSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            retry_command: None,
            retry_timeout: Duration::from_secs(10),
        }
    }
}

/// Runs evaluate steps against an evaluator and owns the run statistics
pub struct IterationEngine<E> {
    evaluator: E,
    settings: IterationSettings,
    stats: RunStats,
    cancel: CancellationToken,
}

impl<E: Evaluator> IterationEngine<E> {
    pub fn new(evaluator: E, settings: IterationSettings, cancel: CancellationToken) -> Self {
        Self {
            evaluator,
            settings,
            stats: RunStats::new(),
            cancel,
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn settings(&self) -> &IterationSettings {
        &self.settings
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    /// Run one evaluate step.
    ///
    /// Returns `StressError::Cancelled` as soon as the operator interrupts;
    /// counters updated before that point are kept.
    pub async fn evaluate(&mut self) -> Result<Outcome> {
        self.stats.iterations += 1;
        self.evaluator.clear_log();

        if self.sync(self.settings.timeout).await? {
            self.stats.syncs += 1;
            return Ok(Outcome::Synced);
        }

        self.stats.resyncs += 1;
        let Some(command) = self.settings.retry_command.clone() else {
            return Ok(Outcome::Timeout);
        };

        info!("No sync on iteration {}, retrying with '{}'", self.stats.iterations, command);
        cancellable(&self.cancel, self.evaluator.send_eval_command(&command)).await?;

        if self.sync(self.settings.retry_timeout).await? {
            Ok(Outcome::Resynced)
        } else {
            self.stats.timeouts += 1;
            Ok(Outcome::Timeout)
        }
    }

    async fn sync(&mut self, timeout: Duration) -> Result<bool> {
        cancellable(&self.cancel, self.evaluator.sync(timeout)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted evaluator shared by the runner tests.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::error::{Result, StressError};
    use crate::evaluator::Evaluator;

    /// What the next `sync` call does
    #[derive(Debug, Clone)]
    pub enum Step {
        Sync(bool),
        /// Cancel the token and never return
        Interrupt,
        /// Fail with a closed link
        LinkDown,
    }

    /// Evaluator replaying scripted `sync` results and journaling every call.
    ///
    /// Once the script runs out every `sync` returns `false`.
    pub struct ScriptedEvaluator {
        steps: VecDeque<Step>,
        journal: Arc<Mutex<Vec<String>>>,
        cancel: CancellationToken,
        log: String,
    }

    impl ScriptedEvaluator {
        pub fn new(steps: Vec<Step>, journal: Arc<Mutex<Vec<String>>>, cancel: CancellationToken) -> Self {
            Self {
                steps: steps.into(),
                journal,
                cancel,
                log: String::new(),
            }
        }

        fn record(&self, entry: impl Into<String>) {
            self.journal.lock().unwrap().push(entry.into());
        }
    }

    #[async_trait]
    impl Evaluator for ScriptedEvaluator {
        async fn sync(&mut self, timeout: Duration) -> Result<bool> {
            self.record(format!("sync {}ms", timeout.as_millis()));
            self.log.push_str("line\n");
            match self.steps.pop_front().unwrap_or(Step::Sync(false)) {
                Step::Sync(result) => Ok(result),
                Step::Interrupt => {
                    self.cancel.cancel();
                    std::future::pending::<()>().await;
                    Ok(false)
                }
                Step::LinkDown => Err(StressError::LinkClosed),
            }
        }

        async fn mcu_reboot(&mut self) -> Result<()> {
            self.record("mcu_reboot");
            Ok(())
        }

        async fn soc_reboot(&mut self) -> Result<()> {
            self.record("soc_reboot");
            Ok(())
        }

        async fn send_eval_command(&mut self, command: &str) -> Result<()> {
            self.record(format!("eval {}", command));
            Ok(())
        }

        fn log(&self) -> &str {
            &self.log
        }

        fn clear_log(&mut self) {
            self.log.clear();
        }
    }

    pub fn syncs(journal: &Arc<Mutex<Vec<String>>>) -> usize {
        journal.lock().unwrap().iter().filter(|e| e.starts_with("sync")).count()
    }
}
