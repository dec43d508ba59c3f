//! Run polling: bounded wait for a terminal lifecycle state.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::types::RunRecord;
use crate::workspace::WorkspaceApi;

/// Cancel side of a cancellation pair; cloneable so a signal handler can
/// hold one while the pipeline owns the token.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Token honored by the poller between status fetches. Dropping every
/// [`CancelHandle`] without cancelling leaves the token permanently
/// uncancelled.
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Every handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected cancellation pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Result of one polling session.
#[derive(Debug)]
pub struct PollReport {
    /// Final record; immutable from here on.
    pub record: RunRecord,
    /// The wait budget ran out before a terminal state was observed.
    /// Treated as unresolved, not as failure (see DESIGN.md).
    pub timed_out: bool,
    /// Polling was interrupted by cancellation.
    pub cancelled: bool,
    /// Transient fetch failures; each consumed a poll attempt without
    /// resetting the budget.
    pub fetch_failures: u32,
}

/// Polls run status at a fixed cadence until terminal, timeout, or
/// cancellation, whichever comes first.
pub struct RunPoller<'a> {
    workspace: &'a dyn WorkspaceApi,
    poll: PollConfig,
}

impl<'a> RunPoller<'a> {
    pub fn new(workspace: &'a dyn WorkspaceApi, poll: PollConfig) -> Self {
        Self { workspace, poll }
    }

    /// Drive `record` to a terminal state or exhaust the wait budget.
    ///
    /// The record starts from the state the submission fetch reported.
    /// Each iteration sleeps one interval, then re-fetches; a fetch
    /// failure retains the previous state. For a run that never
    /// terminates this performs at most `max_wait / interval` (rounded
    /// up) fetches.
    pub async fn poll(&self, mut record: RunRecord, cancel: &mut CancelToken) -> PollReport {
        let mut waited = std::time::Duration::ZERO;
        let mut fetch_failures = 0u32;
        let mut cancelled = false;

        while record.lifecycle_state.is_in_progress() && waited < self.poll.max_wait {
            tokio::select! {
                _ = tokio::time::sleep(self.poll.interval) => {}
                _ = cancel.cancelled() => {
                    info!(run_id = %record.run_id, "polling cancelled");
                    cancelled = true;
                    break;
                }
            }
            waited += self.poll.interval;

            match self.workspace.get_run(&record.run_id).await {
                Ok(snapshot) => {
                    if snapshot.lifecycle_state != record.lifecycle_state {
                        debug!(
                            run_id = %record.run_id,
                            from = %record.lifecycle_state,
                            to = %snapshot.lifecycle_state,
                            "run state transition"
                        );
                    }
                    record.lifecycle_state = snapshot.lifecycle_state;
                    record.result_state = snapshot.result_state;
                }
                Err(err) => {
                    // Consumes this attempt; the budget never resets.
                    fetch_failures += 1;
                    warn!(run_id = %record.run_id, error = %err, "status fetch failed");
                }
            }
        }

        let timed_out = !cancelled && record.lifecycle_state.is_in_progress();
        if timed_out {
            warn!(
                run_id = %record.run_id,
                last_state = %record.lifecycle_state,
                waited_secs = waited.as_secs(),
                budget_fetches = self.poll.max_fetches(),
                "poll budget exhausted before terminal state"
            );
        }

        PollReport {
            record,
            timed_out,
            cancelled,
            fetch_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWorkspace;
    use crate::types::{LifecycleState, ResultState, RunId};

    fn running_record() -> RunRecord {
        RunRecord::new(RunId::new(1), LifecycleState::Running)
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_run_stops_after_forty_fetches() {
        let mock = MockWorkspace::builder().never_terminates().build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (_handle, mut token) = cancel_pair();

        let report = poller.poll(running_record(), &mut token).await;

        assert_eq!(mock.fetch_count(), 40);
        assert!(report.timed_out);
        assert!(!report.cancelled);
        // The last observed non-terminal state is retained, not an error.
        assert_eq!(report.record.lifecycle_state, LifecycleState::Running);
        assert_eq!(report.record.reported_status(), "RUNNING");
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_within_two_polls() {
        let mock = MockWorkspace::builder()
            .terminates_after(2, ResultState::Success)
            .build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (_handle, mut token) = cancel_pair();

        let report = poller.poll(running_record(), &mut token).await;

        assert_eq!(mock.fetch_count(), 2);
        assert!(!report.timed_out);
        assert_eq!(report.record.lifecycle_state, LifecycleState::Terminated);
        assert_eq!(report.record.reported_status(), "SUCCESS");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_consumes_attempt_and_keeps_state() {
        let mock = MockWorkspace::builder()
            .failing_fetch(1)
            .terminates_after(2, ResultState::Success)
            .build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (_handle, mut token) = cancel_pair();

        let report = poller.poll(running_record(), &mut token).await;

        assert_eq!(report.fetch_failures, 1);
        // Fetch 1 failed, fetch 2 returned the scripted terminal state.
        assert_eq!(mock.fetch_count(), 2);
        assert_eq!(report.record.reported_status(), "SUCCESS");
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_terminal_record_is_not_polled() {
        let mock = MockWorkspace::builder().build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (_handle, mut token) = cancel_pair();

        let record = RunRecord::new(RunId::new(1), LifecycleState::Terminated);
        let report = poller.poll(record, &mut token).await;

        assert_eq!(mock.fetch_count(), 0);
        assert!(!report.timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_polling() {
        let mock = MockWorkspace::builder().never_terminates().build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (handle, mut token) = cancel_pair();

        handle.cancel();
        let report = poller.poll(running_record(), &mut token).await;

        assert!(report.cancelled);
        assert!(!report.timed_out);
        assert_eq!(mock.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failing_fetches_still_respect_budget() {
        let mut builder = MockWorkspace::builder().never_terminates();
        for n in 1..=40 {
            builder = builder.failing_fetch(n);
        }
        let mock = builder.build();
        let poller = RunPoller::new(&mock, PollConfig::default());
        let (_handle, mut token) = cancel_pair();

        let report = poller.poll(running_record(), &mut token).await;

        assert_eq!(mock.fetch_count(), 40);
        assert_eq!(report.fetch_failures, 40);
        assert!(report.timed_out);
        // Submission-time state survives when every fetch failed.
        assert_eq!(report.record.lifecycle_state, LifecycleState::Running);
    }
}
