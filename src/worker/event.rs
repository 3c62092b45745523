//! Messages and shared plumbing between workers and the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::crypto::{DerivedAddress, Seed};

/// Wall-clock bound between two progress reports of one worker.
pub const PROGRESS_PERIOD: Duration = Duration::from_secs(1);

/// A winning candidate.
#[derive(Debug, Clone)]
pub struct FoundAddress {
    /// The seed to pass to the account-creation call
    pub seed: Seed,
    /// The derived address
    pub address: DerivedAddress,
    /// Attempts made by the winning worker
    pub attempts: u64,
    /// Time the winning worker spent searching
    pub elapsed: Duration,
    /// The ID of the worker that found this result
    pub worker_id: usize,
}

/// Attempts made by one worker since its previous report.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    pub worker_id: usize,
    pub attempts: u64,
    pub timestamp: Instant,
}

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Found,
    Cancelled,
    /// Hit its attempt cap without a match
    Exhausted,
    /// Stopped on an error or a panic
    Faulted,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerState::Idle | WorkerState::Running)
    }
}

/// Worker → pool messages.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Progress(ProgressSample),
    Found {
        result: FoundAddress,
        /// Attempts not yet covered by a progress report
        unreported: u64,
    },
    /// Final message of every worker thread.
    Exited {
        worker_id: usize,
        state: WorkerState,
    },
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every holder to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts attempts and decides when a progress report is due.
///
/// A report is due every `every` attempts or every `PROGRESS_PERIOD`,
/// whichever comes first.
#[derive(Debug)]
pub struct ProgressMeter {
    every: u64,
    pending: u64,
    total: u64,
    last_report: Instant,
}

impl ProgressMeter {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            pending: 0,
            total: 0,
            last_report: Instant::now(),
        }
    }

    /// Records `n` attempts and returns a sample if one is due.
    #[inline]
    pub fn record(&mut self, worker_id: usize, n: u64) -> Option<ProgressSample> {
        self.pending += n;
        self.total += n;
        // Reading the clock every attempt would dominate cheap iterations.
        let clock_due = (self.total & 0xff) < n && self.last_report.elapsed() >= PROGRESS_PERIOD;
        if self.pending >= self.every || clock_due {
            Some(self.take(worker_id))
        } else {
            None
        }
    }

    /// Drains the pending count into a sample.
    pub fn take(&mut self, worker_id: usize) -> ProgressSample {
        let now = Instant::now();
        let sample = ProgressSample {
            worker_id,
            attempts: self.pending,
            timestamp: now,
        };
        self.pending = 0;
        self.last_report = now;
        sample
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Emits `WorkerEvent::Exited` when the worker thread ends.
///
/// The reported state stays `Faulted` unless `finish` runs, which covers a
/// worker unwinding from a panic.
pub struct ExitGuard {
    worker_id: usize,
    events: Sender<WorkerEvent>,
    state: WorkerState,
}

impl ExitGuard {
    pub fn new(worker_id: usize, events: Sender<WorkerEvent>) -> Self {
        Self {
            worker_id,
            events,
            state: WorkerState::Faulted,
        }
    }

    /// Records how the worker ended.
    pub fn finish(&mut self, state: WorkerState) {
        self.state = state;
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.state = WorkerState::Faulted;
        }
        let _ = self.events.send(WorkerEvent::Exited {
            worker_id: self.worker_id,
            state: self.state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_reports_on_count() {
        let mut meter = ProgressMeter::new(10);
        for _ in 0..9 {
            assert!(meter.record(0, 1).is_none());
        }
        let sample = meter.record(0, 1).unwrap();
        assert_eq!(sample.attempts, 10);
        assert_eq!(meter.pending(), 0);
        assert_eq!(meter.total(), 10);
    }

    #[test]
    fn test_meter_reports_large_steps() {
        let mut meter = ProgressMeter::new(1_000);
        let sample = meter.record(3, 65_536).unwrap();
        assert_eq!(sample.worker_id, 3);
        assert_eq!(sample.attempts, 65_536);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_exit_guard_reports_state() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut guard = ExitGuard::new(4, tx);
        guard.finish(WorkerState::Exhausted);
        drop(guard);
        match rx.try_recv().unwrap() {
            WorkerEvent::Exited { worker_id, state } => {
                assert_eq!(worker_id, 4);
                assert_eq!(state, WorkerState::Exhausted);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_exit_guard_reports_panic() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::spawn(move || {
            let _guard = ExitGuard::new(7, tx);
            panic!("worker blew up");
        });
        assert!(handle.join().is_err());
        assert!(matches!(
            rx.try_recv().unwrap(),
            WorkerEvent::Exited {
                worker_id: 7,
                state: WorkerState::Faulted
            }
        ));
    }
}
