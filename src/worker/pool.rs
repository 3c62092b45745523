//! Worker pool management.
//!
//! The pool is the single consumer of every worker event. It sums progress,
//! reports throughput, picks the first match, and tears the workers down.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::matcher::Pattern;
use crate::request::{Accelerator, RequestError, SearchRequest};

use super::cpu::{CpuWorker, WorkerParams};
use super::event::{CancelToken, ExitGuard, FoundAddress, WorkerEvent, WorkerState};
#[cfg(feature = "gpu")]
use super::gpu::GpuKernel;
use super::kernel::{BatchKernel, BatchWorker, LaneKernel};

/// Longest the pool waits on the channel before re-checking cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Default window between throughput reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that prevent a search from starting.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("failed to build lane thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How a search ended.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// The first verified match
    Found(FoundAddress),
    /// Every worker hit its attempt cap
    Exhausted,
    /// Every worker stopped and at least one of them faulted
    Aborted { faulted: usize },
    /// The caller cancelled the search
    Cancelled,
}

impl SearchOutcome {
    pub fn found(&self) -> Option<&FoundAddress> {
        match self {
            SearchOutcome::Found(result) => Some(result),
            _ => None,
        }
    }
}

/// Aggregate search rate over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Attempts per second within the window
    pub attempts_per_second: f64,
    /// Attempts across all workers since the start
    pub total_attempts: u64,
    /// Time since the pool started
    pub elapsed: Duration,
}

/// Manages a pool of workers for one search.
pub struct WorkerPool {
    /// Number of workers
    num_workers: usize,
    /// The pattern to search for
    pattern: Pattern,
    /// Worker thread handles (Option to allow taking during join)
    handles: Option<Vec<JoinHandle<WorkerState>>>,
    /// Channel receiver for worker events
    event_rx: Option<Receiver<WorkerEvent>>,
    /// Caller's interrupt, polled by `run`
    cancel: CancelToken,
    /// Stop flag shared with the workers
    shutdown: CancelToken,
    /// Final state of each worker, filled in by `join`
    states: Vec<WorkerState>,
    /// Attempts reported so far
    total_attempts: u64,
    /// Outcome of a finished run
    outcome: Option<SearchOutcome>,
    /// Start time
    start_time: Instant,
}

impl WorkerPool {
    /// Validates `request` and starts its workers.
    ///
    /// Cancelling `cancel` from any thread stops the search. The pool never
    /// cancels `cancel` itself, so one token can serve several searches.
    pub fn spawn(request: &SearchRequest, cancel: CancelToken) -> Result<Self, SearchError> {
        request.validate()?;

        let params = WorkerParams::from(request);
        let (event_tx, event_rx) = bounded(100.max(request.worker_count * 4));

        let mut pool = Self {
            num_workers: 0,
            pattern: params.pattern.clone(),
            handles: Some(Vec::new()),
            event_rx: Some(event_rx),
            cancel,
            shutdown: CancelToken::new(),
            states: Vec::new(),
            total_attempts: 0,
            outcome: None,
            start_time: Instant::now(),
        };

        // An early return drops `pool`, which stops and joins what was started.
        match request.accelerator {
            Accelerator::None => {
                pool.spawn_cpu_workers(request.worker_count, &params, &event_tx)?;
            }
            Accelerator::Lanes => {
                let kernel = LaneKernel::new(request.worker_count, request.lanes)?;
                pool.spawn_batch_worker(0, Box::new(kernel), &params, &event_tx)?;
            }
            Accelerator::Gpu => {
                pool.spawn_cpu_workers(request.worker_count, &params, &event_tx)?;
                pool.spawn_gpu_worker(request, &params, &event_tx)?;
            }
        }

        // Drop the pool's sender so the channel closes when all workers finish
        drop(event_tx);

        log::debug!(
            "Started {} workers ({} accelerator)",
            pool.num_workers,
            request.accelerator
        );
        Ok(pool)
    }

    fn spawn_cpu_workers(
        &mut self,
        count: usize,
        params: &WorkerParams,
        events: &Sender<WorkerEvent>,
    ) -> io::Result<()> {
        for id in 0..count {
            let worker =
                CpuWorker::new(id, params.clone(), events.clone(), self.shutdown.clone());
            self.spawn_thread(id, format!("vanity-worker-{}", id), events, move || worker.run())?;
        }
        Ok(())
    }

    fn spawn_batch_worker(
        &mut self,
        id: usize,
        kernel: Box<dyn BatchKernel>,
        params: &WorkerParams,
        events: &Sender<WorkerEvent>,
    ) -> io::Result<()> {
        let name = format!("vanity-{}-worker", kernel.name());
        let worker = BatchWorker::new(
            id,
            params.clone(),
            kernel,
            events.clone(),
            self.shutdown.clone(),
        );
        self.spawn_thread(id, name, events, move || worker.run())
    }

    /// Adds the GPU worker, falling back to CPU-only when no device is usable.
    #[cfg(feature = "gpu")]
    fn spawn_gpu_worker(
        &mut self,
        request: &SearchRequest,
        params: &WorkerParams,
        events: &Sender<WorkerEvent>,
    ) -> io::Result<()> {
        match GpuKernel::new(request.gpu_device, request.lanes) {
            Ok(kernel) => {
                // GPU worker gets next ID
                let id = request.worker_count;
                self.spawn_batch_worker(id, Box::new(kernel), params, events)
            }
            Err(e) => {
                log::warn!("GPU initialization failed: {}", e);
                log::warn!("Continuing with CPU-only workers.");
                Ok(())
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    fn spawn_gpu_worker(
        &mut self,
        _request: &SearchRequest,
        _params: &WorkerParams,
        _events: &Sender<WorkerEvent>,
    ) -> io::Result<()> {
        log::warn!("Built without the `gpu` feature. Continuing with CPU-only workers.");
        Ok(())
    }

    fn spawn_thread<F>(
        &mut self,
        id: usize,
        name: String,
        events: &Sender<WorkerEvent>,
        body: F,
    ) -> io::Result<()>
    where
        F: FnOnce() -> WorkerState + Send + 'static,
    {
        let exit_tx = events.clone();
        let handle = thread::Builder::new().name(name).spawn(move || {
            let mut guard = ExitGuard::new(id, exit_tx);
            let state = body();
            guard.finish(state);
            state
        })?;

        if let Some(handles) = self.handles.as_mut() {
            handles.push(handle);
        }
        self.num_workers += 1;
        Ok(())
    }

    /// Consumes worker events until the search ends, then joins every worker.
    ///
    /// `on_progress` receives one `Throughput` per `report_interval`.
    pub fn run<F>(&mut self, report_interval: Duration, mut on_progress: F) -> SearchOutcome
    where
        F: FnMut(&Throughput),
    {
        let Some(event_rx) = self.event_rx.take() else {
            return self.outcome.clone().unwrap_or(SearchOutcome::Cancelled);
        };

        let report_interval = report_interval.max(Duration::from_millis(1));
        let tick = report_interval.min(CANCEL_POLL);
        let mut live = self.num_workers;
        let mut faulted = 0usize;
        let mut window_start = Instant::now();
        let mut window_attempts = 0u64;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break SearchOutcome::Cancelled;
            }

            if live == 0 {
                break Self::drained(faulted);
            }

            match event_rx.recv_timeout(tick) {
                Ok(WorkerEvent::Progress(sample)) => {
                    self.total_attempts += sample.attempts;
                    window_attempts += sample.attempts;
                }
                Ok(WorkerEvent::Found { result, unreported }) => {
                    self.total_attempts += unreported;
                    log::debug!(
                        "Worker {} won with {}",
                        result.worker_id,
                        result.address.encoded
                    );
                    break SearchOutcome::Found(result);
                }
                Ok(WorkerEvent::Exited { worker_id, state }) => {
                    live = live.saturating_sub(1);
                    if state == WorkerState::Faulted {
                        faulted += 1;
                        log::warn!("Worker {} faulted", worker_id);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Self::drained(faulted),
            }

            let window = window_start.elapsed();
            if window >= report_interval {
                let throughput = Throughput {
                    attempts_per_second: window_attempts as f64 / window.as_secs_f64(),
                    total_attempts: self.total_attempts,
                    elapsed: self.elapsed(),
                };
                log::debug!(
                    "Speed: {:.2}M attempts/s, Total: {} attempts",
                    throughput.attempts_per_second / 1_000_000.0,
                    throughput.total_attempts
                );
                on_progress(&throughput);
                window_start = Instant::now();
                window_attempts = 0;
            }
        };

        // Workers blocked on a full channel see the hang-up and exit.
        self.stop();
        drop(event_rx);
        self.join_workers();

        self.outcome = Some(outcome.clone());
        outcome
    }

    fn drained(faulted: usize) -> SearchOutcome {
        if faulted > 0 {
            SearchOutcome::Aborted { faulted }
        } else {
            SearchOutcome::Exhausted
        }
    }

    fn join_workers(&mut self) {
        if let Some(handles) = self.handles.take() {
            self.states = handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(WorkerState::Faulted))
                .collect();
        }
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Stops and waits for all workers.
    pub fn join(mut self) -> Vec<WorkerState> {
        self.stop();
        self.event_rx.take();
        self.join_workers();
        std::mem::take(&mut self.states)
    }

    /// Final state of each worker, in spawn order. Empty until the run ends.
    pub fn worker_states(&self) -> &[WorkerState] {
        &self.states
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns the pattern being searched for.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the attempts reported across all workers.
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    /// Returns the elapsed time since the pool was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the average rate since the pool was created.
    pub fn attempts_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_attempts as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a clone of the cancel token for external use (e.g., signal handlers).
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Returns true if the pool has told its workers to stop.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.handles.is_some() {
            self.stop();
            self.event_rx.take();
            self.join_workers();
        }
    }
}

/// Runs `request` to completion with a fresh cancel token.
pub fn search(request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
    search_with_progress(request, CancelToken::new(), DEFAULT_REPORT_INTERVAL, |_| {})
}

/// Runs `request` to completion, reporting throughput to `on_progress`.
pub fn search_with_progress<F>(
    request: &SearchRequest,
    cancel: CancelToken,
    report_interval: Duration,
    on_progress: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(&Throughput),
{
    let mut pool = WorkerPool::spawn(request, cancel)?;
    Ok(pool.run(report_interval, on_progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_address, Pubkey, TOKEN_2022_PROGRAM_ID};
    use crate::matcher::Position;

    fn make_request(pattern: &str, workers: usize) -> SearchRequest {
        let mut request = SearchRequest::new(
            Pubkey::from_bytes([9u8; 32]),
            TOKEN_2022_PROGRAM_ID,
            pattern,
            Position::End,
        );
        request.worker_count = workers;
        request.batch_size = 100;
        request
    }

    #[test]
    fn test_pool_finds_match() {
        let request = make_request("a", 2);
        let mut pool = WorkerPool::spawn(&request, CancelToken::new()).unwrap();
        assert_eq!(pool.num_workers(), 2);

        let outcome = pool.run(Duration::from_millis(10), |_| {});
        let found = outcome.found().expect("match");
        assert!(found.address.encoded.ends_with('a'));

        let again =
            derive_address(&request.base_pubkey, found.seed.as_bytes(), &request.program_id)
                .unwrap();
        assert_eq!(again.encoded, found.address.encoded);

        assert_eq!(pool.worker_states().len(), 2);
        assert!(pool.worker_states().iter().all(|s| s.is_terminal()));
        assert!(pool.is_stopped());
    }

    #[test]
    fn test_pool_exhausts() {
        let mut request = make_request(&"z".repeat(44), 3);
        request.max_attempts = Some(200);

        let mut pool = WorkerPool::spawn(&request, CancelToken::new()).unwrap();
        let outcome = pool.run(Duration::from_millis(10), |_| {});

        assert!(matches!(outcome, SearchOutcome::Exhausted));
        assert_eq!(pool.total_attempts(), 600);
        assert!(pool
            .worker_states()
            .iter()
            .all(|&s| s == WorkerState::Exhausted));
    }

    #[test]
    fn test_pool_reports_progress() {
        let mut request = make_request(&"z".repeat(44), 1);
        request.max_attempts = Some(50_000);

        let mut reports = Vec::new();
        let mut pool = WorkerPool::spawn(&request, CancelToken::new()).unwrap();
        pool.run(Duration::from_millis(1), |t| reports.push(*t));

        assert!(!reports.is_empty());
        assert!(reports
            .windows(2)
            .all(|w| w[0].total_attempts <= w[1].total_attempts));
    }

    #[test]
    fn test_pre_cancelled_pool() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = search_with_progress(
            &make_request(&"z".repeat(44), 2),
            cancel,
            DEFAULT_REPORT_INTERVAL,
            |_| {},
        )
        .unwrap();
        assert!(matches!(outcome, SearchOutcome::Cancelled));
    }

    #[test]
    fn test_caller_token_survives_search() {
        let request = make_request("a", 2);
        let cancel = CancelToken::new();

        let first =
            search_with_progress(&request, cancel.clone(), DEFAULT_REPORT_INTERVAL, |_| {})
                .unwrap();
        assert!(first.found().is_some());
        assert!(!cancel.is_cancelled());

        let second =
            search_with_progress(&request, cancel.clone(), DEFAULT_REPORT_INTERVAL, |_| {})
                .unwrap();
        assert!(second.found().is_some());
    }

    #[test]
    fn test_invalid_request_fails_fast() {
        let err = search(&make_request("0OIl", 1)).unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest(_)));
    }

    #[test]
    fn test_run_twice_returns_same_outcome() {
        let mut request = make_request(&"z".repeat(44), 1);
        request.max_attempts = Some(10);
        let mut pool = WorkerPool::spawn(&request, CancelToken::new()).unwrap();
        assert!(matches!(pool.run(DEFAULT_REPORT_INTERVAL, |_| {}), SearchOutcome::Exhausted));
        assert!(matches!(pool.run(DEFAULT_REPORT_INTERVAL, |_| {}), SearchOutcome::Exhausted));
    }
}
