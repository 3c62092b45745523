//! Data-parallel batch search.
//!
//! A `BatchKernel` tests one dispatch worth of candidates at once. Every lane
//! derives its seed from a shared random template (`Seed::with_lane`), so the
//! host only needs the winning lane index to rebuild the winning seed. Lanes
//! race to claim the first match with a single compare-and-set.
//!
//! `BatchWorker` drives any kernel with the same event protocol as
//! `CpuWorker` and re-checks every reported winner on the CPU.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use rayon::prelude::*;

use crate::crypto::{
    derive_address, derive_with_seed, encode_address, Pubkey, Seed, SeedGenerator,
    MAX_ADDRESS_LEN,
};
use crate::matcher::Pattern;

use super::cpu::WorkerParams;
use super::event::{CancelToken, FoundAddress, ProgressMeter, WorkerEvent, WorkerState};

/// Kernel failures in a row before the batch worker gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 8;

/// Pause after a failed dispatch.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

const NO_MATCH: u64 = u64::MAX;

/// Errors a kernel dispatch can report.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("kernel does not support this pattern")]
    Unsupported,

    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

/// Inputs of one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct BatchJob<'a> {
    pub base_pubkey: &'a Pubkey,
    pub program_id: &'a Pubkey,
    pub pattern: &'a Pattern,
    /// Seed every lane starts from
    pub template: &'a Seed,
    /// Lanes to test, at most `BatchKernel::lanes()`
    pub lanes: usize,
}

/// A data-parallel candidate tester.
pub trait BatchKernel: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Most candidates tested per dispatch.
    fn lanes(&self) -> usize;

    /// Whether the kernel can evaluate `pattern`.
    fn supports(&self, pattern: &Pattern) -> bool;

    /// Tests lanes `0..job.lanes` and returns the lane that claimed a match.
    fn dispatch(&mut self, job: &BatchJob<'_>) -> Result<Option<u64>, KernelError>;
}

/// CPU lane kernel running on a dedicated rayon pool.
pub struct LaneKernel {
    pool: rayon::ThreadPool,
    lanes: usize,
}

impl LaneKernel {
    /// Creates a lane kernel with `threads` rayon threads.
    pub fn new(threads: usize, lanes: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vanity-lane-{}", i))
            .build()?;
        Ok(Self { pool, lanes })
    }
}

impl BatchKernel for LaneKernel {
    fn name(&self) -> &str {
        "cpu-lanes"
    }

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn supports(&self, _pattern: &Pattern) -> bool {
        true
    }

    fn dispatch(&mut self, job: &BatchJob<'_>) -> Result<Option<u64>, KernelError> {
        let claim = AtomicU64::new(NO_MATCH);
        let lanes = job.lanes.min(self.lanes) as u64;

        self.pool.install(|| {
            (0..lanes).into_par_iter().for_each(|lane| {
                if claim.load(Ordering::Relaxed) != NO_MATCH {
                    return;
                }
                let seed = job.template.with_lane(lane);
                let pubkey = derive_with_seed(job.base_pubkey, seed.as_bytes(), job.program_id);
                let mut buf = [0u8; MAX_ADDRESS_LEN];
                let Ok(len) = encode_address(&pubkey, &mut buf) else {
                    return;
                };
                if job.pattern.matches_bytes(&buf[..len]) {
                    let _ = claim.compare_exchange(
                        NO_MATCH,
                        lane,
                        Ordering::AcqRel,
                        Ordering::Relaxed,
                    );
                }
            });
        });

        match claim.into_inner() {
            NO_MATCH => Ok(None),
            lane => Ok(Some(lane)),
        }
    }
}

/// Worker that drives a `BatchKernel`.
pub struct BatchWorker {
    id: usize,
    params: WorkerParams,
    kernel: Box<dyn BatchKernel>,
    events: Sender<WorkerEvent>,
    cancel: CancelToken,
}

impl BatchWorker {
    pub fn new(
        id: usize,
        params: WorkerParams,
        kernel: Box<dyn BatchKernel>,
        events: Sender<WorkerEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            params,
            kernel,
            events,
            cancel,
        }
    }

    /// Runs dispatches until a verified match, cancellation, the attempt cap,
    /// or too many kernel errors in a row.
    pub fn run(mut self) -> WorkerState {
        if !self.kernel.supports(&self.params.pattern) {
            log::error!(
                "Worker {}: {} kernel cannot match {:?}",
                self.id,
                self.kernel.name(),
                self.params.pattern
            );
            return WorkerState::Faulted;
        }

        let start = Instant::now();
        let lanes = self.kernel.lanes() as u64;
        let mut seeds = SeedGenerator::new(self.params.seed_len);
        let mut meter = ProgressMeter::new(self.params.batch_size);
        let mut errors = 0u32;

        log::info!(
            "Worker {}: {} kernel, {} lanes per dispatch",
            self.id,
            self.kernel.name(),
            lanes
        );

        loop {
            if self.cancel.is_cancelled() {
                return WorkerState::Cancelled;
            }

            if let Some(cap) = self.params.max_attempts {
                if meter.total() >= cap {
                    if meter.pending() > 0 {
                        let _ = self.events.send(WorkerEvent::Progress(meter.take(self.id)));
                    }
                    return WorkerState::Exhausted;
                }
            }

            // The last dispatch before the cap only covers what is left.
            let batch = match self.params.max_attempts {
                Some(cap) => lanes.min(cap - meter.total()),
                None => lanes,
            };

            let Some(template) = seeds.next() else {
                return WorkerState::Exhausted;
            };

            let job = BatchJob {
                base_pubkey: &self.params.base_pubkey,
                program_id: &self.params.program_id,
                pattern: &self.params.pattern,
                template: &template,
                lanes: batch as usize,
            };

            let claimed = match self.kernel.dispatch(&job) {
                Ok(claimed) => {
                    errors = 0;
                    claimed
                }
                Err(e) => {
                    errors += 1;
                    log::warn!("Worker {}: batch error: {}", self.id, e);
                    if errors >= MAX_CONSECUTIVE_ERRORS {
                        log::error!("Worker {}: giving up after {} errors", self.id, errors);
                        return WorkerState::Faulted;
                    }
                    thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            };

            let due = meter.record(self.id, batch);

            if let Some(lane) = claimed {
                if let Some(result) = self.verify(&template, lane, meter.total(), start) {
                    let unreported = due.map_or(meter.pending(), |sample| sample.attempts);
                    let _ = self.events.send(WorkerEvent::Found { result, unreported });
                    return WorkerState::Found;
                }
            }

            if let Some(sample) = due {
                if self.events.send(WorkerEvent::Progress(sample)).is_err() {
                    return WorkerState::Cancelled;
                }
            }
        }
    }

    /// Rebuilds the winning lane on the CPU and checks it really matches.
    fn verify(
        &self,
        template: &Seed,
        lane: u64,
        attempts: u64,
        start: Instant,
    ) -> Option<FoundAddress> {
        let seed = template.with_lane(lane);
        let params = &self.params;
        let address = match derive_address(&params.base_pubkey, seed.as_bytes(), &params.program_id) {
            Ok(address) => address,
            Err(e) => {
                log::warn!("Worker {}: cannot encode lane {}: {}", self.id, lane, e);
                return None;
            }
        };

        if !self.params.pattern.matches(&address.encoded).is_match() {
            log::error!(
                "Worker {}: {} kernel reported lane {} ({}) which does not match",
                self.id,
                self.kernel.name(),
                lane,
                address.encoded
            );
            return None;
        }

        Some(FoundAddress {
            seed,
            address,
            attempts,
            elapsed: start.elapsed(),
            worker_id: self.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TOKEN_2022_PROGRAM_ID;
    use crate::matcher::Position;

    fn make_params(pattern: &str, position: Position, max_attempts: Option<u64>) -> WorkerParams {
        WorkerParams {
            base_pubkey: Pubkey::from_bytes([8u8; 32]),
            program_id: TOKEN_2022_PROGRAM_ID,
            pattern: Pattern::new(pattern, position, true),
            seed_len: 24,
            batch_size: 1_000,
            max_attempts,
        }
    }

    /// A kernel that always claims lane 0, whether or not it matches.
    struct LyingKernel;

    impl BatchKernel for LyingKernel {
        fn name(&self) -> &str {
            "lying"
        }
        fn lanes(&self) -> usize {
            16
        }
        fn supports(&self, _pattern: &Pattern) -> bool {
            true
        }
        fn dispatch(&mut self, _job: &BatchJob<'_>) -> Result<Option<u64>, KernelError> {
            Ok(Some(0))
        }
    }

    struct FailingKernel;

    impl BatchKernel for FailingKernel {
        fn name(&self) -> &str {
            "failing"
        }
        fn lanes(&self) -> usize {
            16
        }
        fn supports(&self, _pattern: &Pattern) -> bool {
            true
        }
        fn dispatch(&mut self, _job: &BatchJob<'_>) -> Result<Option<u64>, KernelError> {
            Err(KernelError::Dispatch("device lost".into()))
        }
    }

    #[test]
    fn test_lane_kernel_agrees_with_reference() {
        let params = make_params("ab", Position::End, None);
        let template = Seed::from_str_checked("referencetemplate0000000").unwrap();
        let job = BatchJob {
            base_pubkey: &params.base_pubkey,
            program_id: &params.program_id,
            pattern: &params.pattern,
            template: &template,
            lanes: 4_096,
        };

        let mut kernel = LaneKernel::new(2, 4_096).unwrap();
        let claimed = kernel.dispatch(&job).unwrap();

        let expected: Vec<u64> = (0..4_096u64)
            .filter(|&lane| {
                let seed = template.with_lane(lane);
                let address =
                    derive_address(&params.base_pubkey, seed.as_bytes(), &params.program_id)
                        .unwrap();
                params.pattern.matches(&address.encoded).is_match()
            })
            .collect();

        match claimed {
            Some(lane) => assert!(expected.contains(&lane)),
            None => assert!(expected.is_empty()),
        }
    }

    #[test]
    fn test_batch_worker_finds_start_pattern() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let kernel = Box::new(LaneKernel::new(2, 1_024).unwrap());
        let worker = BatchWorker::new(
            0,
            make_params("a", Position::Start, Some(1_000_000)),
            kernel,
            tx,
            CancelToken::new(),
        );

        assert_eq!(worker.run(), WorkerState::Found);
        let found = rx
            .try_iter()
            .find_map(|event| match event {
                WorkerEvent::Found { result, .. } => Some(result),
                _ => None,
            })
            .unwrap();
        assert!(found.address.encoded.to_lowercase().starts_with('a'));
    }

    #[test]
    fn test_batch_worker_discards_unverified_claims() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = BatchWorker::new(
            1,
            make_params(&"z".repeat(44), Position::End, Some(64)),
            Box::new(LyingKernel),
            tx,
            CancelToken::new(),
        );

        assert_eq!(worker.run(), WorkerState::Exhausted);
        assert!(rx
            .try_iter()
            .all(|event| !matches!(event, WorkerEvent::Found { .. })));
    }

    #[test]
    fn test_batch_worker_stops_exactly_at_cap() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let kernel = Box::new(LaneKernel::new(2, 1_024).unwrap());
        let worker = BatchWorker::new(
            3,
            make_params(&"z".repeat(44), Position::End, Some(1_000)),
            kernel,
            tx,
            CancelToken::new(),
        );

        assert_eq!(worker.run(), WorkerState::Exhausted);
        let reported: u64 = rx
            .try_iter()
            .filter_map(|event| match event {
                WorkerEvent::Progress(sample) => Some(sample.attempts),
                _ => None,
            })
            .sum();
        assert_eq!(reported, 1_000);
    }

    #[test]
    fn test_lane_kernel_honours_job_lanes() {
        // Only lane 0 is tested, so any claim must be lane 0.
        let params = make_params("1", Position::End, None);
        let mut kernel = LaneKernel::new(2, 4_096).unwrap();
        for n in 0..64 {
            let template = Seed::from_str_checked(&format!("singlelanetemplate{:06}", n)).unwrap();
            let job = BatchJob {
                base_pubkey: &params.base_pubkey,
                program_id: &params.program_id,
                pattern: &params.pattern,
                template: &template,
                lanes: 1,
            };
            if let Some(lane) = kernel.dispatch(&job).unwrap() {
                assert_eq!(lane, 0);
            }
        }
    }

    #[test]
    fn test_batch_worker_faults_after_repeated_errors() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let worker = BatchWorker::new(
            2,
            make_params("a", Position::End, None),
            Box::new(FailingKernel),
            tx,
            CancelToken::new(),
        );
        assert_eq!(worker.run(), WorkerState::Faulted);
    }
}
