//! CPU-based worker for vanity address search.

use std::time::Instant;

use crossbeam_channel::Sender;

use crate::crypto::{
    derive_with_seed, encode_address, DerivedAddress, Pubkey, Seed, SeedGenerator,
    MAX_ADDRESS_LEN,
};
use crate::matcher::Pattern;
use crate::request::SearchRequest;

use super::event::{CancelToken, FoundAddress, ProgressMeter, WorkerEvent, WorkerState};

/// Parameters every worker of one search shares.
#[derive(Debug, Clone)]
pub struct WorkerParams {
    pub base_pubkey: Pubkey,
    pub program_id: Pubkey,
    pub pattern: Pattern,
    pub seed_len: usize,
    pub batch_size: u64,
    pub max_attempts: Option<u64>,
}

impl From<&SearchRequest> for WorkerParams {
    fn from(request: &SearchRequest) -> Self {
        Self {
            base_pubkey: request.base_pubkey,
            program_id: request.program_id,
            pattern: request.compiled_pattern(),
            seed_len: request.seed_len,
            batch_size: request.batch_size,
            max_attempts: request.max_attempts,
        }
    }
}

/// A CPU worker that draws seeds and tests the derived addresses.
pub struct CpuWorker {
    /// Worker ID
    id: usize,
    /// Shared search parameters
    params: WorkerParams,
    /// Channel to the pool
    events: Sender<WorkerEvent>,
    /// Shared stop flag
    cancel: CancelToken,
    state: WorkerState,
}

impl CpuWorker {
    /// Creates a new CPU worker.
    pub fn new(
        id: usize,
        params: WorkerParams,
        events: Sender<WorkerEvent>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            params,
            events,
            cancel,
            state: WorkerState::Idle,
        }
    }

    /// Runs the worker loop.
    ///
    /// Tests one candidate per iteration until:
    /// - A match is found (sends the result through the channel)
    /// - The cancel token is set, or the pool hangs up
    /// - The attempt cap, if any, is reached
    pub fn run(mut self) -> WorkerState {
        self.state = WorkerState::Running;

        let start = Instant::now();
        let mut seeds = SeedGenerator::new(self.params.seed_len);
        let mut meter = ProgressMeter::new(self.params.batch_size);
        let mut buf = [0u8; MAX_ADDRESS_LEN];

        loop {
            if self.cancel.is_cancelled() {
                self.state = WorkerState::Cancelled;
                break;
            }

            if let Some(cap) = self.params.max_attempts {
                if meter.total() >= cap {
                    if meter.pending() > 0 {
                        let _ = self.events.send(WorkerEvent::Progress(meter.take(self.id)));
                    }
                    self.state = WorkerState::Exhausted;
                    break;
                }
            }

            let Some(seed) = seeds.next() else {
                self.state = WorkerState::Exhausted;
                break;
            };

            let pubkey =
                derive_with_seed(&self.params.base_pubkey, seed.as_bytes(), &self.params.program_id);
            let len = match encode_address(&pubkey, &mut buf) {
                Ok(len) => len,
                Err(e) => {
                    log::warn!("Worker {}: skipping seed {}: {}", self.id, seed, e);
                    continue;
                }
            };

            let matched = self.params.pattern.matches_bytes(&buf[..len]);
            let due = meter.record(self.id, 1);

            if matched {
                let unreported = due.map_or(meter.pending(), |sample| sample.attempts);
                self.state = self.report_found(seed, pubkey, &buf[..len], &meter, unreported, start);
                break;
            }

            if let Some(sample) = due {
                if self.events.send(WorkerEvent::Progress(sample)).is_err() {
                    // Pool is gone.
                    self.state = WorkerState::Cancelled;
                    break;
                }
            }
        }

        log::debug!(
            "Worker {} stopped as {:?} after {} attempts",
            self.id,
            self.state,
            meter.total()
        );
        self.state
    }

    fn report_found(
        &self,
        seed: Seed,
        pubkey: Pubkey,
        encoded: &[u8],
        meter: &ProgressMeter,
        unreported: u64,
        start: Instant,
    ) -> WorkerState {
        let result = FoundAddress {
            seed,
            address: DerivedAddress {
                pubkey,
                encoded: String::from_utf8_lossy(encoded).into_owned(),
            },
            attempts: meter.total(),
            elapsed: start.elapsed(),
            worker_id: self.id,
        };
        log::debug!("Worker {} found {}", self.id, result.address.encoded);

        // Ignore a closed channel: another worker already won.
        let _ = self.events.send(WorkerEvent::Found {
            result,
            unreported,
        });
        WorkerState::Found
    }

    /// Returns the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }
}
