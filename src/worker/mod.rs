//! Worker pool for parallel vanity address search.
//!
//! This module provides:
//! - Multi-threaded CPU workers
//! - Batch workers driving a data-parallel kernel (CPU lanes or OpenCL)
//! - Event-based progress aggregation and first-match-wins coordination

mod cpu;
mod event;
mod kernel;
mod pool;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::{CpuWorker, WorkerParams};
pub use event::{
    CancelToken, ExitGuard, FoundAddress, ProgressMeter, ProgressSample, WorkerEvent,
    WorkerState, PROGRESS_PERIOD,
};
pub use kernel::{BatchJob, BatchKernel, BatchWorker, KernelError, LaneKernel};
pub use pool::{
    search, search_with_progress, SearchError, SearchOutcome, Throughput, WorkerPool,
    DEFAULT_REPORT_INTERVAL,
};
