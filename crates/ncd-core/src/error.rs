//! Classification error taxonomy.

use thiserror::Error;

use crate::oracle::CompressionError;

/// Why a single worker thread did not finish its partition.
#[derive(Debug, Error)]
pub enum WorkerFault {
    /// The oracle failed on one of the worker's samples.
    #[error(transparent)]
    Compression(#[from] CompressionError),
    /// The worker panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Failures surfaced at the classification-call boundary.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Compression failed on the calling thread (e.g. the query itself).
    #[error("compression failure: {0}")]
    Compression(#[from] CompressionError),
    /// Request rejected before any work was started.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// At least one worker failed; all workers were joined first.
    #[error("{failed_workers} worker(s) failed, first was worker {worker}: {source}")]
    PartialWorkerFailure {
        /// Lowest index of a failed worker.
        worker: usize,
        /// Number of workers that failed.
        failed_workers: usize,
        /// Failure of `worker`.
        #[source]
        source: WorkerFault,
    },
}

impl ClassifyError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameter(reason.into())
    }
}
