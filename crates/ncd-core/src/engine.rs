//! Parallel distance engine.
//!
//! The corpus is cut into one contiguous [`Partition`] per worker. Each worker
//! runs on its own scoped thread and owns the matching slice of a pre-sized
//! output buffer, so the compute phase needs no locks. The caller blocks until
//! every worker has been joined before the buffer is read.

use std::any::Any;
use std::ops::Range;
use std::thread;

use tracing::debug;

use crate::corpus::Corpus;
use crate::distance::ncd;
use crate::error::{ClassifyError, WorkerFault};
use crate::oracle::{CompressionError, CompressionOracle};
use crate::sample::{DistanceRecord, Sample};

/// Contiguous index range of the corpus owned by one worker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Partition {
    /// Worker index.
    pub worker: usize,
    /// First corpus index.
    pub start: usize,
    /// Number of entries.
    pub len: usize,
}

impl Partition {
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Worker count matching the detected hardware parallelism.
#[must_use]
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

/// Splits `n` entries across `workers`.
///
/// Every worker gets `n / workers` entries and the last one also absorbs the
/// remainder. Exactly `workers` partitions are returned, some possibly empty.
pub fn partition(n: usize, workers: usize) -> Result<Vec<Partition>, ClassifyError> {
    if workers == 0 {
        return Err(ClassifyError::invalid("worker count must be at least 1"));
    }
    let chunk = n / workers;
    let remainder = n - workers * chunk;
    Ok((0..workers)
        .map(|worker| Partition {
            worker,
            start: worker * chunk,
            len: if worker + 1 == workers {
                chunk + remainder
            } else {
                chunk
            },
        })
        .collect())
}

/// Distances from `query` to every corpus sample, in corpus order.
///
/// Fails with [`ClassifyError::PartialWorkerFailure`] if any worker fails; no
/// partial result is ever returned.
///
/// Sample sizes already memoized are reused whatever oracle filled them, so
/// `oracle` must be the one the corpus was compressed with.
pub fn compute_distances<O: CompressionOracle>(
    query: &Sample,
    corpus: &Corpus,
    oracle: &O,
    workers: usize,
) -> Result<Vec<DistanceRecord>, ClassifyError> {
    let samples = corpus.samples();
    let mut out = vec![DistanceRecord::default(); samples.len()];
    run_partitioned(samples, &mut out, workers, |part, slice| {
        for (record, sample) in slice.iter_mut().zip(&samples[part.range()]) {
            *record = DistanceRecord {
                distance: ncd(query, sample, oracle)?,
                label: sample.label(),
            };
        }
        Ok(())
    })?;
    Ok(out)
}

/// Runs `work` once per non-empty partition of `samples`, each on its own
/// thread with exclusive access to its slice of `out`.
///
/// All workers are joined before the first failure (lowest worker index) is
/// reported.
pub(crate) fn run_partitioned<T, F>(
    samples: &[Sample],
    out: &mut [T],
    workers: usize,
    work: F,
) -> Result<(), ClassifyError>
where
    T: Send,
    F: Fn(Partition, &mut [T]) -> Result<(), CompressionError> + Sync,
{
    debug_assert_eq!(samples.len(), out.len());
    let parts = partition(samples.len(), workers)?;

    let mut rest = out;
    let mut slices = Vec::with_capacity(parts.len());
    for part in &parts {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(part.len);
        slices.push(head);
        rest = tail;
    }

    let work = &work;
    let outcomes: Vec<(usize, Result<(), WorkerFault>)> = thread::scope(|scope| {
        let handles: Vec<_> = parts
            .iter()
            .copied()
            .zip(slices)
            .filter(|(part, _)| part.len > 0)
            .map(|(part, slice)| {
                debug!(worker = part.worker, start = part.start, len = part.len, "spawning worker");
                (part.worker, scope.spawn(move || work(part, slice)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(worker, handle)| {
                let outcome = match handle.join() {
                    Ok(result) => result.map_err(WorkerFault::from),
                    Err(payload) => Err(WorkerFault::Panicked(panic_message(payload.as_ref()))),
                };
                (worker, outcome)
            })
            .collect()
    });

    let mut failures = outcomes
        .into_iter()
        .filter_map(|(worker, outcome)| outcome.err().map(|fault| (worker, fault)));
    let Some((worker, source)) = failures.next() else {
        return Ok(());
    };
    Err(ClassifyError::PartialWorkerFailure {
        worker,
        failed_workers: 1 + failures.count(),
        source,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
