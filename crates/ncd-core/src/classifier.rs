//! Classification entry point.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::corpus::Corpus;
use crate::engine::{compute_distances, default_workers};
use crate::error::ClassifyError;
use crate::knn::{Vote, vote};
use crate::oracle::CompressionOracle;
use crate::sample::{ClassId, DistanceRecord, Sample};

/// Classifier construction options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassifierOptions {
    /// Worker threads per request; hardware parallelism when unset.
    pub workers: Option<usize>,
    /// Histogram width; derived from the corpus labels when unset.
    pub class_count: Option<usize>,
}

/// Result of one classification request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted zero-based class id.
    pub label: ClassId,
    /// Votes per class among the `k` nearest neighbours.
    pub histogram: Vec<usize>,
    /// The `k` nearest neighbours, closest first.
    pub nearest: Vec<DistanceRecord>,
    /// Neighbours consulted.
    pub k: usize,
}

impl Prediction {
    /// `(label, count)` pairs in class-id order.
    pub fn votes(&self) -> impl Iterator<Item = (ClassId, usize)> + '_ {
        self.histogram.iter().copied().enumerate()
    }
}

impl From<(Vote, usize)> for Prediction {
    fn from((vote, k): (Vote, usize)) -> Self {
        Self {
            label: vote.label,
            histogram: vote.histogram,
            nearest: vote.nearest,
            k,
        }
    }
}

/// NCD k-nearest-neighbour classifier over a fixed corpus.
///
/// Each call to [`Classifier::classify`] is independent; the only state
/// carried between calls is the per-sample compressed-size memo, which never
/// changes once set.
#[derive(Debug)]
pub struct Classifier<O> {
    corpus: Corpus,
    oracle: O,
    workers: usize,
    class_count: usize,
}

impl<O: CompressionOracle> Classifier<O> {
    /// Builds a classifier; nothing is compressed yet.
    pub fn new(
        corpus: Corpus,
        oracle: O,
        options: ClassifierOptions,
    ) -> Result<Self, ClassifyError> {
        if corpus.is_empty() {
            return Err(ClassifyError::invalid("corpus is empty"));
        }
        let workers = options.workers.unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(ClassifyError::invalid("worker count must be at least 1"));
        }
        let needed = corpus.class_count();
        let class_count = options.class_count.unwrap_or(needed);
        if class_count < needed {
            return Err(ClassifyError::invalid(format!(
                "class count {class_count} is smaller than the {needed} classes in the corpus"
            )));
        }
        Ok(Self {
            corpus,
            oracle,
            workers,
            class_count,
        })
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Compresses every corpus sample up front and returns the time taken.
    pub fn warm_up(&self) -> Result<Duration, ClassifyError> {
        let started = Instant::now();
        self.corpus.compress_all(&self.oracle, self.workers)?;
        Ok(started.elapsed())
    }

    /// Predicts the class of `input` from its `k` nearest corpus samples.
    ///
    /// Parameters are checked before anything is compressed or spawned.
    pub fn classify(&self, input: &[u8], k: usize) -> Result<Prediction, ClassifyError> {
        let n = self.corpus.len();
        if input.is_empty() {
            return Err(ClassifyError::invalid("input text is empty"));
        }
        if k == 0 || k > n {
            return Err(ClassifyError::invalid(format!(
                "k must be in 1..={n}, got {k}"
            )));
        }

        let started = Instant::now();
        // Label is irrelevant for the query; only its bytes and memo are used.
        let query = Sample::new(0, input)?;
        query.compressed_size(&self.oracle)?;

        let distances = compute_distances(&query, &self.corpus, &self.oracle, self.workers)?;
        let prediction = Prediction::from((vote(distances, k, self.class_count)?, k));

        info!(
            label = prediction.label,
            k,
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "classified sample"
        );
        for (label, count) in prediction.votes() {
            debug!(label, count, "votes");
        }
        Ok(prediction)
    }
}
