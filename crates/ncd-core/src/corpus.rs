//! In-memory training corpus.

use std::time::Instant;

use tracing::info;

use crate::engine::run_partitioned;
use crate::error::ClassifyError;
use crate::oracle::CompressionOracle;
use crate::sample::{ClassId, Sample};

/// Ordered, read-only collection of training samples.
#[derive(Debug, Default)]
pub struct Corpus {
    samples: Vec<Sample>,
}

impl Corpus {
    #[must_use]
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of classes needed to hold every label (largest label + 1).
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.samples
            .iter()
            .map(Sample::label)
            .max()
            .map_or(0, |label: ClassId| label + 1)
    }

    /// Number of samples carrying each label.
    #[must_use]
    pub fn label_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_count()];
        for sample in &self.samples {
            counts[sample.label()] += 1;
        }
        counts
    }

    /// Fills every sample's compressed-size memo in parallel.
    ///
    /// Samples whose memo is already set are skipped, so running this again
    /// after a failure only compresses what is still missing.
    ///
    /// A memo belongs to the first oracle that fills it. Later calls with a
    /// different oracle keep the old sizes, so a corpus must only ever be
    /// paired with one oracle ([`Classifier`](crate::Classifier) enforces
    /// this by owning both).
    pub fn compress_all<O: CompressionOracle>(
        &self,
        oracle: &O,
        workers: usize,
    ) -> Result<(), ClassifyError> {
        let started = Instant::now();
        let mut done = vec![(); self.samples.len()];
        run_partitioned(&self.samples, &mut done, workers, |part, _| {
            for sample in &self.samples[part.range()] {
                sample.compressed_size(oracle)?;
            }
            Ok(())
        })?;
        info!(
            samples = self.samples.len(),
            workers,
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "compressed corpus"
        );
        Ok(())
    }
}

impl FromIterator<Sample> for Corpus {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
