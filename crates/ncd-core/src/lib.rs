//! Normalized-compression-distance text classification.
//!
//! A query is compared against every sample of a labeled corpus with
//! [`distance::ncd`], the comparisons are spread over worker threads by
//! [`engine::compute_distances`], and [`knn::vote`] picks the majority label
//! among the `k` closest samples. [`Classifier`] ties the pieces together.

pub mod classifier;
pub mod corpus;
pub mod distance;
pub mod engine;
pub mod error;
pub mod knn;
pub mod loader;
pub mod oracle;
pub mod sample;

pub use classifier::{Classifier, ClassifierOptions, Prediction};
pub use corpus::Corpus;
pub use engine::{Partition, compute_distances, default_workers, partition};
pub use error::{ClassifyError, WorkerFault};
pub use knn::{Vote, vote};
pub use loader::{LoadError, LoaderOptions, count_records, load_corpus};
pub use oracle::{CompressionError, CompressionOracle, ZlibOracle};
pub use sample::{ClassId, DistanceRecord, Sample};
