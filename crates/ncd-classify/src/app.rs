//! Front-end orchestration: corpus loading, one-shot classification, the
//! interactive loop and labeled evaluation.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

use ncd_core::{
    ClassId, Classifier, ClassifyError, CompressionError, CompressionOracle, Corpus, LoadError,
    LoaderOptions, Prediction, ZlibOracle, count_records, load_corpus,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ClassifierConfig, ConfigError};

/// App startup/runtime errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Config validation failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Corpus could not be read.
    #[error("failed to load corpus {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: LoadError,
    },
    /// Oracle setup failure.
    #[error("compressor setup error: {0}")]
    Compressor(#[from] CompressionError),
    /// Classification failure.
    #[error("classification failed: {0}")]
    Classify(#[from] ClassifyError),
    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON rendering failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads a labeled corpus file, logging its size and parse time.
pub fn read_corpus(path: &Path, options: &LoaderOptions) -> Result<Corpus, AppError> {
    let load_err = |source: LoadError| AppError::Load {
        path: path.display().to_string(),
        source,
    };
    let open = || File::open(path).map(BufReader::new).map_err(|e| load_err(e.into()));

    let records = count_records(open()?, options.skip_header).map_err(load_err)?;
    info!(records, path = %path.display(), "counted corpus records");

    let started = Instant::now();
    let corpus = load_corpus(open()?, options).map_err(load_err)?;
    info!(
        samples = corpus.len(),
        classes = corpus.class_count(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
        "parsed corpus"
    );
    for (label, samples) in corpus.label_counts().into_iter().enumerate() {
        debug!(label, samples, "class distribution");
    }
    Ok(corpus)
}

/// Loads the training corpus and pre-compresses it.
pub fn load_classifier(cfg: &ClassifierConfig) -> Result<Classifier<ZlibOracle>, AppError> {
    let corpus = read_corpus(&cfg.corpus.path, &cfg.corpus.loader_options()?)?;
    let classifier = Classifier::new(corpus, cfg.oracle()?, cfg.classifier_options())?;
    info!(workers = classifier.workers(), "worker threads configured");

    let elapsed = classifier.warm_up()?;
    info!(
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        "training data ready"
    );
    Ok(classifier)
}

/// Per-class vote line of a report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassVotes {
    pub label: ClassId,
    pub name: String,
    pub votes: usize,
}

/// Prediction with display names attached.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionReport {
    pub label: ClassId,
    pub name: String,
    pub k: usize,
    pub histogram: Vec<ClassVotes>,
}

impl PredictionReport {
    #[must_use]
    pub fn new(cfg: &ClassifierConfig, prediction: &Prediction) -> Self {
        Self {
            label: prediction.label,
            name: cfg.class_name(prediction.label),
            k: prediction.k,
            histogram: prediction
                .votes()
                .map(|(label, votes)| ClassVotes {
                    label,
                    name: cfg.class_name(label),
                    votes,
                })
                .collect(),
        }
    }

    /// Human-readable multi-line rendering.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("predicted: {} (k={})\n", self.name, self.k);
        for class in &self.histogram {
            out.push_str(&format!("    {}: {}\n", class.name, class.votes));
        }
        out
    }
}

/// Classifies one text and writes the report to `out`.
pub fn classify_once<O: CompressionOracle>(
    classifier: &Classifier<O>,
    cfg: &ClassifierConfig,
    text: &[u8],
    json: bool,
    out: &mut impl Write,
) -> Result<PredictionReport, AppError> {
    let prediction = classifier.classify(text, cfg.engine.k)?;
    let report = PredictionReport::new(cfg, &prediction);
    if json {
        serde_json::to_writer(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        out.write_all(report.to_text().as_bytes())?;
    }
    Ok(report)
}

/// Classifies one query per input line until EOF or `quit`.
///
/// Blank lines are skipped and a failed classification is reported without
/// ending the loop. With `prompt` set, a `> ` prompt is written to stderr so
/// `out` only ever carries predictions. Returns the number of successful
/// classifications.
pub fn run_interactive<O: CompressionOracle>(
    classifier: &Classifier<O>,
    cfg: &ClassifierConfig,
    mut input: impl BufRead,
    out: &mut impl Write,
    prompt: bool,
) -> Result<usize, AppError> {
    let mut classified = 0;
    let mut line = Vec::new();
    loop {
        if prompt {
            let mut stderr = std::io::stderr().lock();
            write!(stderr, "> ")?;
            stderr.flush()?;
        }
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let query = line.trim_ascii();
        if query.is_empty() {
            continue;
        }
        if query == b"quit" || query == b"exit" {
            break;
        }
        match classify_once(classifier, cfg, query, false, out) {
            Ok(_) => classified += 1,
            Err(AppError::Classify(err)) => {
                warn!(error = %err, "query rejected");
                writeln!(out, "error: {err}")?;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(classified)
}

/// Accuracy summary over a labeled test corpus.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub correct: usize,
    /// `confusion[actual][predicted]`.
    pub confusion: Vec<Vec<usize>>,
}

impl EvaluationReport {
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Accuracy line followed by per-class recall.
    #[must_use]
    pub fn to_text(&self, cfg: &ClassifierConfig) -> String {
        let mut out = format!(
            "accuracy: {:.4} ({}/{})\n",
            self.accuracy(),
            self.correct,
            self.total
        );
        for (label, row) in self.confusion.iter().enumerate() {
            let support: usize = row.iter().sum();
            if support == 0 {
                continue;
            }
            out.push_str(&format!(
                "    {}: {}/{} correct\n",
                cfg.class_name(label),
                row[label],
                support
            ));
        }
        out
    }
}

/// Classifies every sample of `test` and tallies the outcome.
pub fn evaluate<O: CompressionOracle>(
    classifier: &Classifier<O>,
    test: &Corpus,
    k: usize,
) -> Result<EvaluationReport, AppError> {
    let width = classifier.class_count().max(test.class_count());
    let mut confusion = vec![vec![0; width]; width];
    let mut correct = 0;
    let started = Instant::now();
    for sample in test.samples() {
        let prediction = classifier.classify(sample.bytes(), k)?;
        confusion[sample.label()][prediction.label] += 1;
        if prediction.label == sample.label() {
            correct += 1;
        }
    }
    info!(
        samples = test.len(),
        correct,
        elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
        "evaluation finished"
    );
    Ok(EvaluationReport {
        total: test.len(),
        correct,
        confusion,
    })
}
