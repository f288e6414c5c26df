use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ncd_core::{
    Classifier, ClassifierOptions, ClassifyError, CompressionError, CompressionOracle, Corpus,
    LoaderOptions, Sample, WorkerFault, ZlibOracle, compute_distances, load_corpus,
};

/// Counts single and chained compressions on top of the zlib oracle.
#[derive(Default)]
struct CountingOracle {
    inner: ZlibOracle,
    singles: AtomicUsize,
    chains: AtomicUsize,
}

impl CountingOracle {
    fn calls(&self) -> (usize, usize) {
        (
            self.singles.load(Ordering::SeqCst),
            self.chains.load(Ordering::SeqCst),
        )
    }
}

impl CompressionOracle for CountingOracle {
    fn compressed_size(&self, data: &[u8]) -> Result<usize, CompressionError> {
        self.singles.fetch_add(1, Ordering::SeqCst);
        self.inner.compressed_size(data)
    }

    fn compressed_size_chain(&self, parts: &[&[u8]]) -> Result<usize, CompressionError> {
        self.chains.fetch_add(1, Ordering::SeqCst);
        self.inner.compressed_size(&parts.concat())
    }
}

/// Fails chained compressions touching a marker while armed.
struct PoisonOracle {
    inner: ZlibOracle,
    armed: AtomicBool,
    panic_instead: bool,
}

impl PoisonOracle {
    fn new(panic_instead: bool) -> Self {
        Self {
            inner: ZlibOracle::default(),
            armed: AtomicBool::new(true),
            panic_instead,
        }
    }
}

const MARKER: &[u8] = b"POISON";

impl CompressionOracle for PoisonOracle {
    fn compressed_size(&self, data: &[u8]) -> Result<usize, CompressionError> {
        self.inner.compressed_size(data)
    }

    fn compressed_size_chain(&self, parts: &[&[u8]]) -> Result<usize, CompressionError> {
        let hit = parts
            .iter()
            .any(|part| part.windows(MARKER.len()).any(|w| w == MARKER));
        if hit && self.armed.load(Ordering::SeqCst) {
            if self.panic_instead {
                panic!("oracle exploded");
            }
            return Err(CompressionError::Codec(std::io::Error::other("poisoned input")));
        }
        self.inner.compressed_size(&parts.concat())
    }
}

const FOUR_CLASS_CSV: &str = "\
Class Index,Text
1,apple banana cherry apple banana cherry apple banana cherry
1,banana cherry apple banana cherry apple banana cherry apple
2,rocket launch orbit rocket launch orbit rocket launch orbit
2,orbit rocket launch orbit rocket launch orbit rocket launch
3,violin cello piano violin cello piano violin cello piano
3,cello piano violin cello piano violin cello piano violin
4,python rust haskell python rust haskell python rust haskell
4,rust haskell python rust haskell python rust haskell python
";

const ROCKET_QUERY: &[u8] = b"rocket launch orbit rocket launch orbit rocket launch";

fn four_class_corpus() -> Corpus {
    load_corpus(Cursor::new(FOUR_CLASS_CSV), &LoaderOptions::default()).expect("corpus")
}

fn options(workers: usize) -> ClassifierOptions {
    ClassifierOptions {
        workers: Some(workers),
        class_count: None,
    }
}

#[test]
fn near_duplicate_query_is_assigned_its_class() {
    let classifier = Classifier::new(four_class_corpus(), ZlibOracle::default(), options(3))
        .expect("classifier");
    assert_eq!(classifier.class_count(), 4);

    let prediction = classifier.classify(ROCKET_QUERY, 3).expect("classify");
    assert_eq!(prediction.label, 1);
    assert_eq!(prediction.histogram.len(), 4);
    assert_eq!(prediction.histogram[1], 2);
    assert_eq!(prediction.histogram.iter().sum::<usize>(), 3);
    assert!(prediction.nearest[..2].iter().all(|r| r.label == 1));
    assert!(prediction.nearest.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn repeated_classification_is_identical() {
    let classifier = Classifier::new(four_class_corpus(), ZlibOracle::default(), options(2))
        .expect("classifier");
    let first = classifier.classify(ROCKET_QUERY, 5).expect("first");
    let second = classifier.classify(ROCKET_QUERY, 5).expect("second");
    assert_eq!(first, second);
}

#[test]
fn worker_count_does_not_change_the_result() {
    let reference = Classifier::new(four_class_corpus(), ZlibOracle::default(), options(1))
        .expect("classifier")
        .classify(ROCKET_QUERY, 4)
        .expect("classify");
    for workers in [2, 3, 7, 8, 9, 32] {
        let prediction = Classifier::new(
            four_class_corpus(),
            ZlibOracle::default(),
            options(workers),
        )
        .expect("classifier")
        .classify(ROCKET_QUERY, 4)
        .expect("classify");
        assert_eq!(prediction, reference, "workers={workers}");
    }
}

#[test]
fn distances_cover_every_sample_in_corpus_order() {
    let corpus = four_class_corpus();
    let query = Sample::new(0, ROCKET_QUERY).expect("query");
    let distances =
        compute_distances(&query, &corpus, &ZlibOracle::default(), 3).expect("distances");
    assert_eq!(distances.len(), corpus.len());
    for (record, sample) in distances.iter().zip(corpus.samples()) {
        assert_eq!(record.label, sample.label());
        assert!((0.0..=1.2).contains(&record.distance));
    }
}

#[test]
fn out_of_range_k_is_rejected_before_any_work() {
    let classifier = Classifier::new(four_class_corpus(), CountingOracle::default(), options(4))
        .expect("classifier");
    for k in [0, 9] {
        let err = classifier.classify(ROCKET_QUERY, k).expect_err("bad k");
        assert!(matches!(err, ClassifyError::InvalidParameter(_)));
    }
    let err = classifier.classify(b"", 3).expect_err("empty input");
    assert!(matches!(err, ClassifyError::InvalidParameter(_)));
    assert_eq!(classifier.oracle().calls(), (0, 0));
}

#[test]
fn construction_rejects_unusable_setups() {
    let empty = Classifier::new(Corpus::default(), ZlibOracle::default(), options(2));
    assert!(matches!(empty, Err(ClassifyError::InvalidParameter(_))));

    let no_workers = Classifier::new(four_class_corpus(), ZlibOracle::default(), options(0));
    assert!(matches!(no_workers, Err(ClassifyError::InvalidParameter(_))));

    let narrow = Classifier::new(
        four_class_corpus(),
        ZlibOracle::default(),
        ClassifierOptions {
            workers: Some(2),
            class_count: Some(3),
        },
    );
    assert!(matches!(narrow, Err(ClassifyError::InvalidParameter(_))));
}

#[test]
fn explicit_class_count_widens_histogram() {
    let classifier = Classifier::new(
        four_class_corpus(),
        ZlibOracle::default(),
        ClassifierOptions {
            workers: Some(2),
            class_count: Some(6),
        },
    )
    .expect("classifier");
    let prediction = classifier.classify(ROCKET_QUERY, 3).expect("classify");
    assert_eq!(prediction.histogram.len(), 6);
    assert_eq!(prediction.votes().nth(1), Some((1, 2)));
}

#[test]
fn corpus_sizes_are_compressed_once() {
    let classifier = Classifier::new(four_class_corpus(), CountingOracle::default(), options(3))
        .expect("classifier");
    classifier.warm_up().expect("warm up");
    assert_eq!(classifier.oracle().calls(), (8, 0));

    classifier.warm_up().expect("second warm up");
    assert_eq!(classifier.oracle().calls(), (8, 0));

    classifier.classify(ROCKET_QUERY, 3).expect("first");
    classifier.classify(ROCKET_QUERY, 3).expect("second");
    // One fresh query sample per request, one concatenation per corpus entry.
    assert_eq!(classifier.oracle().calls(), (10, 16));
}

#[test]
fn query_compression_failure_is_surfaced() {
    let oracle = ZlibOracle::new(9, 64).expect("oracle");
    let classifier = Classifier::new(four_class_corpus(), oracle, options(2)).expect("classifier");
    let long_query = vec![b'x'; 65];
    let err = classifier.classify(&long_query, 3).expect_err("too large");
    assert!(matches!(
        err,
        ClassifyError::Compression(CompressionError::InputTooLarge { len: 65, max: 64 })
    ));
}

fn poisoned_corpus() -> Corpus {
    (0..8)
        .map(|i| {
            let text = if i == 5 {
                "POISON sample text".to_owned()
            } else {
                format!("ordinary sample number {i}")
            };
            Sample::new(i % 2, text).expect("sample")
        })
        .collect()
}

#[test]
fn worker_failure_aborts_and_keeps_memos() {
    let classifier = Classifier::new(poisoned_corpus(), PoisonOracle::new(false), options(4))
        .expect("classifier");
    let err = classifier.classify(b"ordinary query", 3).expect_err("poisoned");
    match err {
        ClassifyError::PartialWorkerFailure {
            worker,
            failed_workers,
            source,
        } => {
            assert_eq!(worker, 2);
            assert_eq!(failed_workers, 1);
            assert!(matches!(source, WorkerFault::Compression(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        classifier
            .corpus()
            .samples()
            .iter()
            .all(|s| s.cached_compressed_size().is_some())
    );

    classifier.oracle().armed.store(false, Ordering::SeqCst);
    let prediction = classifier.classify(b"ordinary query", 3).expect("retry");
    assert_eq!(prediction.histogram.iter().sum::<usize>(), 3);
}

#[test]
fn panicking_worker_is_reported_not_propagated() {
    let classifier = Classifier::new(poisoned_corpus(), PoisonOracle::new(true), options(4))
        .expect("classifier");
    let err = classifier.classify(b"ordinary query", 3).expect_err("panicked");
    match err {
        ClassifyError::PartialWorkerFailure { worker, source, .. } => {
            assert_eq!(worker, 2);
            match source {
                WorkerFault::Panicked(message) => assert!(message.contains("oracle exploded")),
                other => panic!("unexpected fault: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
