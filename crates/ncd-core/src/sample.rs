//! Labeled text records.

use std::sync::OnceLock;

use serde::Serialize;

use crate::error::ClassifyError;
use crate::oracle::{CompressionError, CompressionOracle};

/// Zero-based class identifier.
pub type ClassId = usize;

/// Immutable labeled text with a memoized compressed size.
#[derive(Debug)]
pub struct Sample {
    label: ClassId,
    bytes: Box<[u8]>,
    compressed_size: OnceLock<usize>,
}

impl Sample {
    /// Creates a sample; empty text is rejected.
    pub fn new(label: ClassId, bytes: impl Into<Vec<u8>>) -> Result<Self, ClassifyError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ClassifyError::invalid("sample text is empty"));
        }
        Ok(Self {
            label,
            bytes: bytes.into_boxed_slice(),
            compressed_size: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn label(&self) -> ClassId {
        self.label
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Memoized compressed size, computing it with `oracle` on first use.
    ///
    /// A failed computation leaves the memo unset so a later call can retry.
    pub fn compressed_size(
        &self,
        oracle: &impl CompressionOracle,
    ) -> Result<usize, CompressionError> {
        if let Some(size) = self.compressed_size.get() {
            return Ok(*size);
        }
        let size = oracle.compressed_size(&self.bytes)?;
        // Racing initialisers compute the same value; the first one wins.
        Ok(*self.compressed_size.get_or_init(|| size))
    }

    /// Memoized size if it has been computed.
    #[must_use]
    pub fn cached_compressed_size(&self) -> Option<usize> {
        self.compressed_size.get().copied()
    }
}

/// Distance from a query to one training sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DistanceRecord {
    pub distance: f64,
    pub label: ClassId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ZlibOracle;

    #[test]
    fn empty_text_is_rejected() {
        let err = Sample::new(0, Vec::new()).expect_err("empty");
        assert!(matches!(err, ClassifyError::InvalidParameter(_)));
    }

    #[test]
    fn size_is_memoized_after_first_use() {
        let oracle = ZlibOracle::default();
        let sample = Sample::new(2, "Reuters - Soaring crude prices").expect("sample");
        assert_eq!(sample.cached_compressed_size(), None);

        let size = sample.compressed_size(&oracle).expect("size");
        assert_eq!(sample.cached_compressed_size(), Some(size));
        assert_eq!(sample.compressed_size(&oracle).expect("again"), size);
        assert_eq!(sample.label(), 2);
    }
}
