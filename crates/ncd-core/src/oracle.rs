//! Compressed-size oracle.
//!
//! Every distance in this crate is derived from one question: how many bytes
//! does a buffer occupy after compression? The [`CompressionOracle`] trait
//! abstracts that question so the engine never depends on a concrete codec,
//! and [`ZlibOracle`] answers it with a zlib stream at a fixed level.

use std::io::{self, Write};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use thiserror::Error;

/// Largest input accepted by [`ZlibOracle::default`].
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;

/// Highest zlib effort level.
pub const MAX_LEVEL: u32 = 9;

/// Compression-oracle failures.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Codec reported an error while encoding.
    #[error("codec failure: {0}")]
    Codec(#[from] io::Error),
    /// Input exceeds the oracle's scratch capacity.
    #[error("input of {len} bytes exceeds oracle capacity of {max} bytes")]
    InputTooLarge {
        /// Offending input length.
        len: usize,
        /// Configured capacity.
        max: usize,
    },
    /// Effort level outside what the codec supports.
    #[error("compression level {0} is outside 0..=9")]
    InvalidLevel(u32),
}

/// Compressed-size capability shared by every worker thread.
pub trait CompressionOracle: Send + Sync {
    /// Compressed size of `data` in bytes.
    fn compressed_size(&self, data: &[u8]) -> Result<usize, CompressionError>;

    /// Compressed size of the byte-level concatenation of `parts`.
    ///
    /// The default joins the parts into a buffer sized exactly to their sum.
    fn compressed_size_chain(&self, parts: &[&[u8]]) -> Result<usize, CompressionError> {
        let total = parts.iter().map(|part| part.len()).sum();
        let mut joined = Vec::with_capacity(total);
        for part in parts {
            joined.extend_from_slice(part);
        }
        self.compressed_size(&joined)
    }
}

/// zlib-backed oracle with one effort level for its whole lifetime.
#[derive(Clone, Debug)]
pub struct ZlibOracle {
    level: Compression,
    max_input_bytes: usize,
}

impl ZlibOracle {
    /// Creates an oracle at `level` accepting inputs up to `max_input_bytes`.
    pub fn new(level: u32, max_input_bytes: usize) -> Result<Self, CompressionError> {
        if level > MAX_LEVEL {
            return Err(CompressionError::InvalidLevel(level));
        }
        Ok(Self {
            level: Compression::new(level),
            max_input_bytes,
        })
    }

    /// Effort level used for every call.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level.level()
    }

    /// Scratch capacity in bytes.
    #[must_use]
    pub fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }
}

impl Default for ZlibOracle {
    fn default() -> Self {
        Self {
            level: Compression::best(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl CompressionOracle for ZlibOracle {
    fn compressed_size(&self, data: &[u8]) -> Result<usize, CompressionError> {
        if data.len() > self.max_input_bytes {
            return Err(CompressionError::InputTooLarge {
                len: data.len(),
                max: self.max_input_bytes,
            });
        }
        let mut enc = ZlibEncoder::new(ByteCounter::default(), self.level);
        enc.write_all(data)?;
        Ok(enc.finish()?.written)
    }
}

/// Sink that keeps only the number of bytes written to it.
#[derive(Debug, Default)]
struct ByteCounter {
    written: usize,
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
