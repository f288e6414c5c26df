//! Line-oriented corpus reader.
//!
//! Each record is `<ordinal><separator><text>` where the ordinal is a
//! one-based class number. The text is kept byte-for-byte, including any
//! further separators it contains.

use std::io::{self, BufRead};

use thiserror::Error;
use tracing::debug;

use crate::corpus::Corpus;
use crate::sample::{ClassId, Sample};

/// Corpus reading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying read failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A record could not be parsed.
    #[error("line {line}: {reason}")]
    Malformed {
        /// 1-based physical line number.
        line: usize,
        reason: String,
    },
}

/// Reader settings.
#[derive(Clone, Copy, Debug)]
pub struct LoaderOptions {
    /// Skip the first line.
    pub skip_header: bool,
    /// Byte between ordinal and text.
    pub separator: u8,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            skip_header: true,
            separator: b',',
        }
    }
}

/// Reads every record of `reader` into a corpus.
pub fn load_corpus(reader: impl BufRead, options: &LoaderOptions) -> Result<Corpus, LoadError> {
    let mut samples = Vec::new();
    for_each_record(reader, options.skip_header, |line_no, line| {
        samples.push(parse_record(line_no, line, options.separator)?);
        Ok(())
    })?;
    debug!(samples = samples.len(), "parsed corpus records");
    Ok(Corpus::new(samples))
}

/// Counts data records without parsing them.
pub fn count_records(reader: impl BufRead, skip_header: bool) -> Result<usize, LoadError> {
    let mut count = 0;
    for_each_record(reader, skip_header, |_, _| {
        count += 1;
        Ok(())
    })?;
    Ok(count)
}

/// Parses one record into a sample.
pub fn parse_record(line_no: usize, line: &[u8], separator: u8) -> Result<Sample, LoadError> {
    let malformed = |reason: &str| LoadError::Malformed {
        line: line_no,
        reason: reason.to_owned(),
    };

    let digits = line.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(malformed("record does not start with a class number"));
    }
    let ordinal = line[..digits]
        .iter()
        .try_fold(0_usize, |acc, b| {
            acc.checked_mul(10)?.checked_add(usize::from(b - b'0'))
        })
        .ok_or_else(|| malformed("class number overflows"))?;
    let label: ClassId = ordinal
        .checked_sub(1)
        .ok_or_else(|| malformed("class numbers are one-based"))?;

    match line.get(digits) {
        Some(b) if *b == separator => {}
        _ => return Err(malformed("missing separator after class number")),
    }
    let text = &line[digits + 1..];
    if text.is_empty() {
        return Err(malformed("record has no text"));
    }
    Sample::new(label, text).map_err(|err| malformed(&err.to_string()))
}

/// Calls `f` with each non-blank data line, minus its line terminator.
fn for_each_record(
    mut reader: impl BufRead,
    skip_header: bool,
    mut f: impl FnMut(usize, &[u8]) -> Result<(), LoadError>,
) -> Result<(), LoadError> {
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        line_no += 1;
        if skip_header && line_no == 1 {
            continue;
        }
        let mut line = buf.as_slice();
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped;
        }
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        if line.is_empty() {
            continue;
        }
        f(line_no, line)?;
    }
}
