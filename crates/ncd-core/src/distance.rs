//! Normalized compression distance.
//!
//! ```text
//! NCD(X, Y) = (C(XY) − min(C(X), C(Y))) / max(C(X), C(Y))
//! ```
//!
//! `C(X)` and `C(Y)` come from each sample's memo; `C(XY)` is computed fresh
//! on every call. The result is close to `0.0` for near-identical inputs and
//! close to `1.0` for unrelated ones. Real compressors carry framing overhead,
//! so values slightly above `1.0` are possible and are not clamped.

use crate::oracle::{CompressionError, CompressionOracle};
use crate::sample::Sample;

/// NCD between two samples.
///
/// Neither sample can be empty, so the denominator is never zero.
pub fn ncd(
    x: &Sample,
    y: &Sample,
    oracle: &impl CompressionOracle,
) -> Result<f64, CompressionError> {
    let cx = x.compressed_size(oracle)?;
    let cy = y.compressed_size(oracle)?;
    let cxy = oracle.compressed_size_chain(&[x.bytes(), y.bytes()])?;

    let min_c = cx.min(cy) as f64;
    let max_c = cx.max(cy) as f64;
    Ok((cxy as f64 - min_c) / max_c)
}
