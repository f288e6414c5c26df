//! k-nearest-neighbour majority vote.

use serde::Serialize;

use crate::error::ClassifyError;
use crate::sample::{ClassId, DistanceRecord};

/// Outcome of a vote over the `k` nearest records.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Vote {
    /// Winning class.
    pub label: ClassId,
    /// Votes per class, indexed by class id.
    pub histogram: Vec<usize>,
    /// The `k` nearest records, closest first.
    pub nearest: Vec<DistanceRecord>,
}

impl Vote {
    /// `(label, count)` pairs in class-id order.
    pub fn votes(&self) -> impl Iterator<Item = (ClassId, usize)> + '_ {
        self.histogram.iter().copied().enumerate()
    }
}

/// Sorts `distances` ascending and votes among the first `k`.
///
/// The sort is stable, so equal distances keep corpus order. Among classes
/// tied at the top count the lowest class id wins: the histogram is scanned
/// in class order and only a strictly greater count replaces the leader.
/// That rule is arbitrary but kept stable for reproducible results.
pub fn vote(
    mut distances: Vec<DistanceRecord>,
    k: usize,
    class_count: usize,
) -> Result<Vote, ClassifyError> {
    if k == 0 || k > distances.len() {
        return Err(ClassifyError::invalid(format!(
            "k must be in 1..={}, got {k}",
            distances.len()
        )));
    }
    if class_count == 0 {
        return Err(ClassifyError::invalid("class count must be at least 1"));
    }

    distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    distances.truncate(k);

    let mut histogram = vec![0_usize; class_count];
    for record in &distances {
        let slot = histogram.get_mut(record.label).ok_or_else(|| {
            ClassifyError::invalid(format!(
                "label {} outside class count {class_count}",
                record.label
            ))
        })?;
        *slot += 1;
    }

    let mut label = 0;
    let mut max = 0;
    for (class, count) in histogram.iter().copied().enumerate() {
        if count > max {
            max = count;
            label = class;
        }
    }

    Ok(Vote {
        label,
        histogram,
        nearest: distances,
    })
}
