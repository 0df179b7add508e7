//! Work partitioning for the two search strategies.
//!
//! - Range partitioning: `[1, Y]` split into `X` contiguous sub-ranges, one per worker
//! - Divisor batching: trial divisors `2..=floor(sqrt(n))` of one candidate, in
//!   batches of at most `X`, run one batch at a time

use std::fmt;
use std::ops::RangeInclusive;

/// Contiguous slice `[start, end]` of the search interval owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    pub start: u64,
    pub end: u64,
    pub worker_id: u64,
}

impl SubRange {
    #[cfg(test)]
    pub fn len(&self) -> u64 {
        (self.end + 1).saturating_sub(self.start)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn numbers(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for SubRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-range {}-{} (worker {})", self.start, self.end, self.worker_id)
    }
}

/// Split `[1, range_end]` into `worker_count` sub-ranges.
///
/// The first `range_end % worker_count` sub-ranges get one extra number. The
/// last sub-range always ends at `range_end`. Workers are numbered from 1.
/// Callers guarantee `1 <= worker_count <= range_end`.
///
/// Sub-ranges are produced lazily, so nothing is allocated up front for `X`.
pub fn partition_range(worker_count: u64, range_end: u64) -> SubRanges {
    SubRanges {
        worker_count,
        range_end,
        base: range_end / worker_count,
        remainder: range_end % worker_count,
        next_index: 0,
        next_start: 1,
    }
}

#[derive(Debug, Clone)]
pub struct SubRanges {
    worker_count: u64,
    range_end: u64,
    base: u64,
    remainder: u64,
    next_index: u64,
    next_start: u64,
}

impl Iterator for SubRanges {
    type Item = SubRange;

    fn next(&mut self) -> Option<SubRange> {
        if self.next_index >= self.worker_count {
            return None;
        }

        let i = self.next_index;
        let start = self.next_start;
        let size = if i < self.remainder {
            self.base + 1
        } else {
            self.base
        };
        let end = if i == self.worker_count - 1 {
            self.range_end
        } else {
            start + size - 1
        };

        self.next_index += 1;
        self.next_start = end + 1;
        Some(SubRange {
            start,
            end,
            worker_id: i + 1,
        })
    }
}

/// One round of concurrent divisor tests against a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisorBatch {
    pub candidate: u64,
    pub batch_index: usize,
    pub divisors: RangeInclusive<u64>,
}

impl DivisorBatch {
    pub fn len(&self) -> usize {
        self.divisors.clone().count()
    }
}

impl fmt::Display for DivisorBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate {} batch {} (divisors {}-{})",
            self.candidate,
            self.batch_index,
            self.divisors.start(),
            self.divisors.end()
        )
    }
}

/// Batch plan for the trial divisors of `candidate`.
///
/// Yields batches covering `2..=floor(sqrt(candidate))` in increasing order,
/// each holding at most `budget` divisors, with no divisor repeated. Yields
/// nothing when the candidate has no divisors to test (n < 4).
#[derive(Debug, Clone)]
pub struct DivisorBatches {
    candidate: u64,
    budget: u64,
    next: u64,
    limit: u64,
    batch_index: usize,
}

impl DivisorBatches {
    pub fn new(candidate: u64, budget: u64) -> Self {
        Self {
            candidate,
            budget: budget.max(1),
            next: 2,
            limit: candidate.isqrt(),
            batch_index: 0,
        }
    }
}

impl Iterator for DivisorBatches {
    type Item = DivisorBatch;

    fn next(&mut self) -> Option<DivisorBatch> {
        if self.next > self.limit {
            return None;
        }

        let start = self.next;
        let end = (start + self.budget - 1).min(self.limit);
        self.next = end + 1;

        let batch = DivisorBatch {
            candidate: self.candidate,
            batch_index: self.batch_index,
            divisors: start..=end,
        };
        self.batch_index += 1;
        Some(batch)
    }
}
