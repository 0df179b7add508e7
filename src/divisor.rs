//! Parallel trial division of a single candidate.
//!
//! Divisors are split into batches of at most `budget` (see [`DivisorBatches`]).
//! Each divisor in a batch gets its own short-lived worker; the batch is
//! joined before the next one starts, so at most `budget` workers are alive
//! at any moment. Workers return whether their divisor divides the candidate
//! and the join results are OR-reduced, so no flag or lock is shared.

use std::thread;
use tracing::trace;

use crate::error::SearchError;
use crate::partition::{DivisorBatch, DivisorBatches};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisorPolicy {
    /// Maximum number of divisor workers alive at once.
    pub budget: u64,
    /// Stop launching batches once a divisor has been found. Workers already
    /// running in the current batch are still joined.
    pub early_exit: bool,
}

impl DivisorPolicy {
    pub fn new(budget: u64) -> Self {
        Self {
            budget: budget.max(1),
            early_exit: false,
        }
    }

    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateVerdict {
    pub is_prime: bool,
    pub batches_run: usize,
    pub divisors_tested: u64,
}

/// Decide whether `candidate` is prime by testing every divisor in
/// `2..=floor(sqrt(candidate))` on parallel workers.
pub fn test_candidate(
    candidate: u64,
    policy: DivisorPolicy,
) -> Result<CandidateVerdict, SearchError> {
    let mut verdict = CandidateVerdict {
        is_prime: candidate >= 2,
        batches_run: 0,
        divisors_tested: 0,
    };
    if candidate <= 1 {
        return Ok(verdict);
    }

    for batch in DivisorBatches::new(candidate, policy.budget) {
        if policy.early_exit && !verdict.is_prime {
            break;
        }

        let found = run_batch(&batch)?;
        trace!(candidate, batch = batch.batch_index, found, "divisor batch joined");

        verdict.batches_run += 1;
        verdict.divisors_tested += batch.len() as u64;
        if found {
            verdict.is_prime = false;
        }
    }

    Ok(verdict)
}

/// Spawn one worker per divisor, join them all, OR the results.
fn run_batch(batch: &DivisorBatch) -> Result<bool, SearchError> {
    let candidate = batch.candidate;

    thread::scope(|scope| {
        let mut handles = Vec::new();
        let mut spawn_error = None;

        for divisor in batch.divisors.clone() {
            let spawned = thread::Builder::new()
                .name(format!("divisor-{}", divisor))
                .spawn_scoped(scope, move || candidate % divisor == 0);
            match spawned {
                Ok(handle) => handles.push((divisor, handle)),
                Err(source) => {
                    spawn_error = Some(SearchError::Spawn {
                        unit: format!("{}, divisor {}", batch, divisor),
                        source,
                    });
                    break;
                }
            }
        }

        let mut found = false;
        let mut failure = None;
        for (divisor, handle) in handles {
            match handle.join() {
                Ok(divides) => found |= divides,
                // Modulo by a divisor >= 2 cannot panic, so this only fires if
                // the worker thread itself dies
                Err(payload) => {
                    if failure.is_none() {
                        let unit = format!("{}, divisor {}", batch, divisor);
                        failure = Some(SearchError::worker_failure(unit, payload));
                    }
                }
            }
        }

        match spawn_error.or(failure) {
            Some(err) => Err(err),
            None => Ok(found),
        }
    })
}
