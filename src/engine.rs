//! Search engine: dispatches workers according to a partition policy, routes
//! discovered primes into a report sink, and waits for every worker.
//!
//! # Strategies
//!
//! - **Range** (coarse-grained): exactly `X` long-lived workers, each scanning
//!   one contiguous sub-range of `[1, Y]` sequentially
//! - **Divisor** (fine-grained): candidates `2..=Y` tested one at a time in
//!   increasing order; each candidate's trial divisors run on up to `X`
//!   short-lived workers per batch
//!
//! # Lifecycle
//!
//! `Idle -> Running -> Draining -> Done`. `run` blocks until every worker
//! has been joined, then finalizes the sink. An engine runs once; a second
//! `run` fails with [`SearchError::DoubleRun`].

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::SearchConfig;
use crate::divisor::{DivisorPolicy, test_candidate};
use crate::error::SearchError;
use crate::partition::{SubRange, partition_range};
use crate::primes::is_prime;
use crate::report::{
    COORDINATOR_ID, CollectThenPrintSink, ImmediatePrintSink, PrimeRecord, ReportSink,
};
use crate::timestamp::{MonotonicClock, Timestamp};

/// How the search space is split across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPolicy {
    /// One contiguous sub-range per worker.
    Range,
    /// Parallel trial division of one candidate at a time.
    Divisor { early_exit: bool },
}

impl PartitionPolicy {
    pub fn description(&self) -> &'static str {
        match self {
            PartitionPolicy::Range => {
                "B1 - Straight division of search range (1-1000, 4 threads: 1-250, 251-500, ...)"
            }
            PartitionPolicy::Divisor { .. } => {
                "B2 - Linear search; threads test divisibility of individual numbers"
            }
        }
    }
}

/// When discovered primes are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPolicy {
    Immediate,
    CollectThenPrint,
}

impl ReportPolicy {
    pub fn description(&self) -> &'static str {
        match self {
            ReportPolicy::Immediate => "A1 - Print immediately (thread ID and timestamp included)",
            ReportPolicy::CollectThenPrint => {
                "A2 - Wait until all threads are done, then print everything"
            }
        }
    }

    pub fn sink<W: Write + Send + 'static>(&self, out: W) -> Box<dyn ReportSink> {
        match self {
            ReportPolicy::Immediate => Box::new(ImmediatePrintSink::new(out)),
            ReportPolicy::CollectThenPrint => Box::new(CollectThenPrintSink::new(out)),
        }
    }
}

/// The four reporting x partitioning combinations, numbered 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    ImmediateRange,
    CollectRange,
    ImmediateDivisor,
    CollectDivisor,
}

impl Variant {
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(Variant::ImmediateRange),
            2 => Some(Variant::CollectRange),
            3 => Some(Variant::ImmediateDivisor),
            4 => Some(Variant::CollectDivisor),
            _ => None,
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Variant::ImmediateRange => 1,
            Variant::CollectRange => 2,
            Variant::ImmediateDivisor => 3,
            Variant::CollectDivisor => 4,
        }
    }

    pub fn report_policy(&self) -> ReportPolicy {
        match self {
            Variant::ImmediateRange | Variant::ImmediateDivisor => ReportPolicy::Immediate,
            Variant::CollectRange | Variant::CollectDivisor => ReportPolicy::CollectThenPrint,
        }
    }

    pub fn partition_policy(&self, early_exit: bool) -> PartitionPolicy {
        match self {
            Variant::ImmediateRange | Variant::CollectRange => PartitionPolicy::Range,
            Variant::ImmediateDivisor | Variant::CollectDivisor => {
                PartitionPolicy::Divisor { early_exit }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Range policy: sub-range order. Divisor policy: candidate order.
    pub primes: Vec<u64>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub elapsed: Duration,
}

pub struct SearchEngine<S> {
    config: SearchConfig,
    partition: PartitionPolicy,
    sink: S,
    clock: MonotonicClock,
    state: EngineState,
}

impl<S: ReportSink> SearchEngine<S> {
    pub fn new(config: SearchConfig, partition: PartitionPolicy, sink: S) -> Self {
        Self {
            config,
            partition,
            sink,
            clock: MonotonicClock::new(),
            state: EngineState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn run(&mut self) -> Result<SearchOutcome, SearchError> {
        if self.state != EngineState::Idle {
            return Err(SearchError::DoubleRun { state: self.state });
        }

        self.state = EngineState::Running;
        let start = Instant::now();
        let started_at = self.clock.now();
        info!(
            workers = self.config.worker_count(),
            range_end = self.config.range_end(),
            policy = ?self.partition,
            "search started"
        );

        let primes = match self.partition {
            PartitionPolicy::Range => self.run_ranges(),
            PartitionPolicy::Divisor { early_exit } => self.run_divisors(
                DivisorPolicy::new(self.config.worker_count()).with_early_exit(early_exit),
            ),
        };
        let primes = match primes {
            Ok(primes) => primes,
            Err(err) => {
                self.state = EngineState::Done;
                return Err(err);
            }
        };

        self.state = EngineState::Draining;
        let finalized = panic::catch_unwind(AssertUnwindSafe(|| self.sink.finalize()));
        self.state = EngineState::Done;
        match finalized {
            Ok(written) => written?,
            Err(payload) => {
                return Err(SearchError::worker_failure("final report".to_string(), payload));
            }
        }

        let elapsed = start.elapsed();
        info!(
            primes = primes.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "search finished"
        );

        Ok(SearchOutcome {
            primes,
            started_at,
            finished_at: self.clock.now(),
            elapsed,
        })
    }

    fn run_ranges(&self) -> Result<Vec<u64>, SearchError> {
        let ranges = partition_range(self.config.worker_count(), self.config.range_end());
        let sink = &self.sink;
        let clock = &self.clock;

        thread::scope(|scope| {
            let mut handles = Vec::new();
            let mut spawn_error = None;

            for range in ranges {
                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", range.worker_id))
                    .spawn_scoped(scope, move || scan_sub_range(range, sink, clock));
                match spawned {
                    Ok(handle) => handles.push((range, handle)),
                    Err(source) => {
                        spawn_error = Some(SearchError::Spawn {
                            unit: range.to_string(),
                            source,
                        });
                        break;
                    }
                }
            }

            // Join everything before reporting the first failure
            let mut primes = Vec::new();
            let mut failure = None;
            for (range, handle) in handles {
                let result = match handle.join() {
                    Ok(result) => result,
                    Err(payload) => Err(SearchError::worker_failure(range.to_string(), payload)),
                };
                match result {
                    Ok(found) => primes.extend(found),
                    Err(err) => {
                        error!(%range, %err, "worker failed");
                        if failure.is_none() {
                            failure = Some(err);
                        }
                    }
                }
            }

            match spawn_error.or(failure) {
                Some(err) => Err(err),
                None => Ok(primes),
            }
        })
    }

    fn run_divisors(&self, policy: DivisorPolicy) -> Result<Vec<u64>, SearchError> {
        let mut primes = Vec::new();

        for candidate in 2..=self.config.range_end() {
            let verdict = test_candidate(candidate, policy)?;
            debug!(
                candidate,
                is_prime = verdict.is_prime,
                batches = verdict.batches_run,
                "candidate tested"
            );

            if verdict.is_prime {
                let record = PrimeRecord {
                    value: candidate,
                    worker_id: COORDINATOR_ID,
                    discovered_at: self.clock.now(),
                };
                // Same failure contract as a range worker: a panicking sink fails the run
                match panic::catch_unwind(AssertUnwindSafe(|| self.sink.record(record))) {
                    Ok(written) => written?,
                    Err(payload) => {
                        let unit = format!("candidate {} (coordinator)", candidate);
                        let err = SearchError::worker_failure(unit, payload);
                        error!(candidate, %err, "recording prime failed");
                        return Err(err);
                    }
                }
                primes.push(candidate);
            }
        }

        Ok(primes)
    }
}

fn scan_sub_range<S: ReportSink + ?Sized>(
    range: SubRange,
    sink: &S,
    clock: &MonotonicClock,
) -> Result<Vec<u64>, SearchError> {
    debug!(%range, "scanning");
    let mut found = Vec::new();

    for n in range.numbers() {
        if is_prime(n) {
            sink.record(PrimeRecord {
                value: n,
                worker_id: range.worker_id,
                discovered_at: clock.now(),
            })?;
            found.push(n);
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::find_primes_reference;
    use std::collections::BTreeSet;
    use std::io;

    const PRIMES_TO_20: [u64; 8] = [2, 3, 5, 7, 11, 13, 17, 19];
    const DIVISOR: PartitionPolicy = PartitionPolicy::Divisor { early_exit: false };

    fn config(x: i64, y: i64) -> SearchConfig {
        SearchConfig::new(x, y).unwrap()
    }

    struct PanickingSink {
        poison: u64,
    }

    impl ReportSink for PanickingSink {
        fn record(&self, record: PrimeRecord) -> io::Result<()> {
            if record.value == self.poison {
                panic!("sink rejected {}", record.value);
            }
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_variant_numbering() {
        for n in 1..=4 {
            assert_eq!(Variant::from_number(n).unwrap().number(), n);
        }
        assert!(Variant::from_number(0).is_none());
        assert!(Variant::from_number(5).is_none());

        assert_eq!(Variant::CollectRange.report_policy(), ReportPolicy::CollectThenPrint);
        assert_eq!(Variant::CollectRange.partition_policy(true), PartitionPolicy::Range);
        assert_eq!(
            Variant::ImmediateDivisor.partition_policy(true),
            PartitionPolicy::Divisor { early_exit: true }
        );
    }

    #[test]
    fn test_range_search_four_workers_twenty() {
        let sink = CollectThenPrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(4, 20), PartitionPolicy::Range, sink);
        let outcome = engine.run().unwrap();

        assert_eq!(outcome.primes, PRIMES_TO_20);
        let records = engine.sink().records();
        let collected: BTreeSet<u64> = records.iter().map(|r| r.value).collect();
        assert_eq!(collected, PRIMES_TO_20.into_iter().collect());
    }

    #[test]
    fn test_smallest_range() {
        for policy in [PartitionPolicy::Range, DIVISOR] {
            let sink = CollectThenPrintSink::new(Vec::new());
            let mut engine = SearchEngine::new(config(1, 2), policy, sink);
            assert_eq!(engine.run().unwrap().primes, vec![2]);
            assert_eq!(engine.sink().records().len(), 1);
        }
    }

    #[test]
    fn test_collected_set_independent_of_worker_count() {
        let expected: BTreeSet<u64> = find_primes_reference(3_000).into_iter().collect();

        for workers in [1, 2, 3, 7, 16, 64] {
            let sink = CollectThenPrintSink::new(Vec::new());
            let mut engine =
                SearchEngine::new(config(workers, 3_000), PartitionPolicy::Range, sink);
            engine.run().unwrap();

            let records = engine.sink().records();
            let collected: BTreeSet<u64> = records.iter().map(|r| r.value).collect();
            assert_eq!(records.len(), expected.len(), "duplicates with {} workers", workers);
            assert_eq!(collected, expected, "{} workers", workers);
        }
    }

    #[test]
    fn test_records_carry_owning_worker() {
        let sink = CollectThenPrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(4, 20), PartitionPolicy::Range, sink);
        engine.run().unwrap();

        let ranges: Vec<SubRange> = partition_range(4, 20).collect();
        for record in engine.sink().records() {
            let owner = ranges
                .iter()
                .find(|r| r.numbers().contains(&record.value))
                .unwrap();
            assert_eq!(record.worker_id, owner.worker_id);
        }
    }

    #[test]
    fn test_divisor_search_reports_in_increasing_order() {
        for early_exit in [false, true] {
            let sink = ImmediatePrintSink::new(Vec::new());
            let policy = PartitionPolicy::Divisor { early_exit };
            let mut engine = SearchEngine::new(config(5, 200), policy, sink);
            let outcome = engine.run().unwrap();
            assert_eq!(outcome.primes, find_primes_reference(200));

            let text = String::from_utf8(engine.into_sink().into_inner()).unwrap();
            let printed: Vec<u64> = text
                .lines()
                .filter_map(|l| l.strip_prefix("Prime: "))
                .map(|v| v.parse().unwrap())
                .collect();
            assert_eq!(printed, find_primes_reference(200));
            assert!(
                text.lines()
                    .filter(|l| l.starts_with("Thread ID: "))
                    .all(|l| l == "Thread ID: 0")
            );
        }
    }

    #[test]
    fn test_immediate_range_output_is_whole_records() {
        let sink = ImmediatePrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(8, 5_000), PartitionPolicy::Range, sink);
        let outcome = engine.run().unwrap();

        let text = String::from_utf8(engine.into_sink().into_inner()).unwrap();
        let blocks: Vec<&str> = text.split_terminator("\n\n").collect();
        assert_eq!(blocks.len(), outcome.primes.len());
        for block in blocks {
            let lines: Vec<&str> = block.lines().collect();
            assert_eq!(lines.len(), 3, "split record: {:?}", block);
            assert!(lines[0].starts_with("Thread ID: "));
            assert!(lines[1].starts_with("Time Stamp: "));
            assert!(lines[2].starts_with("Prime: "));
        }
    }

    #[test]
    fn test_timestamps_within_run() {
        let sink = CollectThenPrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(3, 500), PartitionPolicy::Range, sink);
        let outcome = engine.run().unwrap();

        assert!(outcome.finished_at >= outcome.started_at);
        for record in engine.sink().records() {
            assert!(record.discovered_at >= outcome.started_at);
            assert!(record.discovered_at <= outcome.finished_at);
        }
    }

    #[test]
    fn test_state_transitions_and_double_run() {
        let sink = CollectThenPrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(2, 10), PartitionPolicy::Range, sink);
        assert_eq!(engine.state(), EngineState::Idle);

        engine.run().unwrap();
        assert_eq!(engine.state(), EngineState::Done);

        let err = engine.run().unwrap_err();
        assert!(matches!(
            err,
            SearchError::DoubleRun {
                state: EngineState::Done
            }
        ));
        // the rejected run must not collect anything new
        assert_eq!(engine.sink().records().len(), 4);
    }

    #[test]
    fn test_collect_sink_finalized_after_join() {
        let sink = CollectThenPrintSink::new(Vec::new());
        let mut engine = SearchEngine::new(config(4, 20), PartitionPolicy::Range, sink);
        engine.run().unwrap();

        let text = String::from_utf8(engine.into_sink().into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Primes Found: 8");
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn test_worker_panic_fails_the_run() {
        let sink = PanickingSink { poison: 13 };
        let mut engine = SearchEngine::new(config(4, 20), PartitionPolicy::Range, sink);

        match engine.run() {
            Err(SearchError::WorkerFailure { unit, reason }) => {
                assert_eq!(unit, "sub-range 11-15 (worker 3)");
                assert_eq!(reason, "sink rejected 13");
            }
            other => panic!("expected worker failure, got {:?}", other),
        }
        assert_eq!(engine.state(), EngineState::Done);
    }

    #[test]
    fn test_sink_panic_under_divisor_batching_fails_the_run() {
        for early_exit in [false, true] {
            let sink = PanickingSink { poison: 13 };
            let policy = PartitionPolicy::Divisor { early_exit };
            let mut engine = SearchEngine::new(config(4, 20), policy, sink);

            match engine.run() {
                Err(SearchError::WorkerFailure { unit, reason }) => {
                    assert_eq!(unit, "candidate 13 (coordinator)");
                    assert_eq!(reason, "sink rejected 13");
                }
                other => panic!("expected worker failure, got {:?}", other),
            }
            assert_eq!(engine.state(), EngineState::Done);
            assert!(matches!(engine.run(), Err(SearchError::DoubleRun { .. })));
        }
    }

    #[test]
    fn test_finalize_panic_fails_the_run() {
        struct PanickingFinalize;

        impl ReportSink for PanickingFinalize {
            fn record(&self, _record: PrimeRecord) -> io::Result<()> {
                Ok(())
            }

            fn finalize(&self) -> io::Result<()> {
                panic!("report lost");
            }
        }

        let sink = PanickingFinalize;
        let mut engine = SearchEngine::new(config(2, 10), PartitionPolicy::Range, sink);
        match engine.run() {
            Err(SearchError::WorkerFailure { unit, reason }) => {
                assert_eq!(unit, "final report");
                assert_eq!(reason, "report lost");
            }
            other => panic!("expected worker failure, got {:?}", other),
        }
        assert_eq!(engine.state(), EngineState::Done);
    }

    #[test]
    fn test_outcome_window_covers_run() {
        let sink = CollectThenPrintSink::new(io::sink());
        let mut engine = SearchEngine::new(config(2, 100), DIVISOR, sink);
        let outcome = engine.run().unwrap();
        assert!(outcome.started_at <= outcome.finished_at);
        assert_eq!(outcome.primes.len(), 25);
    }

    #[test]
    fn test_output_error_propagates() {
        for policy in [PartitionPolicy::Range, DIVISOR] {
            let sink = ImmediatePrintSink::new(FailingWriter);
            let mut engine = SearchEngine::new(config(2, 30), policy, sink);
            assert!(matches!(engine.run(), Err(SearchError::Output(_))));
        }

        let sink = CollectThenPrintSink::new(FailingWriter);
        let mut engine = SearchEngine::new(config(2, 30), PartitionPolicy::Range, sink);
        assert!(matches!(engine.run(), Err(SearchError::Output(_))));
    }

    #[test]
    fn test_boxed_sink_from_policy() {
        let sink = ReportPolicy::CollectThenPrint.sink(io::sink());
        let mut engine = SearchEngine::new(config(2, 50), PartitionPolicy::Range, sink);
        assert_eq!(engine.run().unwrap().primes.len(), 15);
    }
}
