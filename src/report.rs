//! Result reporting: print each prime as it is found, or collect them all
//! and print once the run has finished.

use parking_lot::Mutex;
use std::io::{self, Write};

use crate::timestamp::Timestamp;

/// Worker ID carried by records confirmed on the coordinating thread
/// (divisor-batch search, where no single worker proves primality).
pub const COORDINATOR_ID: u64 = 0;

/// A discovered prime. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeRecord {
    pub value: u64,
    pub worker_id: u64,
    pub discovered_at: Timestamp,
}

/// Destination for discovered primes, shared by every worker of a run.
pub trait ReportSink: Sync {
    /// Called from the worker that confirmed primality.
    fn record(&self, record: PrimeRecord) -> io::Result<()>;

    /// Called exactly once, after every worker of the run has been joined.
    fn finalize(&self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn record(&self, record: PrimeRecord) -> io::Result<()> {
        (**self).record(record)
    }

    fn finalize(&self) -> io::Result<()> {
        (**self).finalize()
    }
}

/// Three-line block followed by a blank line:
///
/// ```text
/// Thread ID: 3
/// Time Stamp: 10/19/2026, 02:15:07.412
/// Prime: 13
/// ```
fn format_block(record: &PrimeRecord) -> String {
    let mut itoa_buf = itoa::Buffer::new();
    let mut block = String::with_capacity(64);
    block.push_str("Thread ID: ");
    block.push_str(itoa_buf.format(record.worker_id));
    block.push_str("\nTime Stamp: ");
    block.push_str(&record.discovered_at.to_string());
    block.push_str("\nPrime: ");
    block.push_str(itoa_buf.format(record.value));
    block.push_str("\n\n");
    block
}

/// Prints each record the moment it arrives.
///
/// The lock covers only the write of one record, so records from different
/// workers never interleave but primality testing stays fully parallel.
pub struct ImmediatePrintSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ImmediatePrintSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> ReportSink for ImmediatePrintSink<W> {
    fn record(&self, record: PrimeRecord) -> io::Result<()> {
        let block = format_block(&record);
        let mut out = self.out.lock();
        out.write_all(block.as_bytes())?;
        out.flush()
    }
}

/// Appends records to a shared list and prints them all in `finalize`.
///
/// Order is arrival order. With range partitioning that depends on worker
/// timing, so the output is not necessarily sorted.
pub struct CollectThenPrintSink<W> {
    records: Mutex<Vec<PrimeRecord>>,
    out: Mutex<W>,
}

impl<W: Write + Send> CollectThenPrintSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            out: Mutex::new(out),
        }
    }

    /// Snapshot of the records collected so far, in arrival order.
    #[cfg(test)]
    pub fn records(&self) -> Vec<PrimeRecord> {
        self.records.lock().clone()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> ReportSink for CollectThenPrintSink<W> {
    fn record(&self, record: PrimeRecord) -> io::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn finalize(&self) -> io::Result<()> {
        let records = self.records.lock();
        let mut out = self.out.lock();

        let mut itoa_buf = itoa::Buffer::new();
        writeln!(out, "Primes Found: {}", records.len())?;
        for record in records.iter() {
            out.write_all(b"Prime: ")?;
            out.write_all(itoa_buf.format(record.value).as_bytes())?;
            out.write_all(b" | Thread ID: ")?;
            out.write_all(itoa_buf.format(record.worker_id).as_bytes())?;
            writeln!(out, " | Time Stamp: {}", record.discovered_at)?;
        }
        out.flush()
    }
}
