//! Batch consumers: price, format, flush.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;

use crate::pricing::batch_queue::BatchConsumer;
use crate::pricing::types::{UnderlyingStats, BATCH_SIZE};

/// Formatted output reserve per record: name, comma, fixed-point price,
/// newline comfortably fit.
const RESULT_BYTES_PER_RECORD: usize = 64;

/// What one worker did before the queue ran dry.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerReport {
    /// Records priced and formatted.
    pub priced: u64,

    /// Batches consumed.
    pub batches: u64,

    /// Batch flushes that failed at the sink. Surfaced by the runner as a
    /// failed run instead of being silently swallowed.
    pub write_errors: u64,
}

/// Consume batches until the queue is drained and closed.
///
/// Results are formatted into one buffer that is reused across batches
/// (cleared, never reallocated), and the sink lock is taken once per batch
/// rather than once per record. Prices render in fixed-point notation with
/// exactly four decimal digits.
pub fn run_worker<W: Write>(
    consumer: &BatchConsumer,
    stats: UnderlyingStats,
    sink: &Mutex<W>,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    let mut buffer = String::with_capacity(BATCH_SIZE * RESULT_BYTES_PER_RECORD);

    while let Some(batch) = consumer.pop() {
        for record in batch.records() {
            let price = record.price_at(stats);
            // Formatting into a String cannot fail.
            let _ = writeln!(buffer, "{},{:.4}", record.name, price);
            report.priced += 1;
        }

        {
            let mut sink = sink.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Err(e) = sink.write_all(buffer.as_bytes()) {
                report.write_errors += 1;
                eprintln!("[PHASE-2] batch write failed: {}", e);
            }
        }

        buffer.clear();
        report.batches += 1;
    }

    report
}
