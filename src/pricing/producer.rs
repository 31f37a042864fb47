//! Instrument-file reader feeding the batch queue.

use std::io::BufRead;

use crate::pricing::batch_queue::BatchProducer;
use crate::pricing::types::Batch;
use crate::record_parser;

/// A first line containing this substring is a header and is discarded.
pub const HEADER_MARKER: &str = "INSTRUMENTS";

/// What the producer saw while streaming the instrument file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProducerReport {
    /// Lines decoded into records and handed to the queue.
    pub accepted: u64,

    /// Lines dropped: wrong field count or an unparseable numeric field.
    pub skipped: u64,

    /// Batches pushed, including a final partial one.
    pub batches: u64,
}

/// Stream instrument lines into sealed batches.
///
/// Malformed lines are dropped without diagnostics (they are only counted);
/// a read error ends the stream the same way end-of-file does. The queue is
/// closed on every exit path, so parked workers always wake.
pub fn run_producer<R: BufRead>(reader: R, handle: &BatchProducer) -> ProducerReport {
    let mut report = ProducerReport::default();
    let mut batch = Batch::new();
    let mut first = true;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };

        if first {
            first = false;
            if line.contains(HEADER_MARKER) {
                continue;
            }
        }

        match record_parser::decode_instrument(&line) {
            Some(record) => {
                batch.push(record);
                report.accepted += 1;
                if batch.is_full() {
                    handle.push(std::mem::take(&mut batch));
                    report.batches += 1;
                }
            }
            None => report.skipped += 1,
        }
    }

    if !batch.is_empty() {
        handle.push(batch);
        report.batches += 1;
    }

    handle.close();
    report
}
