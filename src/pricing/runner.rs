//! Two-phase pipeline orchestration.
//!
//! Phase 1 reduces the underlying-price stream to its statistics on the
//! calling thread; nothing concurrent starts until it has finished. Phase 2
//! runs one producer thread against a pool of workers draining the batch
//! queue into the output file. The only shared mutable state in phase 2 is
//! the queue (its own mutex and condvar) and the output sink (its own
//! mutex); no thread ever holds both locks.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::config::Config;
use crate::pricing::batch_queue::BatchQueue;
use crate::pricing::types::UnderlyingStats;
use crate::pricing::{producer, stats, thread_pinning, worker};
use crate::utils::ts_hm;
use crate::DynError;

/// First row of the result file.
pub const OUTPUT_HEADER: &str = "instrument,average_theo";

/// Pool sizing rule: one core is reserved for the producer.
pub fn default_worker_threads() -> usize {
    let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    hw.saturating_sub(1).max(1)
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub stats: UnderlyingStats,

    /// Instrument lines decoded and queued.
    pub accepted: u64,

    /// Instrument lines dropped as malformed.
    pub skipped: u64,

    /// Result rows written. Equals `accepted` after a clean run.
    pub priced: u64,

    pub worker_threads: usize,
}

/// Sequences the pipeline: statistics, output, producer and worker pool.
pub struct TheoRunner {
    instrument_path: PathBuf,
    underlying_path: PathBuf,
    config: Config,
}

impl TheoRunner {
    pub fn new(instrument_path: PathBuf, underlying_path: PathBuf, config: Config) -> Self {
        Self {
            instrument_path,
            underlying_path,
            config,
        }
    }

    pub fn run(&self) -> Result<RunReport, DynError> {
        // Phase 1, blocking: the statistics must be final before any worker
        // exists, which is what makes their reads synchronization-free.
        let stats = stats::reduce_underlying_prices(&self.underlying_path)?;
        eprintln!(
            "[{}] [PHASE-1] reduced {} samples: mean={:.6} mean_sq={:.6}",
            ts_hm(),
            stats.samples,
            stats.mean,
            stats.mean_sq
        );

        // Open the instrument input before spawning anything: an unopenable
        // input is fatal and must never strand a parked worker pool.
        let instrument_file = File::open(&self.instrument_path).map_err(|e| {
            format!(
                "cannot open instrument file {}: {}",
                self.instrument_path.display(),
                e
            )
        })?;

        let output = File::create(&self.config.output_path).map_err(|e| {
            format!(
                "cannot create output file {}: {}",
                self.config.output_path.display(),
                e
            )
        })?;
        let mut writer = BufWriter::new(output);
        writeln!(writer, "{}", OUTPUT_HEADER)
            .map_err(|e| format!("cannot write output header: {}", e))?;
        let sink = Arc::new(Mutex::new(writer));

        let worker_threads = self
            .config
            .worker_threads
            .unwrap_or_else(default_worker_threads);
        let assignment = thread_pinning::CoreAssignment::detect(self.config.pin_cores);

        let queue = BatchQueue::new();
        eprintln!(
            "[{}] [PHASE-2] spawning producer and {} workers",
            ts_hm(),
            worker_threads
        );

        let producer_thread = {
            let handle = queue.producer();
            thread_pinning::spawn_pinned_thread(assignment.producer_core(), "producer", move || {
                producer::run_producer(BufReader::new(instrument_file), &handle)
            })
        };

        let mut worker_handles = Vec::with_capacity(worker_threads);
        for worker_id in 0..worker_threads {
            let consumer = queue.consumer();
            let sink = Arc::clone(&sink);
            worker_handles.push(thread_pinning::spawn_pinned_thread(
                assignment.worker_core(worker_id),
                &format!("worker-{}", worker_id),
                move || worker::run_worker(&consumer, stats, &sink),
            ));
        }

        let producer_result = producer_thread.join();
        // Idempotent safety net: a producer that died before closing must not
        // leave the pool parked forever.
        queue.producer().close();

        let mut priced = 0u64;
        let mut write_errors = 0u64;
        let mut worker_panics = 0u64;
        for handle in worker_handles {
            match handle.join() {
                Ok(report) => {
                    priced += report.priced;
                    write_errors += report.write_errors;
                }
                Err(_) => worker_panics += 1,
            }
        }

        let producer_report =
            producer_result.map_err(|_| String::from("producer thread panicked"))?;
        if worker_panics > 0 {
            return Err(format!("{} worker threads panicked", worker_panics).into());
        }

        // Every handed-out sink clone was joined above.
        let sink = Arc::try_unwrap(sink)
            .map_err(|_| String::from("output sink still shared after join"))?;
        let mut writer = sink.into_inner().unwrap_or_else(PoisonError::into_inner);
        writer
            .flush()
            .map_err(|e| format!("cannot flush output file: {}", e))?;

        if write_errors > 0 {
            return Err(format!("{} batch writes failed", write_errors).into());
        }

        eprintln!(
            "[{}] [PHASE-2] priced {} instruments in {} batches ({} malformed lines skipped)",
            ts_hm(),
            priced,
            producer_report.batches,
            producer_report.skipped
        );

        Ok(RunReport {
            stats,
            accepted: producer_report.accepted,
            skipped: producer_report.skipped,
            priced,
            worker_threads,
        })
    }
}
