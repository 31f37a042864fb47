//! Phase-1 reduction of the underlying-price stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::pricing::types::UnderlyingStats;
use crate::DynError;

/// Reduce the underlying-price file to its running statistics.
///
/// Must complete, successfully, before any pricing thread starts: the
/// returned value is treated as immutable for the rest of the run.
pub fn reduce_underlying_prices(path: &Path) -> Result<UnderlyingStats, DynError> {
    let file = File::open(path)
        .map_err(|e| format!("cannot open underlying price file {}: {}", path.display(), e))?;
    read_underlying_prices(BufReader::new(file))
}

/// Single-pass reduction of whitespace-separated price samples.
///
/// Consumption stops at the first token that is not a number, and a read
/// error ends the stream the same way end-of-input does; samples read up to
/// that point still count. Zero samples is an error: pricing against
/// undefined statistics is meaningless.
pub fn read_underlying_prices<R: BufRead>(reader: R) -> Result<UnderlyingStats, DynError> {
    let mut stats = UnderlyingStats::default();

    'lines: for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        for token in line.split_ascii_whitespace() {
            match token.parse::<f64>() {
                Ok(value) => stats.accumulate(value),
                Err(_) => break 'lines,
            }
        }
    }

    if stats.samples == 0 {
        return Err("underlying price stream holds no samples; statistics are undefined".into());
    }
    Ok(stats)
}
