use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use theo_pricer::config::Config;
use theo_pricer::pricing::runner::TheoRunner;
use theo_pricer::utils::ts_hm;

/// Exit code for a usage error, distinct from a pipeline failure (1).
const USAGE_STATUS: u8 = 2;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: theo-pricer <theo_data.csv> <underlying_prices.txt>");
        return ExitCode::from(USAGE_STATUS);
    }

    dotenv::dotenv().ok();
    let config = Config::from_env();
    let runner = TheoRunner::new(PathBuf::from(&args[1]), PathBuf::from(&args[2]), config);

    let start = Instant::now();
    // An unexpected panic is reported as a failed run, not a crash.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.run()));
    let status: u8 = match outcome {
        Ok(Ok(report)) => {
            eprintln!(
                "[{}] priced {} of {} accepted instruments with {} workers",
                ts_hm(),
                report.priced,
                report.accepted,
                report.worker_threads
            );
            0
        }
        Ok(Err(e)) => {
            eprintln!("{}", e);
            1
        }
        Err(_) => {
            eprintln!("pricing run panicked");
            1
        }
    };

    println!("{}", status);
    println!("Load time mics: {}", start.elapsed().as_micros());
    ExitCode::from(status)
}
