mod config;
mod divisor;
mod engine;
mod error;
mod partition;
mod primes;
mod report;
mod timestamp;

use clap::Parser;
use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

use config::RawConfig;
use engine::{SearchEngine, Variant};
use timestamp::Timestamp;

#[derive(Parser)]
#[command(name = "primesearch")]
#[command(about = "Concurrent prime search over [1, y] with x worker threads", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u32).range(1..=4),
        help = "Variant: 1 = A1+B1, 2 = A2+B1, 3 = A1+B2, 4 = A2+B2"
    )]
    variant: u32,
    #[arg(
        short,
        long,
        default_value = config::DEFAULT_CONFIG_PATH,
        help = "Config file with x=<threads> and y=<range end> lines"
    )]
    config: PathBuf,
    #[arg(
        short = 'x',
        long = "threads",
        help = "Number of worker threads (overrides config file)"
    )]
    threads: Option<i64>,
    #[arg(
        short = 'y',
        long = "end",
        help = "Upper end of the search range (overrides config file)"
    )]
    end: Option<i64>,
    #[arg(
        long,
        help = "Stop testing a number once a divisor is found (variants 3 and 4 only)"
    )]
    early_exit: bool,
    #[arg(long, help = "Check the result against a single-threaded sieve")]
    verify: bool,
    #[arg(short = 'V', long, help = "Enable debug logging")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .with_thread_names(true)
        .init();

    let Some(variant) = Variant::from_number(cli.variant) else {
        eprintln!("Unknown variant {}", cli.variant);
        return ExitCode::FAILURE;
    };
    let report_policy = variant.report_policy();
    let partition_policy = variant.partition_policy(cli.early_exit);

    println!("Variant {}", variant.number());
    println!("{}", report_policy.description());
    println!("{}", partition_policy.description());

    let overrides = RawConfig {
        x: cli.threads,
        y: cli.end,
    };
    let config = match config::resolve(&cli.config, overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Start Time: {}", Timestamp::now());
    println!();

    let sink = report_policy.sink(io::stdout());
    let mut engine = SearchEngine::new(config, partition_policy, sink);
    let outcome = match engine.run() {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!("Search Started: {}", outcome.started_at);
    println!("End Time: {}", outcome.finished_at);
    println!("\nTotal: {} primes found", outcome.primes.len());

    let duration_us = outcome.elapsed.as_micros();
    println!(
        "Execution time: {}us ({:.2}ms)",
        duration_us,
        duration_us as f64 / 1000.0
    );

    if cli.verify {
        let found: BTreeSet<u64> = outcome.primes.iter().copied().collect();
        let expected: BTreeSet<u64> = primes::find_primes_reference(config.range_end())
            .into_iter()
            .collect();
        if found != expected || found.len() != outcome.primes.len() {
            eprintln!(
                "Verification failed: found {} primes, reference sieve has {}",
                outcome.primes.len(),
                expected.len()
            );
            return ExitCode::FAILURE;
        }
        println!("Verified against reference sieve");
    }

    ExitCode::SUCCESS
}
