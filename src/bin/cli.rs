//! crabykv CLI
//!
//! Command-line interface for inspecting and exercising a crabykv file.

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use crabykv::storage::LogRecovery;
use crabykv::{Config, Store, SyncPolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// crabykv CLI
#[derive(Parser, Debug)]
#[command(name = "crabykv")]
#[command(about = "Embedded durable key-value store")]
#[command(version)]
struct Args {
    /// Backing file
    #[arg(short, long, default_value = "./crabykv.db")]
    path: String,

    /// Durability policy for writes
    #[arg(short, long, value_enum, default_value = "on-demand")]
    sync: SyncArg,

    /// Interval for the periodic policy (milliseconds)
    #[arg(long, default_value = "100")]
    sync_interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SyncArg {
    EveryWrite,
    Periodic,
    OnDemand,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// List keys
    Keys,

    /// Check whether a key exists
    Contains {
        key: String,
    },

    /// Count keys
    Size,

    /// Remove every key
    Clear,

    /// Rewrite the file with only live records
    Compact,

    /// Print store counters
    Stats,

    /// Check file integrity without modifying it
    Verify,

    /// Time get and set loops the way the demo harness does
    Bench {
        /// Iterations per loop
        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crabykv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> crabykv::Result<()> {
    // Verify never opens the store (open would truncate a damaged tail)
    if let Commands::Verify = args.command {
        let result = LogRecovery::verify(Path::new(&args.path))?;
        println!("records:   {}", result.records_recovered);
        println!("last seq:  {}", result.last_sequence);
        println!("valid len: {}", result.valid_len);
        println!("discarded: {}", result.discarded_bytes);
        if let Some(reason) = result.stop_reason {
            println!("stopped:   {}", reason);
        }
        return Ok(());
    }

    let sync_policy = match args.sync {
        SyncArg::EveryWrite => SyncPolicy::EveryWrite,
        SyncArg::Periodic => {
            SyncPolicy::periodic(100, Duration::from_millis(args.sync_interval_ms))
        }
        SyncArg::OnDemand => SyncPolicy::OnDemand,
    };
    let config = Config::builder().sync_policy(sync_policy).build();

    tracing::debug!("crabykv v{} opening {}", crabykv::VERSION, args.path);
    let store = Store::initialize(&args.path, config)?;

    match args.command {
        Commands::Get { key } => match store.get(&key) {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            store.set(&key, value)?;
            println!("OK");
        }
        Commands::Remove { key } => {
            let removed = store.remove(&key)?;
            println!("{}", if removed { "1" } else { "0" });
        }
        Commands::Keys => {
            for key in store.keys() {
                println!("{}", key);
            }
        }
        Commands::Contains { key } => println!("{}", store.contains(&key)),
        Commands::Size => println!("{}", store.size()),
        Commands::Clear => {
            store.clear()?;
            println!("OK");
        }
        Commands::Compact => {
            let stats = store.compact()?;
            println!(
                "{} -> {} bytes ({} records)",
                stats.bytes_before, stats.bytes_after, stats.records_written
            );
        }
        Commands::Stats => println!("{:#?}", store.stats()),
        Commands::Bench { iterations } => bench(&store, iterations)?,
        Commands::Verify => {} // handled before open
    }

    store.close()
}

/// Replays the demo harness: one warm key read in a tight loop, then an
/// interleaved set/get loop on a single key.
fn bench(store: &Store, iterations: usize) -> crabykv::Result<()> {
    const KEY: &str = "test-key";
    const VALUE: &str = "Hello, world!";

    store.set(KEY, VALUE)?;

    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(store.get(KEY));
    }
    report("get", start.elapsed(), iterations);

    let start = Instant::now();
    for i in 0..iterations {
        let value = format!("{}{}", VALUE, i);
        store.set(KEY, &value)?;
        let read = store.get(KEY);
        if read.as_deref() != Some(value.as_bytes()) {
            tracing::error!(iteration = i, "read did not observe the latest write");
        }
    }
    report("set+get", start.elapsed(), iterations);

    let start = Instant::now();
    store.flush()?;
    println!("flush: {:.3} ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

fn report(label: &str, total: Duration, iterations: usize) {
    let total_ms = total.as_secs_f64() * 1000.0;
    let avg_ms = if iterations == 0 {
        0.0
    } else {
        total_ms / iterations as f64
    };
    println!(
        "{}: total {:.3} ms, avg {:.6} ms over {} iterations",
        label, total_ms, avg_ms, iterations
    );
}
