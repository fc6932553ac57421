//! Contention comparison for the locks in `adaptive-lock`.
//!
//! Runs the same workloads against [`AdaptiveLock`], [`SpinLock`] and
//! [`std::sync::Mutex`]: every thread loops acquire, touch shared state,
//! release, and the driver reports how long each lock took and checks that no
//! update was lost.
//!
//! ```text
//! adaptive-lock [-t THREADS] [-i ITERATIONS] [-w counter|map|all]
//! ```
//!
//! Built only with the `cli` feature: `cargo run --features cli --release`.

use adaptive_lock::{AdaptiveLock, Lockable, Mutex, SpinLock};
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::process::ExitCode;
use std::sync::PoisonError;
use std::thread;
use std::time::{Duration, Instant};

/// Values folded into the shared state on every round.
const VALUES: [u64; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

const DEFAULT_THREADS: usize = 64;
const DEFAULT_ITERATIONS: usize = 10_000;

fn setup_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "adaptive_lock=info");
    }
    env_logger::init();
}

fn print_help() {
    println!("adaptive-lock v{}", env!("CARGO_PKG_VERSION"));
    println!("Compares AdaptiveLock, SpinLock and std::sync::Mutex under contention.\n");
    println!("USAGE:");
    println!("    adaptive-lock [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    -t, --threads <N>       Concurrent threads (default: {DEFAULT_THREADS})");
    println!("    -i, --iterations <M>    Rounds per thread (default: {DEFAULT_ITERATIONS})");
    println!("    -w, --workload <W>      counter, map or all (default: all)");
    println!("    -h, --help              Show this help message");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Workload {
    Counter,
    Map,
    All,
}

#[derive(Debug)]
struct Config {
    threads: usize,
    iterations: usize,
    workload: Workload,
}

/// Command line problems.
#[derive(Debug)]
enum ArgsError {
    /// Flag given without its value
    MissingValue(String),
    /// Value is not a positive integer
    InvalidNumber { flag: String, value: String },
    /// Workload name not recognised
    UnknownWorkload(String),
    /// Flag not recognised
    UnknownFlag(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue(flag) => write!(f, "missing value for {}", flag),
            ArgsError::InvalidNumber { flag, value } => {
                write!(f, "invalid value for {}: {:?} (expected a positive integer)", flag, value)
            }
            ArgsError::UnknownWorkload(w) => {
                write!(f, "unknown workload {:?} (expected counter, map or all)", w)
            }
            ArgsError::UnknownFlag(flag) => write!(f, "unknown option {}", flag),
        }
    }
}

impl std::error::Error for ArgsError {}

/// A workload finished with state that proves an update was lost.
#[derive(Debug)]
struct CheckFailed {
    lock: &'static str,
    workload: &'static str,
    got: u64,
    want: u64,
}

impl fmt::Display for CheckFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} loop: result {}; want {}",
            self.lock, self.workload, self.got, self.want
        )
    }
}

impl std::error::Error for CheckFailed {}

fn parse_count(flag: &str, value: Option<String>) -> Result<usize, ArgsError> {
    let value = value.ok_or_else(|| ArgsError::MissingValue(flag.to_string()))?;
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ArgsError::InvalidNumber {
            flag: flag.to_string(),
            value,
        }),
    }
}

/// Parses the arguments after the program name. `Ok(None)` means help was
/// requested.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Config>, ArgsError> {
    let mut config = Config {
        threads: DEFAULT_THREADS,
        iterations: DEFAULT_ITERATIONS,
        workload: Workload::All,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-t" | "--threads" => config.threads = parse_count(&arg, args.next())?,
            "-i" | "--iterations" => config.iterations = parse_count(&arg, args.next())?,
            "-w" | "--workload" => {
                let value = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                config.workload = match value.as_str() {
                    "counter" => Workload::Counter,
                    "map" => Workload::Map,
                    "all" => Workload::All,
                    _ => return Err(ArgsError::UnknownWorkload(value)),
                };
            }
            _ => return Err(ArgsError::UnknownFlag(arg)),
        }
    }

    Ok(Some(config))
}

/// Exclusive access to a `T`, however the lock provides it.
trait Guarded<T>: Sync {
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T: Send, L: Lockable + Sync + Send> Guarded<T> for Mutex<T, L> {
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.with_lock(f)
    }
}

impl<T: Send> Guarded<T> for std::sync::Mutex<T> {
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

/// Runs `round` `iterations` times on each of `threads` scoped threads.
fn hammer<T, G: Guarded<T>>(
    guarded: &G,
    config: &Config,
    round: impl Fn(&mut T) + Sync,
) -> Duration {
    let start = Instant::now();
    thread::scope(|s| {
        for _ in 0..config.threads {
            s.spawn(|| {
                for _ in 0..config.iterations {
                    guarded.with(&round);
                }
            });
        }
    });
    start.elapsed()
}

/// Every round adds all of [`VALUES`] to a shared counter.
fn counter_loop<G: Guarded<u64>>(
    lock: &'static str,
    guarded: G,
    config: &Config,
) -> Result<Duration, CheckFailed> {
    let elapsed = hammer(&guarded, config, |counter: &mut u64| {
        for v in VALUES {
            *counter += v;
        }
    });

    let rounds = (config.threads * config.iterations) as u64;
    let want = rounds * VALUES.iter().sum::<u64>();
    let got = guarded.with(|counter: &mut u64| *counter);
    if got != want {
        return Err(CheckFailed {
            lock,
            workload: "counter",
            got,
            want,
        });
    }
    Ok(elapsed)
}

/// Every round writes all of [`VALUES`] as keys of a shared, plain `HashMap`.
fn map_loop<G: Guarded<HashMap<u64, bool>>>(
    lock: &'static str,
    guarded: G,
    config: &Config,
) -> Result<Duration, CheckFailed> {
    let elapsed = hammer(&guarded, config, |map: &mut HashMap<u64, bool>| {
        for v in VALUES {
            map.insert(v, true);
        }
    });

    let got = guarded.with(|map: &mut HashMap<u64, bool>| map.len()) as u64;
    let want = VALUES.len() as u64;
    if got != want {
        return Err(CheckFailed {
            lock,
            workload: "map",
            got,
            want,
        });
    }
    Ok(elapsed)
}

fn report(lock: &str, workload: &str, elapsed: Duration, config: &Config) {
    let ops = (config.threads * config.iterations) as f64;
    let ns_per_op = elapsed.as_nanos() as f64 / ops;
    info!("{} {} loop finished in {:?}", lock, workload, elapsed);
    println!(
        "{:<10} {:<8} {:>12.3?} {:>10.1} ns/op",
        lock, workload, elapsed, ns_per_op
    );
}

fn run(config: &Config) -> Result<(), CheckFailed> {
    info!(
        "Running {:?} workload: {} threads x {} iterations",
        config.workload, config.threads, config.iterations
    );

    if matches!(config.workload, Workload::Counter | Workload::All) {
        let adaptive = Mutex::with_raw(AdaptiveLock::new(), 0u64);
        report("adaptive", "counter", counter_loop("adaptive", adaptive, config)?, config);

        let spin = Mutex::with_raw(SpinLock::new(), 0u64);
        report("spin", "counter", counter_loop("spin", spin, config)?, config);

        let std_mutex = std::sync::Mutex::new(0u64);
        report("std", "counter", counter_loop("std", std_mutex, config)?, config);
    }

    if matches!(config.workload, Workload::Map | Workload::All) {
        let adaptive = Mutex::with_raw(AdaptiveLock::new(), HashMap::new());
        report("adaptive", "map", map_loop("adaptive", adaptive, config)?, config);

        let spin = Mutex::with_raw(SpinLock::new(), HashMap::new());
        report("spin", "map", map_loop("spin", spin, config)?, config);

        let std_mutex = std::sync::Mutex::new(HashMap::new());
        report("std", "map", map_loop("std", std_mutex, config)?, config);
    }

    Ok(())
}

fn main() -> ExitCode {
    setup_logger();

    let config = match parse_args(std::env::args().skip(1)) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {}\n", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
