use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod input;
mod runner;
mod stats;

use input::TraceReader;
use webcache_rs::policy;
use webcache_rs::Cache;

/// Replays a request trace against one cache policy and prints
/// `<policyName> <cacheBytes> <paramSummary> <reqs> <hits> <hitRatio>`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace file: one `timestamp id size` request per line
    trace_path: PathBuf,

    /// Policy name (e.g. LRU, FIFO, Filter, ThLRU, ExpLRU, AdaptSize,
    /// S4LRU, SLRU, TinyLFU, W_TinyLFU)
    policy_name: String,

    /// Cache byte budget
    cache_bytes: u64,

    /// Policy parameters as name=value pairs
    #[arg(value_name = "NAME=VALUE")]
    params: Vec<String>,
}

fn main() -> ExitCode {
    // All diagnostics go to stderr; stdout carries only the summary line
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    let Some(mut cache) = policy::create(&args.policy_name) else {
        eprintln!(
            "unknown cache policy '{}', expected one of: {}",
            args.policy_name,
            policy::POLICY_NAMES.join(", ")
        );
        return ExitCode::from(1);
    };
    cache.set_size(args.cache_bytes);

    let mut param_summary = String::new();
    for param in &args.params {
        match param.split_once('=') {
            Some((name, value)) => {
                cache.set_par(name, value);
                if !param_summary.is_empty() {
                    param_summary.push(',');
                }
                param_summary.push_str(param);
            }
            None => {
                tracing::warn!(param = %param, "ignoring parameter, expected name=value");
            }
        }
    }

    let reader = match TraceReader::open(&args.trace_path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("cannot open trace {}: {e}", args.trace_path.display());
            return ExitCode::from(1);
        }
    };

    tracing::info!(
        policy = %args.policy_name,
        cache_bytes = args.cache_bytes,
        trace = %args.trace_path.display(),
        "running"
    );
    let totals = runner::run(cache.as_mut(), reader);

    println!(
        "{}",
        totals.summary_line(&args.policy_name, args.cache_bytes, &param_summary)
    );
    ExitCode::SUCCESS
}
