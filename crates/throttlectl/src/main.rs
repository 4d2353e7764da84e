use anyhow::{bail, ensure, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use throttle_core::{LimiterConfig, LimitersFile, RateLimiter, ThrottleError};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "throttlectl", version, about = "Drive and inspect throttle rate limiters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make throttled calls and report how long each one waited
    Run(RunArgs),
    /// Validate a limiter file and list its limiters
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, requires = "config")]
    limiter: Option<String>,

    #[arg(long, default_value = "throttlectl", conflicts_with = "config")]
    name: String,

    #[arg(long, default_value_t = 10, conflicts_with = "config")]
    quota: u32,

    #[arg(long, default_value_t = 100, conflicts_with = "config")]
    rate_ms: u64,

    #[arg(long, conflicts_with = "config")]
    window_ms: Option<u64>,

    #[arg(long, default_value_t = 20)]
    calls: u32,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    limiter: String,
    quota: u32,
    rate_ms: u64,
    window_ms: u64,
    calls: u32,
    timed_out: u32,
    elapsed_ms: u64,
    waits_ms: Vec<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check { config } => check(&config),
    }
}

fn resolve_config(args: &RunArgs) -> Result<LimiterConfig> {
    let Some(path) = &args.config else {
        return Ok(LimiterConfig {
            name: args.name.clone(),
            quota: args.quota,
            rate_ms: args.rate_ms,
            window_ms: args.window_ms,
        });
    };
    let file = LimitersFile::load(path)?;
    let config = match &args.limiter {
        Some(name) => file.find(name)?.clone(),
        None => match file.limiters.as_slice() {
            [only] => only.clone(),
            [] => bail!("no limiters in {}", path.display()),
            _ => bail!("{} defines several limiters, pick one with --limiter", path.display()),
        },
    };
    Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let limiter = RateLimiter::from_config(&config).context("invalid limiter settings")?;
    let window = limiter.rate_window();
    let timeout = args.timeout_ms.map(Duration::from_millis);

    let mut waits_ms = Vec::with_capacity(args.calls as usize);
    let mut timed_out = 0;
    let started = Instant::now();
    for call in 1..=args.calls {
        let begin = Instant::now();
        let result = match timeout {
            Some(timeout) => limiter.throttle_timeout(timeout).await,
            None => limiter.throttle().await,
        };
        let waited = begin.elapsed().as_millis() as u64;
        match result {
            Ok(()) => waits_ms.push(waited),
            Err(ThrottleError::TimedOut(_)) => {
                timed_out += 1;
                warn!(call, waited_ms = waited, "gave up waiting for a token");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
        if !args.json {
            println!(
                "[{}] call {call} waited {waited}ms, {} tokens left",
                Local::now().format("%H:%M:%S%.3f"),
                limiter.tokens_left()
            );
        }
    }

    let report = RunReport {
        limiter: limiter.name().to_string(),
        quota: window.quota(),
        rate_ms: window.rate().as_millis() as u64,
        window_ms: window.window().as_millis() as u64,
        calls: args.calls,
        timed_out,
        elapsed_ms: started.elapsed().as_millis() as u64,
        waits_ms,
    };
    if let Some(usage) = limiter.usage() {
        info!(used = usage.used, remaining = usage.remaining, "run finished");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} calls in {}ms ({} timed out)",
            report.calls, report.elapsed_ms, report.timed_out
        );
    }
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    ensure!(path.exists(), "{} not found", path.display());
    let file = LimitersFile::load(path)?;
    if file.limiters.is_empty() {
        println!("no limiters defined");
        return Ok(());
    }
    for limiter in &file.limiters {
        let window = limiter.rate_window()?;
        let reset = if window.resets() {
            format!("{}ms", window.window().as_millis())
        } else {
            "off".to_string()
        };
        println!(
            "{} quota={} rate={}ms window={reset}",
            limiter.name,
            window.quota(),
            window.rate().as_millis()
        );
    }
    Ok(())
}
