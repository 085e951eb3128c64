use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Local;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratelimiter::config::{LimiterConfig, Strategy};
use ratelimiter::ratelimit::{build_limiter, RateLimiter};

/// Drive operations through a rate limiter and print when each is admitted.
#[derive(Parser, Debug)]
#[command(name = "ratelimiter", version, about)]
struct Args {
    /// Strategy to run; without one, both run back to back
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Operations per second
    #[arg(long, allow_negative_numbers = true)]
    rate: Option<i64>,

    /// Number of operations per strategy
    #[arg(long, default_value_t = 30)]
    ops: u32,

    /// Callers issuing operations concurrently
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Admit waiting callers in arrival order
    #[arg(long)]
    fair: bool,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = LimiterConfig::load(args.config.as_deref())?;
    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    config.fair |= args.fair;

    let strategies = match args.strategy {
        Some(strategy) => vec![strategy],
        None => vec![Strategy::FixedWindow, Strategy::TokenBucket],
    };

    tokio::select! {
        result = run_all(&config, &strategies, args.ops, args.concurrency) => result?,
        _ = shutdown_signal() => {}
    }

    Ok(())
}

async fn run_all(
    base: &LimiterConfig,
    strategies: &[Strategy],
    ops: u32,
    concurrency: usize,
) -> anyhow::Result<()> {
    for (i, strategy) in strategies.iter().enumerate() {
        if i > 0 {
            println!("----------------------------------- Split -----------------------------------");
        }
        let config = LimiterConfig {
            strategy: *strategy,
            ..base.clone()
        };
        let limiter = build_limiter(&config)?;
        run(&*limiter, ops, concurrency).await;
    }
    Ok(())
}

/// Issue `ops` admissions from `concurrency` callers sharing one limiter.
async fn run(limiter: &dyn RateLimiter, ops: u32, concurrency: usize) {
    let next = AtomicU32::new(0);

    let callers = (0..concurrency.max(1)).map(|caller| {
        let next = &next;
        async move {
            loop {
                let op = next.fetch_add(1, Ordering::Relaxed);
                if op >= ops {
                    break;
                }
                limiter.allow().await;
                println!(
                    "Operation {} (caller {}) at {}",
                    op,
                    caller,
                    Local::now().format("%Y-%m-%d %H:%M:%S%.9f")
                );
            }
        }
    });

    futures::future::join_all(callers).await;
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}
