use clap::Parser;
use lockstep_core::config::LockstepConfig;
use lockstep_scheduler::{RetentionPolicy, SyncScheduler};
use tracing::{info, warn};

mod command;

use crate::command::run_command;

/// Run shell-command jobs on at most one instance per tick.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (overrides LOCKSTEP_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Give every job a single guarded tick, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lockstep_runner=info,lockstep_scheduler=info,lockstep_lock=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    // explicit path > LOCKSTEP_CONFIG env > ~/.lockstep/lockstep.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("LOCKSTEP_CONFIG").ok());
    let config = LockstepConfig::load(config_path.as_deref())?;
    if config.jobs.is_empty() {
        warn!("no [[jobs]] configured; nothing to schedule");
    }

    let mut scheduler = SyncScheduler::from_config(&config).await?;
    info!(addr = %config.redis.addr, db = config.redis.db, "connected to redis");

    for job in &config.jobs {
        scheduler
            .every(job.every)
            .unit(job.unit)
            .retention(RetentionPolicy::from_keep_locked(job.keep_locked))
            .register(
                job.name.as_str(),
                job.lock_expiry(),
                run_command,
                job.command.clone(),
            )?;
    }

    if args.once {
        scheduler.run_once().await;
        report(&scheduler);
        return Ok(());
    }

    scheduler.start_async();
    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down");
    scheduler.shutdown().await;
    report(&scheduler);
    Ok(())
}

/// One JSON line per job with its counters.
fn report(scheduler: &SyncScheduler) {
    for job in scheduler.jobs() {
        match serde_json::to_string(&job.snapshot()) {
            Ok(json) => info!(job = %job.identity(), stats = %json, "job summary"),
            Err(e) => warn!(job = %job.identity(), error = %e, "could not serialize job stats"),
        }
    }
}
