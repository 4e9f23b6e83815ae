mod config;
mod seed;

use meso_core::progress::SeriesMetric;
use serde_json::json;
use services::AppServices;
use storage::Storage;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{ArgsError, Config, DEFAULT_LOG_FILTER, prepare_sqlite_file};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  meso schedule --mesocycle-id <id> [--db <sqlite_url>] [--user-id <id>]");
    eprintln!("                [--as-of <rfc3339>] [--history-days <n>]");
    eprintln!("  meso progress [--mesocycle-id <id>] [--db <sqlite_url>] [--user-id <id>]");
    eprintln!("  meso seed     [--db <sqlite_url>] [--user-id <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://dev.sqlite3");
    eprintln!("  --user-id 1");
    eprintln!("  --history-days 365");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MESO_DB_URL, MESO_USER_ID, MESO_HISTORY_DAYS, MESO_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Schedule,
    Progress,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "schedule" => Some(Self::Schedule),
            "progress" => Some(Self::Progress),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

fn init_logging(filter: &str) {
    let filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Err(ArgsError::MissingCommand.into());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    let config = Config::from_env().apply_args(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_logging(&config.log_filter);
    debug!(?cmd, db_url = %config.db_url, user_id = %config.user_id, "starting");

    prepare_sqlite_file(&config.db_url)?;

    match cmd {
        Command::Schedule => {
            let mesocycle_id = config.require_mesocycle()?;
            let services =
                AppServices::new_sqlite(&config.db_url, config.clock(), config.history_days)
                    .await?;
            let schedule = services
                .schedule()
                .project_schedule(config.user_id, mesocycle_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        Command::Progress => {
            let services =
                AppServices::new_sqlite(&config.db_url, config.clock(), config.history_days)
                    .await?;
            let progress = services.progress();
            let mut report = json!({
                "muscleGroupVolume": progress.muscle_group_volume(config.user_id).await?,
                "muscleGroupSets": progress.muscle_group_sets(config.user_id).await?,
                "muscleGroupVolumeTrend": progress
                    .muscle_group_trend(config.user_id, SeriesMetric::Volume)
                    .await?,
            });
            if let Some(mesocycle_id) = config.mesocycle_id {
                let volumes = progress
                    .iteration_volumes(config.user_id, mesocycle_id)
                    .await?;
                let detail = progress
                    .mesocycle_detail(config.user_id, mesocycle_id)
                    .await?;
                report["iterationVolumes"] = serde_json::to_value(volumes)?;
                report["detail"] = serde_json::to_value(detail)?;
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Seed => {
            let storage = Storage::sqlite(&config.db_url).await?;
            let now = config.clock().now();
            seed::seed_demo(&storage, config.user_id, now, config.history_days).await?;
            println!("{}", seed::SEED_MESOCYCLE);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
