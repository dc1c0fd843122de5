mod schedule;
mod sync;

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::sync::{Family, SyncOptions};

#[derive(Debug, Parser)]
#[command(name = "olapsync")]
#[command(about = "Sync iiko OLAP reports and cost sheets into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch, normalize and merge every report for a date range
    Sync {
        /// First day to sync (YYYY-MM-DD); defaults to yesterday
        #[arg(long, env = "DATE_FROM")]
        from: Option<NaiveDate>,
        /// Exclusive end day (YYYY-MM-DD); defaults to the day after `--from`
        #[arg(long, env = "DATE_TO")]
        to: Option<NaiveDate>,
        /// Sync a single source family
        #[arg(long, value_enum)]
        only: Option<Family>,
        /// Fetch and normalize without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect recorded sync runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Run the daily sync on `OLAPSYNC_SCHEDULE_CRON` until interrupted
    Schedule,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum RunsCommands {
    /// List the most recent sync runs
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = olapsync_core::load_app_config()?;
    init_tracing(&config.log_level)?;

    match command {
        Commands::Sync {
            from,
            to,
            only,
            dry_run,
        } => {
            let today = chrono::Local::now().date_naive();
            let options = SyncOptions {
                range: sync::resolve_range(from, to, today)?,
                only,
                dry_run,
                trigger_source: "cli",
            };

            let pool = if dry_run {
                None
            } else {
                Some(olapsync_db::connect_pool_from_config(&config).await?)
            };

            let summary = sync::run_sync(pool.as_ref(), &config, &options).await;
            summary.print();

            let failed = summary.failed_count();
            if failed > 0 {
                anyhow::bail!("sync finished with {failed} failed report kind(s)");
            }
        }
        Commands::Db { command } => {
            let pool = olapsync_db::connect_pool_from_config(&config).await?;
            match command {
                DbCommands::Ping => {
                    olapsync_db::ping(&pool).await?;
                    println!("database is reachable");
                }
                DbCommands::Migrate => {
                    let applied = olapsync_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
        Commands::Runs {
            command: RunsCommands::List { limit },
        } => {
            let pool = olapsync_db::connect_pool_from_config(&config).await?;
            print_runs(&olapsync_db::list_sync_runs(&pool, limit).await?);
        }
        Commands::Schedule => {
            let pool = olapsync_db::connect_pool_from_config(&config).await?;
            olapsync_db::run_migrations(&pool).await?;

            let mut scheduler = schedule::build_scheduler(pool, Arc::new(config)).await?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down scheduler");
            scheduler.shutdown().await?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level applies.
fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

fn print_runs(runs: &[olapsync_db::SyncRunRow]) {
    if runs.is_empty() {
        println!("no sync runs recorded");
        return;
    }

    println!(
        "{:>6}  {:<10}  {:<23}  {:>7}  {:<8}  {}",
        "id", "status", "range", "rows", "trigger", "started"
    );
    for run in runs {
        let started = run.started_at.map_or_else(
            || "-".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!(
            "{:>6}  {:<10}  {} .. {}  {:>7}  {:<8}  {}",
            run.id, run.status, run.date_from, run.date_to, run.rows_merged, run.trigger_source, started
        );
        if let Some(message) = &run.error_message {
            println!("        {message}");
        }
    }
}
