//! bench-cli entry point.
//!
//! Kept thin: parse args, build the one shared service object, dispatch,
//! print a line or two, exit.

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bench-cli")]
#[command(about = "Benchmark-results ingestion core CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
    /// Ingestion maintenance commands
    Ingest {
        #[command(subcommand)]
        cmd: IngestCmd,
    },
    /// Timeline updater commands
    Timeline {
        #[command(subcommand)]
        cmd: TimelineCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[derive(Subcommand)]
enum IngestCmd {
    /// Drain any `TimelineCalcJob` rows left behind by a crashed process.
    Recover,
}

#[derive(Subcommand)]
enum TimelineCmd {
    /// Run the updater's consumer loop standalone until Ctrl-C.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = bench_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = bench_db::status(&pool).await?;
                    println!("db_ok={} has_runs_table={}", s.ok, s.has_runs_table);
                }
                DbCmd::Migrate => {
                    bench_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Ingest { cmd: IngestCmd::Recover } => {
            let cfg = bench_config::Config::from_env()?;
            let service = bench_service::IngestService::new(cfg).await?;
            let n = service.recover_pending_jobs().await?;
            println!("recovered_jobs={n}");
            service.shutdown().await;
        }

        Commands::Timeline { cmd: TimelineCmd::Run } => {
            let cfg = bench_config::Config::from_env()?;
            let service = bench_service::IngestService::new(cfg).await?;
            let recovered = service.recover_pending_jobs().await?;
            tracing::info!(recovered_jobs = recovered, "timeline updater running");
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down, draining pending jobs");
            service.shutdown().await;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
