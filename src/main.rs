use clap::Parser;
use tracing_subscriber::EnvFilter;

use pathpatrol::cli::run::{handle_worker, WorkerKind};
use pathpatrol::cli::{status, Cli, Commands};
use pathpatrol::errors::PatrolError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .init();

    let config = cli.config.clone();
    let result = match cli.command {
        Commands::Scan(args) => handle_worker(WorkerKind::StaticScan, args, config).await,
        Commands::Network(args) => handle_worker(WorkerKind::Network, args, config).await,
        Commands::Local(args) => handle_worker(WorkerKind::Local, args, config).await,
        Commands::Dos(args) => handle_worker(WorkerKind::Dos, args, config).await,
        Commands::Score(args) => handle_worker(WorkerKind::Scoring, args, config).await,
        Commands::Patch(args) => handle_worker(WorkerKind::Patch, args, config).await,
        Commands::Status(args) => status::handle_status(args, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            PatrolError::Config(_) => 2,
            PatrolError::Database(_) => 3,
            PatrolError::Lock(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
