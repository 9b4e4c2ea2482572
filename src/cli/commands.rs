use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pathpatrol",
    version,
    about = "Path-traversal verification and patching pipeline for Node.js projects"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the static-scan worker (cloned -> static-scanned)
    Scan(WorkerArgs),
    /// Run the network PoC worker (static-scanned -> network-verified)
    Network(WorkerArgs),
    /// Run the local PoC worker (network-verified -> local-verified)
    Local(WorkerArgs),
    /// Run the DoS probe worker (local-verified projects)
    Dos(WorkerArgs),
    /// Run the CVSS scoring worker (local-verified -> cvss-ready)
    Score(WorkerArgs),
    /// Run the patch worker (cvss-ready -> patch-ready)
    Patch(WorkerArgs),
    /// Print per-step project counts
    Status(StatusArgs),
}

#[derive(Args, Clone)]
pub struct WorkerArgs {
    /// Poll once and exit instead of running as a daemon
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Clone)]
pub struct StatusArgs {}
