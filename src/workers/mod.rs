//! The long-lived stage daemons.
//!
//! Each worker owns one step transition and runs as its own process under an
//! instance lock. The shared loop isolates faults: an error in one poll
//! iteration is logged and the next cycle starts clean.

pub mod dos;
pub mod local;
pub mod network;
pub mod patcher;
pub mod scoring;
pub mod static_scan;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::errors::PatrolError;

pub use dos::DosWorker;
pub use local::LocalWorker;
pub use network::NetworkWorker;
pub use patcher::PatchWorker;
pub use scoring::ScoringWorker;
pub use static_scan::StaticScanWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A project was claimed and handled.
    Worked,
    /// Nothing eligible; sleep before polling again.
    Idle,
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &'static str;

    /// One poll cycle: claim at most one project, apply the stage's
    /// transition rule, produce at most one store mutation.
    async fn poll_once(&self) -> Result<PollOutcome, PatrolError>;
}

/// Daemon loop. Never returns; external signals are the only way out, and
/// the instance lock is released by scope when they arrive.
pub async fn run_worker_loop(worker: &dyn Worker, poll_interval: Duration) -> ! {
    loop {
        match worker.poll_once().await {
            Ok(PollOutcome::Worked) => {}
            Ok(PollOutcome::Idle) => {
                debug!(worker = worker.name(), "No eligible projects, waiting");
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) => {
                // External-system fault: abandon this iteration without
                // touching project state and let the next poll retry
                error!(worker = worker.name(), error = %e, "Poll iteration failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
