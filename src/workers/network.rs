//! Network PoC worker: `static-scanned` -> `network-verified`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::{exec_path, gh_url_to_raw};
use crate::models::{PauseReason, Step};
use crate::verifier::{ExternalVerifier, NetworkOutcome, VerifyRequest, VerifyScript};
use crate::workers::{PollOutcome, Worker};

pub struct NetworkWorker {
    db: Database,
    settings: Settings,
    verifier: Arc<dyn ExternalVerifier>,
}

impl NetworkWorker {
    pub fn new(db: Database, settings: Settings, verifier: Arc<dyn ExternalVerifier>) -> Self {
        Self {
            db,
            settings,
            verifier,
        }
    }
}

#[async_trait]
impl Worker for NetworkWorker {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some(project) = self.db.fetch_next_at_step(Step::StaticScanned)? else {
            return Ok(PollOutcome::Idle);
        };
        info!(project = %project.id, repo = %project.repo_name, "Attempting network exploit");

        let raw_url = gh_url_to_raw(&project.file_url);
        let exec = exec_path(&self.settings.container_app_root, &raw_url)?;
        let req = VerifyRequest::new(&project.github_link(), &exec);

        let started = Instant::now();
        let code = self
            .verifier
            .verify(VerifyScript::Network, &req, self.settings.network_timeout_secs)
            .await?;
        self.db
            .record_timing(&project.id, "network-poc", started.elapsed().as_millis() as u64)?;
        self.db.set_exit_code(&project.id, code)?;

        match NetworkOutcome::from_exit_code(code) {
            NetworkOutcome::Vulnerable => {
                info!(project = %project.id, "Exploitable over the network");
                self.db.set_is_local(&project.id, false)?;
                self.db.change_step(&project.id, Step::NetworkVerified)?;
            }
            NetworkOutcome::StartFailed => {
                info!(project = %project.id, "Target did not start");
                self.db.pause(&project.id, PauseReason::StartFailed)?;
            }
            NetworkOutcome::NoOpenPort => {
                info!(project = %project.id, "Target started but opened no port");
                self.db.pause(&project.id, PauseReason::NoOpenPort)?;
            }
            NetworkOutcome::NotReachable => {
                info!(project = %project.id, "Vulnerable handler not reachable over HTTP");
                self.db.pause(&project.id, PauseReason::NotReachable)?;
            }
            NetworkOutcome::Unknown(c) => {
                warn!(project = %project.id, exit_code = c, "Unhandled verifier exit code");
                self.db.pause(&project.id, PauseReason::UnknownExitCode)?;
            }
        }
        Ok(PollOutcome::Worked)
    }
}
