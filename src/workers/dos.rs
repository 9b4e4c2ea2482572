//! DoS probe worker. Runs on `local-verified` projects that have not been
//! probed yet; the result only feeds the availability metric, so the step
//! never changes here.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::{exec_path, gh_url_to_raw};
use crate::models::{DosStatus, Step};
use crate::verifier::{DosOutcome, ExternalVerifier, VerifyRequest, VerifyScript};
use crate::workers::{PollOutcome, Worker};

pub struct DosWorker {
    db: Database,
    settings: Settings,
    verifier: Arc<dyn ExternalVerifier>,
}

impl DosWorker {
    pub fn new(db: Database, settings: Settings, verifier: Arc<dyn ExternalVerifier>) -> Self {
        Self {
            db,
            settings,
            verifier,
        }
    }
}

#[async_trait]
impl Worker for DosWorker {
    fn name(&self) -> &'static str {
        "dos"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some(project) = self
            .db
            .fetch_next_at_step_with_dos_status(Step::LocalVerified, DosStatus::NotChecked)?
        else {
            return Ok(PollOutcome::Idle);
        };
        info!(project = %project.id, repo = %project.repo_name, "Probing for crash-based DoS");

        let raw_url = gh_url_to_raw(&project.file_url);
        let exec = exec_path(&self.settings.container_app_root, &raw_url)?;
        let req = VerifyRequest::new(&project.github_link(), &exec);

        let started = Instant::now();
        let code = self
            .verifier
            .verify(VerifyScript::Dos, &req, self.settings.dos_timeout_secs)
            .await?;
        self.db
            .record_timing(&project.id, "dos-probe", started.elapsed().as_millis() as u64)?;

        let status = match DosOutcome::from_exit_code(code) {
            DosOutcome::Vulnerable => DosStatus::Vulnerable,
            DosOutcome::NotVulnerable(_) => DosStatus::NotVulnerable,
        };
        info!(project = %project.id, status = status.as_str(), "DoS probe finished");
        self.db.set_dos_status(&project.id, status)?;
        Ok(PollOutcome::Worked)
    }
}
