//! Local PoC worker: `network-verified` -> `local-verified`.
//!
//! Also resumes projects the network stage parked as not-reachable; a
//! handler that is unreachable over HTTP can still be exploitable when the
//! exploit runs on the target host itself.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::{exec_path, gh_url_to_raw};
use crate::models::{PauseReason, Project, Step};
use crate::verifier::{ExternalVerifier, LocalOutcome, VerifyRequest, VerifyScript};
use crate::workers::{PollOutcome, Worker};

pub struct LocalWorker {
    db: Database,
    settings: Settings,
    verifier: Arc<dyn ExternalVerifier>,
}

impl LocalWorker {
    pub fn new(db: Database, settings: Settings, verifier: Arc<dyn ExternalVerifier>) -> Self {
        Self {
            db,
            settings,
            verifier,
        }
    }

    /// Regular queue first, then the not-reachable resume queue.
    fn claim(&self) -> Result<Option<(Project, bool)>, PatrolError> {
        if let Some(p) = self.db.fetch_next_at_step(Step::NetworkVerified)? {
            return Ok(Some((p, false)));
        }
        if let Some(p) = self
            .db
            .fetch_next_at_step_with_pause_reason(Step::StaticScanned, PauseReason::NotReachable)?
        {
            return Ok(Some((p, true)));
        }
        Ok(None)
    }
}

#[async_trait]
impl Worker for LocalWorker {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some((project, resumed)) = self.claim()? else {
            return Ok(PollOutcome::Idle);
        };
        info!(project = %project.id, repo = %project.repo_name, resumed, "Attempting local exploit");

        let raw_url = gh_url_to_raw(&project.file_url);
        let exec = exec_path(&self.settings.container_app_root, &raw_url)?;
        let req = VerifyRequest::new(&project.github_link(), &exec);

        let started = Instant::now();
        let code = self
            .verifier
            .verify(VerifyScript::Local, &req, self.settings.local_timeout_secs)
            .await?;
        self.db
            .record_timing(&project.id, "local-poc", started.elapsed().as_millis() as u64)?;
        self.db.set_exit_code(&project.id, code)?;

        match LocalOutcome::from_exit_code(code) {
            LocalOutcome::Vulnerable => {
                info!(project = %project.id, "Exploitable locally");
                // Local evidence is the fresher scope signal, even for
                // projects that already reproduced over the network.
                self.db.set_is_local(&project.id, true)?;
                if resumed {
                    self.db.clear_pause(&project.id)?;
                }
                self.db.change_step(&project.id, Step::LocalVerified)?;
            }
            LocalOutcome::NotVulnerable(c) => {
                info!(project = %project.id, exit_code = c, "Local exploit did not reproduce");
                self.db.pause(&project.id, PauseReason::NotLocallyVulnerable)?;
            }
        }
        Ok(PollOutcome::Worked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeVerifier(i32);

    #[async_trait]
    impl ExternalVerifier for FakeVerifier {
        async fn verify(
            &self,
            script: VerifyScript,
            _req: &VerifyRequest,
            _timeout_secs: u64,
        ) -> Result<i32, PatrolError> {
            assert_eq!(script, VerifyScript::Local);
            Ok(self.0)
        }
    }

    fn seeded(step: Step) -> Database {
        let db = Database::in_memory().unwrap();
        db.create_project(
            "p1",
            "acme/webapp",
            "https://github.com/acme/webapp/blob/ab12cd/server.js",
            "server.js",
        )
        .unwrap();
        db.change_step("p1", step).unwrap();
        db
    }

    #[tokio::test]
    async fn test_local_success_overrides_network_scope() {
        let db = seeded(Step::NetworkVerified);
        db.set_is_local("p1", false).unwrap();
        let worker = LocalWorker::new(db.clone(), Settings::default(), Arc::new(FakeVerifier(0)));
        worker.poll_once().await.unwrap();
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(p.step, Step::LocalVerified);
        assert_eq!(p.is_local, Some(true));
    }

    #[tokio::test]
    async fn test_resumes_not_reachable_projects() {
        let db = seeded(Step::StaticScanned);
        db.pause("p1", PauseReason::NotReachable).unwrap();
        let worker = LocalWorker::new(db.clone(), Settings::default(), Arc::new(FakeVerifier(0)));
        assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Worked);
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(p.step, Step::LocalVerified);
        assert_eq!(p.is_local, Some(true));
        assert!(p.pause_reason.is_none());
    }

    #[tokio::test]
    async fn test_failure_parks_not_locally_vulnerable() {
        let db = seeded(Step::NetworkVerified);
        let worker = LocalWorker::new(db.clone(), Settings::default(), Arc::new(FakeVerifier(1)));
        worker.poll_once().await.unwrap();
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(p.step, Step::NetworkVerified);
        assert_eq!(p.pause_reason, Some(PauseReason::NotLocallyVulnerable));
    }

    #[tokio::test]
    async fn test_other_pause_reasons_not_claimed() {
        let db = seeded(Step::StaticScanned);
        db.pause("p1", PauseReason::StartFailed).unwrap();
        let worker = LocalWorker::new(db.clone(), Settings::default(), Arc::new(FakeVerifier(0)));
        assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    }
}
