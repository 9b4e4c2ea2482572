//! Patch worker: `cvss-ready` -> `patch-ready`.
//!
//! Drives the generate-and-validate loop. A candidate patch is accepted only
//! when all three gates pass on the same attempt:
//!   1. the exploit no longer reproduces against the patched target,
//!   2. the regression oracle count strictly increased over the pre-patch
//!      baseline,
//!   3. the discovered run method is unchanged by the patch.
//!
//! The attempt counter is persisted before each verdict is inspected, so
//! the lifetime budget holds across crashes and restarts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::{exec_path, gh_url_to_raw, SourceFetcher};
use crate::llm::PatchBackend;
use crate::models::{PauseReason, Project, RunMethod, Step};
use crate::oracle::RegressionOracle;
use crate::verifier::{ExternalVerifier, PatchVerdict, ReverifyOutcome, VerifyRequest, VerifyScript};
use crate::workers::{PollOutcome, Worker};

pub struct PatchWorker {
    db: Database,
    settings: Settings,
    verifier: Arc<dyn ExternalVerifier>,
    oracle: Arc<dyn RegressionOracle>,
    backend: Arc<dyn PatchBackend>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl PatchWorker {
    pub fn new(
        db: Database,
        settings: Settings,
        verifier: Arc<dyn ExternalVerifier>,
        oracle: Arc<dyn RegressionOracle>,
        backend: Arc<dyn PatchBackend>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            db,
            settings,
            verifier,
            oracle,
            backend,
            fetcher,
        }
    }

    /// The verifier rewrites the snippet file on every run; a stale copy
    /// from a previous run must never reach the oracle.
    fn remove_stale_snippet(&self) -> Result<(), PatrolError> {
        let snippet = self.settings.snippet_file();
        if snippet.exists() {
            std::fs::remove_file(&snippet)?;
        }
        Ok(())
    }

    fn read_run_method(&self) -> Result<RunMethod, PatrolError> {
        let content = std::fs::read_to_string(self.settings.run_method_file())?;
        RunMethod::parse(&content)
    }

    async fn process(&self, project: &Project) -> Result<(), PatrolError> {
        let raw_url = gh_url_to_raw(&project.file_url);
        let exec = exec_path(&self.settings.container_app_root, &raw_url)?;
        let repo_url = project.github_link();

        // Gate zero: the target must still be exploitable unpatched.
        self.remove_stale_snippet()?;
        let req = VerifyRequest::new(&repo_url, &exec);
        let code = self
            .verifier
            .verify(VerifyScript::LocalVerify, &req, self.settings.patch_timeout_secs)
            .await?;
        self.db.set_exit_code(&project.id, code)?;
        match ReverifyOutcome::from_exit_code(code) {
            ReverifyOutcome::StillVulnerable => {}
            ReverifyOutcome::SinceFixed => {
                info!(project = %project.id, "Vulnerability no longer reproduces, fixed upstream");
                self.db.pause(&project.id, PauseReason::TargetSinceFixed)?;
                return Ok(());
            }
            ReverifyOutcome::TargetBroken => {
                info!(project = %project.id, "Target broken before any patch");
                self.db.pause(&project.id, PauseReason::TargetBuggy)?;
                return Ok(());
            }
            ReverifyOutcome::CodeDeleted => {
                info!(project = %project.id, "Vulnerable code no longer present");
                self.db.pause(&project.id, PauseReason::CodeDeleted)?;
                return Ok(());
            }
            ReverifyOutcome::Unknown(c) => {
                warn!(project = %project.id, exit_code = c, "Unhandled re-verify exit code");
                self.db.pause(&project.id, PauseReason::UnknownExitCode)?;
                return Ok(());
            }
        }

        let initial_count = self
            .oracle
            .count_safe_patterns(&self.settings.snippet_file())
            .await?;

        let baseline_method = match self.read_run_method() {
            Ok(m) => m,
            Err(e) => {
                warn!(project = %project.id, error = %e, "Run method unusable");
                self.db.pause(&project.id, PauseReason::RunMethodInvalid)?;
                return Ok(());
            }
        };
        let payload = std::fs::read_to_string(self.settings.payload_file())?;

        std::fs::create_dir_all(&self.settings.patch_dir)?;
        let patch_path = self.settings.patch_file(&project.id);

        let mut attempt = self.db.llm_try_count(&project.id)?;
        while attempt < self.settings.max_patch_tries {
            attempt += 1;
            info!(
                project = %project.id,
                attempt,
                budget = self.settings.max_patch_tries,
                "Generating patch candidate"
            );

            // Fresh fetch per attempt; the prompt must see the file as it
            // exists now, not as it was at ingestion.
            let source = self.fetcher.fetch(&raw_url).await?;
            let patch = self.backend.generate_patch(&source, &project.filename).await?;
            // patch(1) requires the trailing newline; LLM output often
            // omits it.
            std::fs::write(&patch_path, format!("{}\r\n", patch.trim_end()))?;

            self.remove_stale_snippet()?;
            let req = VerifyRequest::new(&repo_url, &exec).with_patch(patch_path.clone());
            let code = self
                .verifier
                .verify(VerifyScript::LocalVerify, &req, self.settings.patch_timeout_secs)
                .await?;
            self.db.set_llm_try_count(&project.id, attempt)?;
            self.db.set_exit_code(&project.id, code)?;

            match PatchVerdict::from_exit_code(code) {
                PatchVerdict::Fixed => {}
                PatchVerdict::TargetBroken => {
                    info!(project = %project.id, "Target broke during validation");
                    self.db.pause(&project.id, PauseReason::TargetBuggy)?;
                    return Ok(());
                }
                PatchVerdict::CodeDeleted => {
                    info!(project = %project.id, "Vulnerable code vanished during validation");
                    self.db.pause(&project.id, PauseReason::CodeDeleted)?;
                    return Ok(());
                }
                PatchVerdict::StillVulnerable(c) => {
                    info!(project = %project.id, attempt, exit_code = c, "Patch did not stop the exploit");
                    continue;
                }
            }

            let patched_count = self
                .oracle
                .count_safe_patterns(&self.settings.snippet_file())
                .await?;
            if patched_count <= initial_count {
                info!(
                    project = %project.id,
                    attempt,
                    initial_count,
                    patched_count,
                    "Regression oracle rejected the patch"
                );
                continue;
            }

            match self.read_run_method() {
                Ok(m) if m == baseline_method => {}
                Ok(m) => {
                    info!(
                        project = %project.id,
                        attempt,
                        before = baseline_method.as_str(),
                        after = m.as_str(),
                        "Patch changed how the target starts"
                    );
                    continue;
                }
                Err(e) => {
                    info!(project = %project.id, attempt, error = %e, "Run method unreadable after patch");
                    continue;
                }
            }

            info!(project = %project.id, attempt, "Patch accepted");
            self.db.set_run_method(&project.id, baseline_method)?;
            self.db.set_poc(&project.id, payload.trim())?;
            self.db.change_step(&project.id, Step::PatchReady)?;
            return Ok(());
        }

        info!(project = %project.id, tries = attempt, "Patch budget exhausted");
        self.db
            .pause(&project.id, PauseReason::PatchValidationExhausted)?;
        Ok(())
    }
}

#[async_trait]
impl Worker for PatchWorker {
    fn name(&self) -> &'static str {
        "patcher"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some(project) = self.db.fetch_next_at_step(Step::CvssReady)? else {
            return Ok(PollOutcome::Idle);
        };
        self.process(&project).await?;
        Ok(PollOutcome::Worked)
    }
}
