//! Static-scan worker: `cloned` -> `static-scanned`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::{gh_url_to_raw, SourceFetcher};
use crate::models::{PauseReason, Step};
use crate::scan::{ScanOutcome, StaticScanner};
use crate::workers::{PollOutcome, Worker};

pub struct StaticScanWorker {
    db: Database,
    settings: Settings,
    scanner: Arc<dyn StaticScanner>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl StaticScanWorker {
    pub fn new(
        db: Database,
        settings: Settings,
        scanner: Arc<dyn StaticScanner>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            db,
            settings,
            scanner,
            fetcher,
        }
    }
}

#[async_trait]
impl Worker for StaticScanWorker {
    fn name(&self) -> &'static str {
        "static-scan"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some(project) = self.db.fetch_next_at_step(Step::Cloned)? else {
            return Ok(PollOutcome::Idle);
        };
        info!(project = %project.id, repo = %project.repo_name, "Scanning candidate file");
        self.db.change_step(&project.id, Step::StaticScanning)?;

        let raw_url = gh_url_to_raw(&project.file_url);
        let source = match self.fetcher.fetch(&raw_url).await {
            Ok(s) => s,
            Err(e) => {
                warn!(project = %project.id, url = %raw_url, error = %e, "Candidate download failed");
                // Every branch ends at static-scanned; nothing polls the
                // in-progress step, so a cleared pause must leave the
                // project claimable.
                self.db.change_step(&project.id, Step::StaticScanned)?;
                self.db.pause(&project.id, PauseReason::StaticScanFailed)?;
                return Ok(PollOutcome::Worked);
            }
        };

        std::fs::create_dir_all(&self.settings.work_dir)?;
        let target = self.settings.work_dir.join("scan-target.js");
        std::fs::write(&target, &source)?;

        let started = Instant::now();
        let outcome = self.scanner.scan(&target).await?;
        self.db
            .record_timing(&project.id, "semgrep", started.elapsed().as_millis() as u64)?;

        match outcome {
            ScanOutcome::Findings(results) if !results.is_empty() => {
                info!(project = %project.id, matches = results.len(), "Rule matched");
                self.db
                    .save_scan_matches(&project.id, &serde_json::to_string(&results)?)?;
                self.db.change_step(&project.id, Step::StaticScanned)?;
            }
            ScanOutcome::Findings(_) => {
                info!(project = %project.id, "No rule match, parking project");
                self.db.change_step(&project.id, Step::StaticScanned)?;
                self.db.pause(&project.id, PauseReason::NoStaticMatch)?;
            }
            ScanOutcome::Failed(code) => {
                warn!(project = %project.id, exit_code = code, "Scanner failed");
                self.db.set_exit_code(&project.id, code)?;
                self.db.change_step(&project.id, Step::StaticScanned)?;
                self.db.pause(&project.id, PauseReason::StaticScanFailed)?;
            }
        }
        Ok(PollOutcome::Worked)
    }
}
