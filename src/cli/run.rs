//! Worker bootstrap shared by all six subcommands.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cli::commands::WorkerArgs;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::PatrolError;
use crate::fetch::HttpFetcher;
use crate::llm::OpenAiBackend;
use crate::lock::InstanceLock;
use crate::oracle::CodeqlOracle;
use crate::scan::SemgrepScanner;
use crate::verifier::ScriptVerifier;
use crate::workers::{
    run_worker_loop, DosWorker, LocalWorker, NetworkWorker, PatchWorker, ScoringWorker,
    StaticScanWorker, Worker,
};

pub enum WorkerKind {
    StaticScan,
    Network,
    Local,
    Dos,
    Scoring,
    Patch,
}

impl WorkerKind {
    fn lock_name(&self) -> &'static str {
        match self {
            WorkerKind::StaticScan => "static-scan",
            WorkerKind::Network => "network",
            WorkerKind::Local => "local",
            WorkerKind::Dos => "dos",
            WorkerKind::Scoring => "scoring",
            WorkerKind::Patch => "patcher",
        }
    }
}

pub async fn handle_worker(
    kind: WorkerKind,
    args: WorkerArgs,
    config_path: Option<String>,
) -> Result<(), PatrolError> {
    let settings = Settings::load(config_path.as_deref().map(std::path::Path::new))?;

    // One live instance per worker kind. A second copy is a no-op, not an
    // error; cron-style supervision relies on that.
    let Some(_lock) = InstanceLock::acquire(&settings.work_dir, kind.lock_name())? else {
        info!(worker = kind.lock_name(), "Already running, exiting");
        return Ok(());
    };

    let db = Database::new(&settings.db_path)?;

    let worker = build_worker(&kind, db, settings.clone())?;
    if args.once {
        worker.poll_once().await?;
        return Ok(());
    }
    run_worker_loop(
        worker.as_ref(),
        Duration::from_secs(settings.poll_interval_secs),
    )
    .await
}

fn build_worker(
    kind: &WorkerKind,
    db: Database,
    settings: Settings,
) -> Result<Box<dyn Worker>, PatrolError> {
    let verifier = Arc::new(ScriptVerifier::new(settings.scripts_dir.clone()));
    Ok(match kind {
        WorkerKind::StaticScan => {
            let scanner = Arc::new(SemgrepScanner::new(
                &settings.work_dir,
                settings.semgrep_timeout_secs,
            ));
            Box::new(StaticScanWorker::new(
                db,
                settings,
                scanner,
                Arc::new(HttpFetcher::new()),
            ))
        }
        WorkerKind::Network => Box::new(NetworkWorker::new(db, settings, verifier)),
        WorkerKind::Local => Box::new(LocalWorker::new(db, settings, verifier)),
        WorkerKind::Dos => Box::new(DosWorker::new(db, settings, verifier)),
        WorkerKind::Scoring => Box::new(ScoringWorker::new(db)),
        WorkerKind::Patch => {
            if settings.llm_api_key.is_empty() {
                return Err(PatrolError::Config(
                    "The patch worker needs an LLM API key (OPENAI_API_KEY)".into(),
                ));
            }
            let oracle = Arc::new(CodeqlOracle::new(settings.codeql_dir.clone()));
            let backend = Arc::new(OpenAiBackend::new(
                &settings.llm_api_key,
                &settings.llm_model,
                &settings.llm_base_url,
            ));
            Box::new(PatchWorker::new(
                db,
                settings,
                verifier,
                oracle,
                backend,
                Arc::new(HttpFetcher::new()),
            ))
        }
    })
}
