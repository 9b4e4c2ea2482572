use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::SEMGREP_RULE;
use crate::errors::PatrolError;

/// Result of running the pattern engine over one candidate file.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// Engine ran; zero or more rule matches.
    Findings(Vec<Value>),
    /// Engine itself failed (non-zero exit or timeout).
    Failed(i32),
}

#[async_trait]
pub trait StaticScanner: Send + Sync {
    async fn scan(&self, file: &Path) -> Result<ScanOutcome, PatrolError>;
}

/// Runs semgrep with the fixed path-traversal rule and parses its JSON
/// output file.
pub struct SemgrepScanner {
    /// Where the JSON results land between run and parse.
    output_file: PathBuf,
    timeout_secs: u64,
}

impl SemgrepScanner {
    pub fn new(work_dir: &Path, timeout_secs: u64) -> Self {
        Self {
            output_file: work_dir.join("semgrep-out.json"),
            timeout_secs,
        }
    }
}

#[async_trait]
impl StaticScanner for SemgrepScanner {
    async fn scan(&self, file: &Path) -> Result<ScanOutcome, PatrolError> {
        let mut child = tokio::process::Command::new("semgrep")
            .arg(format!("--config={SEMGREP_RULE}"))
            .arg("--metrics=off")
            .arg("--json")
            .arg("--output")
            .arg(&self.output_file)
            .arg(file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PatrolError::Scanner(format!("Failed to spawn semgrep: {}", e)))?;

        let status =
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), child.wait()).await
            {
                Ok(waited) => waited
                    .map_err(|e| PatrolError::Scanner(format!("Wait on semgrep failed: {}", e)))?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Ok(ScanOutcome::Failed(crate::verifier::EXIT_TIMED_OUT));
                }
            };

        if !status.success() {
            return Ok(ScanOutcome::Failed(status.code().unwrap_or(1)));
        }

        let raw = std::fs::read_to_string(&self.output_file)
            .map_err(|e| PatrolError::Scanner(format!("Reading semgrep output failed: {}", e)))?;
        let parsed: Value = serde_json::from_str(&raw)?;
        let results = parsed["results"].as_array().cloned().unwrap_or_default();
        debug!(matches = results.len(), file = %file.display(), "Semgrep finished");
        Ok(ScanOutcome::Findings(results))
    }
}
