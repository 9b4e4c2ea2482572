//! Static-analysis regression oracle.
//!
//! Counts occurrences of the recognized protective pattern in a single
//! source file. The patch loop accepts a candidate only when this count
//! strictly increases, so a patch cannot pass by merely silencing the
//! dynamic check.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::errors::PatrolError;

#[async_trait]
pub trait RegressionOracle: Send + Sync {
    /// Number of recognized safe patterns in `file`. Idempotent for
    /// identical input.
    async fn count_safe_patterns(&self, file: &Path) -> Result<u32, PatrolError>;
}

/// CodeQL-backed implementation: stages the file into a scratch source dir,
/// builds a single-file JavaScript database, runs the sanitize-pattern
/// query, and parses the row count out of `codeql bqrs info`.
pub struct CodeqlOracle {
    codeql_dir: PathBuf,
}

impl CodeqlOracle {
    pub fn new(codeql_dir: PathBuf) -> Self {
        Self { codeql_dir }
    }

    fn stage_file(&self, file: &Path) -> Result<PathBuf, PatrolError> {
        let code_dir = self.codeql_dir.join("code");
        let db_dir = self.codeql_dir.join("db");
        for dir in [&code_dir, &db_dir] {
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        std::fs::create_dir_all(&code_dir)?;

        // The extractor keys on the extension; captured snippets sometimes
        // arrive without one.
        let mut name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snippet")
            .to_string();
        if !(name.ends_with(".js") || name.ends_with(".ts")) {
            name.push_str(".ts");
        }
        let staged = code_dir.join(name);
        std::fs::copy(file, &staged)?;
        Ok(staged)
    }

    async fn run_codeql(&self, args: &[&str]) -> Result<std::process::Output, PatrolError> {
        tokio::process::Command::new("codeql")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PatrolError::Oracle(format!("Failed to run codeql: {}", e)))
    }
}

/// Pull the row count out of `codeql bqrs info` output.
pub fn parse_result_rows(bqrs_info: &str) -> Result<u32, PatrolError> {
    let re = Regex::new(r"select has ([0-9]+) rows").unwrap();
    let caps = re
        .captures(bqrs_info)
        .ok_or_else(|| PatrolError::Oracle("No 'select has N rows' in bqrs info".into()))?;
    caps[1]
        .parse::<u32>()
        .map_err(|e| PatrolError::Oracle(format!("Bad row count: {}", e)))
}

#[async_trait]
impl RegressionOracle for CodeqlOracle {
    async fn count_safe_patterns(&self, file: &Path) -> Result<u32, PatrolError> {
        self.stage_file(file)?;
        let db = self.codeql_dir.join("db");
        let code = self.codeql_dir.join("code");
        let query = self.codeql_dir.join("querypack").join("query-only-sanitize.ql");
        let out = self.codeql_dir.join("out.bqrs");

        let create = self
            .run_codeql(&[
                "database",
                "create",
                db.to_str().unwrap_or_default(),
                "-s",
                code.to_str().unwrap_or_default(),
                "-l",
                "javascript",
                "--overwrite",
            ])
            .await?;
        if !create.status.success() {
            return Err(PatrolError::Oracle(format!(
                "codeql database create exited {}",
                create.status.code().unwrap_or(-1)
            )));
        }

        let run = self
            .run_codeql(&[
                "query",
                "run",
                "-d",
                db.to_str().unwrap_or_default(),
                query.to_str().unwrap_or_default(),
                "-o",
                out.to_str().unwrap_or_default(),
            ])
            .await?;
        if !run.status.success() {
            return Err(PatrolError::Oracle(format!(
                "codeql query run exited {}",
                run.status.code().unwrap_or(-1)
            )));
        }

        let info = self
            .run_codeql(&["bqrs", "info", out.to_str().unwrap_or_default()])
            .await?;
        let stdout = String::from_utf8_lossy(&info.stdout);
        let rows = parse_result_rows(&stdout)?;
        debug!(file = %file.display(), rows, "Regression oracle count");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result_rows() {
        let info = "Result sets:\n  select has 3 rows, 2 columns\n";
        assert_eq!(parse_result_rows(info).unwrap(), 3);
    }

    #[test]
    fn test_parse_zero_rows() {
        assert_eq!(parse_result_rows("select has 0 rows").unwrap(), 0);
    }

    #[test]
    fn test_parse_missing_count_is_error() {
        assert!(parse_result_rows("no result sets").is_err());
    }
}
