use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::errors::PatrolError;

/// Exit code reported when the wall-clock timeout fires. Matches what
/// coreutils `timeout` would have produced; downstream tables treat it like
/// any other verification failure.
pub const EXIT_TIMED_OUT: i32 = 124;

/// The external verification scripts. One variant per script so call sites
/// cannot drift from the deployed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyScript {
    Network,
    Local,
    Dos,
    LocalVerify,
}

impl VerifyScript {
    pub fn file_name(&self) -> &'static str {
        match self {
            VerifyScript::Network => "run-network.sh",
            VerifyScript::Local => "run-local.sh",
            VerifyScript::Dos => "run-dos.sh",
            VerifyScript::LocalVerify => "run-local-verify.sh",
        }
    }
}

/// One verifier invocation. The token names the sandbox container; it must
/// not collide across concurrently-running invocations.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub repo_url: String,
    pub exec_path: String,
    pub run_token: String,
    pub patch_file: Option<PathBuf>,
}

impl VerifyRequest {
    pub fn new(repo_url: &str, exec_path: &str) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            exec_path: exec_path.to_string(),
            run_token: run_token(),
            patch_file: None,
        }
    }

    pub fn with_patch(mut self, patch_file: PathBuf) -> Self {
        self.patch_file = Some(patch_file);
        self
    }
}

/// Fresh 8-hex-char sandbox token.
pub fn run_token() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

/// Capability interface over the verification scripts. The stage workers and
/// the patch loop only ever see exit codes through this seam, which is what
/// lets the state machine be tested against scripted fakes.
#[async_trait]
pub trait ExternalVerifier: Send + Sync {
    /// Run `script` to completion, bounded by `timeout_secs`, and return its
    /// exit code. A timeout yields [`EXIT_TIMED_OUT`], never an error.
    async fn verify(
        &self,
        script: VerifyScript,
        req: &VerifyRequest,
        timeout_secs: u64,
    ) -> Result<i32, PatrolError>;
}

/// Real implementation: spawns `bash <script> <repo> <exec_path> <token>
/// [patch]` from the configured scripts directory.
pub struct ScriptVerifier {
    scripts_dir: PathBuf,
}

impl ScriptVerifier {
    pub fn new(scripts_dir: PathBuf) -> Self {
        Self { scripts_dir }
    }
}

#[async_trait]
impl ExternalVerifier for ScriptVerifier {
    async fn verify(
        &self,
        script: VerifyScript,
        req: &VerifyRequest,
        timeout_secs: u64,
    ) -> Result<i32, PatrolError> {
        let script_path = self.scripts_dir.join(script.file_name());
        let mut cmd = tokio::process::Command::new("bash");
        cmd.arg(&script_path)
            .arg(&req.repo_url)
            .arg(&req.exec_path)
            .arg(&req.run_token)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(patch) = &req.patch_file {
            cmd.arg(patch);
        }

        debug!(
            script = script.file_name(),
            repo = %req.repo_url,
            token = %req.run_token,
            timeout_secs,
            "Invoking verifier"
        );

        let mut child = cmd.spawn().map_err(|e| {
            PatrolError::Verifier(format!("Failed to spawn {}: {}", script_path.display(), e))
        })?;

        let status = match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait())
            .await
        {
            Ok(waited) => waited
                .map_err(|e| PatrolError::Verifier(format!("Wait on verifier failed: {}", e)))?,
            Err(_) => {
                warn!(
                    script = script.file_name(),
                    token = %req.run_token,
                    timeout_secs,
                    "Verifier timed out, killing"
                );
                let _ = child.kill().await;
                return Ok(EXIT_TIMED_OUT);
            }
        };

        // Signal-terminated scripts have no code; fold into the timeout
        // bucket since both mean "did not finish on its own terms".
        Ok(status.code().unwrap_or(EXIT_TIMED_OUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_token_format() {
        let token = run_token();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_run_tokens_distinct() {
        // Collision over a handful of draws would indicate a broken RNG, not
        // bad luck
        let tokens: std::collections::HashSet<String> = (0..64).map(|_| run_token()).collect();
        assert!(tokens.len() > 60);
    }

    #[tokio::test]
    async fn test_script_verifier_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run-network.sh"), "exit 5\n").unwrap();

        let verifier = ScriptVerifier::new(dir.path().to_path_buf());
        let req = VerifyRequest::new("https://github.com/acme/webapp", "/usr/src/app/a.js");
        let code = verifier.verify(VerifyScript::Network, &req, 10).await.unwrap();
        assert_eq!(code, 5);
    }

    #[tokio::test]
    async fn test_script_verifier_timeout_yields_distinguished_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run-dos.sh"), "sleep 30\n").unwrap();

        let verifier = ScriptVerifier::new(dir.path().to_path_buf());
        let req = VerifyRequest::new("https://github.com/acme/webapp", "/usr/src/app/a.js");
        let code = verifier.verify(VerifyScript::Dos, &req, 1).await.unwrap();
        assert_eq!(code, EXIT_TIMED_OUT);
    }

    #[tokio::test]
    async fn test_patch_file_passed_as_extra_arg() {
        let dir = tempfile::tempdir().unwrap();
        // Exit 7 only when a fourth argument is present
        std::fs::write(
            dir.path().join("run-local-verify.sh"),
            "if [ -n \"$4\" ]; then exit 7; fi\nexit 0\n",
        )
        .unwrap();

        let verifier = ScriptVerifier::new(dir.path().to_path_buf());
        let bare = VerifyRequest::new("https://github.com/acme/webapp", "/usr/src/app/a.js");
        assert_eq!(
            verifier
                .verify(VerifyScript::LocalVerify, &bare, 10)
                .await
                .unwrap(),
            0
        );

        let patched = bare.with_patch(dir.path().join("x.patch"));
        assert_eq!(
            verifier
                .verify(VerifyScript::LocalVerify, &patched, 10)
                .await
                .unwrap(),
            7
        );
    }
}
