use serde::{Deserialize, Serialize};

use crate::errors::PatrolError;

/// One tracked (repository, vulnerable file) pair moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// GitHub `owner/repo` name.
    pub repo_name: String,
    /// URL of the candidate vulnerable file (blob or HEAD form).
    pub file_url: String,
    pub filename: String,
    pub step: Step,
    pub pause_reason: Option<PauseReason>,
    /// None until a PoC stage resolves reachability scope.
    pub is_local: Option<bool>,
    pub dos_status: DosStatus,
    pub run_method: Option<RunMethod>,
    /// Last successful exploit payload path fragment.
    pub poc: Option<String>,
    pub vector_string: Option<String>,
    pub base_score: Option<f64>,
    pub severity: Option<String>,
    pub llm_try_count: u32,
    pub stars: i64,
    pub pull_request_url: Option<String>,
}

impl Project {
    /// `https://github.com/{owner}/{repo}` link handed to the verifier scripts.
    pub fn github_link(&self) -> String {
        format!("https://github.com/{}", self.repo_name)
    }
}

/// Pipeline stages, in order. A project occupies exactly one at a time and
/// only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Cloned,
    StaticScanning,
    StaticScanned,
    NetworkVerified,
    LocalVerified,
    CvssReady,
    PatchReady,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Cloned,
        Step::StaticScanning,
        Step::StaticScanned,
        Step::NetworkVerified,
        Step::LocalVerified,
        Step::CvssReady,
        Step::PatchReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Cloned => "cloned",
            Step::StaticScanning => "static-scanning",
            Step::StaticScanned => "static-scanned",
            Step::NetworkVerified => "network-verified",
            Step::LocalVerified => "local-verified",
            Step::CvssReady => "cvss-ready",
            Step::PatchReady => "patch-ready",
        }
    }

    pub fn parse(s: &str) -> Result<Step, PatrolError> {
        match s {
            "cloned" => Ok(Step::Cloned),
            "static-scanning" => Ok(Step::StaticScanning),
            "static-scanned" => Ok(Step::StaticScanned),
            "network-verified" => Ok(Step::NetworkVerified),
            "local-verified" => Ok(Step::LocalVerified),
            "cvss-ready" => Ok(Step::CvssReady),
            "patch-ready" => Ok(Step::PatchReady),
            other => Err(PatrolError::InvalidValue(format!("unknown step '{other}'"))),
        }
    }

    /// Position in the stage ordering, used by the store's monotonicity guard.
    pub fn position(&self) -> usize {
        Step::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a project is excluded from further automatic processing. Persisted and
/// queryable; expected negative outcomes are data, not errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PauseReason {
    NoStaticMatch,
    StaticScanFailed,
    StartFailed,
    NoOpenPort,
    NotReachable,
    NotLocallyVulnerable,
    TargetSinceFixed,
    TargetBuggy,
    CodeDeleted,
    RunMethodInvalid,
    PatchValidationExhausted,
    AlreadyReported,
    FixAlreadyExists,
    GithubApiError,
    UnknownExitCode,
    UnexpectedError,
}

impl PauseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseReason::NoStaticMatch => "no-static-match",
            PauseReason::StaticScanFailed => "static-scan-failed",
            PauseReason::StartFailed => "start-failed",
            PauseReason::NoOpenPort => "no-open-port",
            PauseReason::NotReachable => "not-reachable",
            PauseReason::NotLocallyVulnerable => "not-locally-vulnerable",
            PauseReason::TargetSinceFixed => "target-since-fixed",
            PauseReason::TargetBuggy => "target-buggy",
            PauseReason::CodeDeleted => "code-deleted",
            PauseReason::RunMethodInvalid => "run-method-invalid",
            PauseReason::PatchValidationExhausted => "patch-validation-exhausted",
            PauseReason::AlreadyReported => "already-reported",
            PauseReason::FixAlreadyExists => "fix-already-exists",
            PauseReason::GithubApiError => "github-api-error",
            PauseReason::UnknownExitCode => "unknown-exit-code",
            PauseReason::UnexpectedError => "unexpected-error",
        }
    }

    pub fn parse(s: &str) -> Result<PauseReason, PatrolError> {
        match s {
            "no-static-match" => Ok(PauseReason::NoStaticMatch),
            "static-scan-failed" => Ok(PauseReason::StaticScanFailed),
            "start-failed" => Ok(PauseReason::StartFailed),
            "no-open-port" => Ok(PauseReason::NoOpenPort),
            "not-reachable" => Ok(PauseReason::NotReachable),
            "not-locally-vulnerable" => Ok(PauseReason::NotLocallyVulnerable),
            "target-since-fixed" => Ok(PauseReason::TargetSinceFixed),
            "target-buggy" => Ok(PauseReason::TargetBuggy),
            "code-deleted" => Ok(PauseReason::CodeDeleted),
            "run-method-invalid" => Ok(PauseReason::RunMethodInvalid),
            "patch-validation-exhausted" => Ok(PauseReason::PatchValidationExhausted),
            "already-reported" => Ok(PauseReason::AlreadyReported),
            "fix-already-exists" => Ok(PauseReason::FixAlreadyExists),
            "github-api-error" => Ok(PauseReason::GithubApiError),
            "unknown-exit-code" => Ok(PauseReason::UnknownExitCode),
            "unexpected-error" => Ok(PauseReason::UnexpectedError),
            other => Err(PatrolError::InvalidValue(format!(
                "unknown pause reason '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state DoS verification result. Must leave `NotChecked` before scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DosStatus {
    NotChecked,
    Vulnerable,
    NotVulnerable,
}

impl DosStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DosStatus::NotChecked => "not-checked",
            DosStatus::Vulnerable => "vulnerable",
            DosStatus::NotVulnerable => "not-vulnerable",
        }
    }

    pub fn parse(s: &str) -> Result<DosStatus, PatrolError> {
        match s {
            "not-checked" => Ok(DosStatus::NotChecked),
            "vulnerable" => Ok(DosStatus::Vulnerable),
            "not-vulnerable" => Ok(DosStatus::NotVulnerable),
            other => Err(PatrolError::InvalidValue(format!(
                "unknown dos status '{other}'"
            ))),
        }
    }
}

/// How the verifier scripts start the target server process. The values match
/// what the scripts write to the run-method side file; anything else is
/// rejected at the boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMethod {
    /// `node <file>` on the bare checkout.
    Node,
    /// `npm install` first, then `node <file>`.
    NodeInstalled,
    /// Package script entry point (`yarn start`).
    YarnStart,
}

impl RunMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMethod::Node => "node",
            RunMethod::NodeInstalled => "node_installed",
            RunMethod::YarnStart => "yarn_start",
        }
    }

    pub fn parse(s: &str) -> Result<RunMethod, PatrolError> {
        match s.trim() {
            "node" => Ok(RunMethod::Node),
            "node_installed" => Ok(RunMethod::NodeInstalled),
            "yarn_start" => Ok(RunMethod::YarnStart),
            other => Err(PatrolError::InvalidValue(format!(
                "unknown run method '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::parse(step.as_str()).unwrap(), step);
        }
    }

    #[test]
    fn test_step_ordering_positions() {
        assert!(Step::Cloned.position() < Step::StaticScanned.position());
        assert!(Step::NetworkVerified.position() < Step::LocalVerified.position());
        assert!(Step::CvssReady.position() < Step::PatchReady.position());
    }

    #[test]
    fn test_unknown_step_rejected() {
        assert!(Step::parse("semgrepped").is_err());
    }

    #[test]
    fn test_pause_reason_round_trip() {
        for reason in [
            PauseReason::NoStaticMatch,
            PauseReason::NotReachable,
            PauseReason::PatchValidationExhausted,
            PauseReason::UnknownExitCode,
        ] {
            assert_eq!(PauseReason::parse(reason.as_str()).unwrap(), reason);
        }
    }

    #[test]
    fn test_run_method_rejects_unknown_value() {
        assert!(RunMethod::parse("docker_compose").is_err());
        assert_eq!(RunMethod::parse(" node\n").unwrap(), RunMethod::Node);
    }

    #[test]
    fn test_dos_status_parse() {
        assert_eq!(DosStatus::parse("not-checked").unwrap(), DosStatus::NotChecked);
        assert!(DosStatus::parse("maybe").is_err());
    }
}
