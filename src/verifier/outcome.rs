//! Table-driven exit-code interpretation, one closed enum per stage.
//!
//! Every table carries an `Unknown` catch-all so an unmapped code is a
//! visible, persisted outcome rather than a silent null.

/// Network PoC stage (`run-network.sh`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOutcome {
    /// Exploit reproduced over the network.
    Vulnerable,
    /// Target's start command failed.
    StartFailed,
    /// Server came up but opened no port.
    NoOpenPort,
    /// Server ran but the exploit did not reproduce.
    NotReachable,
    Unknown(i32),
}

impl NetworkOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => NetworkOutcome::Vulnerable,
            3 => NetworkOutcome::StartFailed,
            4 => NetworkOutcome::NoOpenPort,
            5 => NetworkOutcome::NotReachable,
            other => NetworkOutcome::Unknown(other),
        }
    }
}

/// Local PoC stage (`run-local.sh`). Anything non-zero is a plain negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Vulnerable,
    NotVulnerable(i32),
}

impl LocalOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => LocalOutcome::Vulnerable,
            other => LocalOutcome::NotVulnerable(other),
        }
    }
}

/// DoS stage (`run-dos.sh`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosOutcome {
    Vulnerable,
    NotVulnerable(i32),
}

impl DosOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => DosOutcome::Vulnerable,
            other => DosOutcome::NotVulnerable(other),
        }
    }
}

/// Pre-patch re-verification (`run-local-verify.sh` without a patch). The
/// patch loop only proceeds when the target is still exploitable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverifyOutcome {
    StillVulnerable,
    /// Target was fixed upstream since ingestion.
    SinceFixed,
    /// Target is broken independent of any patch.
    TargetBroken,
    /// The vulnerable code is no longer present.
    CodeDeleted,
    Unknown(i32),
}

impl ReverifyOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => ReverifyOutcome::StillVulnerable,
            5 => ReverifyOutcome::SinceFixed,
            7 => ReverifyOutcome::TargetBroken,
            8 => ReverifyOutcome::CodeDeleted,
            other => ReverifyOutcome::Unknown(other),
        }
    }
}

/// Patch validation (`run-local-verify.sh` with the candidate patch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchVerdict {
    /// Exploit no longer reproduces; candidate accepted pending the
    /// regression-oracle and run-method gates.
    Fixed,
    TargetBroken,
    CodeDeleted,
    /// Patch did not stop the exploit (or broke the run); retry.
    StillVulnerable(i32),
}

impl PatchVerdict {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            5 => PatchVerdict::Fixed,
            7 => PatchVerdict::TargetBroken,
            8 => PatchVerdict::CodeDeleted,
            other => PatchVerdict::StillVulnerable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::gateway::EXIT_TIMED_OUT;

    #[test]
    fn test_network_table() {
        assert_eq!(NetworkOutcome::from_exit_code(0), NetworkOutcome::Vulnerable);
        assert_eq!(NetworkOutcome::from_exit_code(3), NetworkOutcome::StartFailed);
        assert_eq!(NetworkOutcome::from_exit_code(4), NetworkOutcome::NoOpenPort);
        assert_eq!(NetworkOutcome::from_exit_code(5), NetworkOutcome::NotReachable);
        assert_eq!(NetworkOutcome::from_exit_code(99), NetworkOutcome::Unknown(99));
    }

    #[test]
    fn test_timeout_maps_to_failure_not_success() {
        assert_eq!(
            NetworkOutcome::from_exit_code(EXIT_TIMED_OUT),
            NetworkOutcome::Unknown(EXIT_TIMED_OUT)
        );
        assert_eq!(
            LocalOutcome::from_exit_code(EXIT_TIMED_OUT),
            LocalOutcome::NotVulnerable(EXIT_TIMED_OUT)
        );
        assert_eq!(
            PatchVerdict::from_exit_code(EXIT_TIMED_OUT),
            PatchVerdict::StillVulnerable(EXIT_TIMED_OUT)
        );
    }

    #[test]
    fn test_reverify_table() {
        assert_eq!(
            ReverifyOutcome::from_exit_code(0),
            ReverifyOutcome::StillVulnerable
        );
        assert_eq!(ReverifyOutcome::from_exit_code(5), ReverifyOutcome::SinceFixed);
        assert_eq!(ReverifyOutcome::from_exit_code(7), ReverifyOutcome::TargetBroken);
        assert_eq!(ReverifyOutcome::from_exit_code(8), ReverifyOutcome::CodeDeleted);
        assert_eq!(ReverifyOutcome::from_exit_code(1), ReverifyOutcome::Unknown(1));
    }

    #[test]
    fn test_patch_verdict_table() {
        assert_eq!(PatchVerdict::from_exit_code(5), PatchVerdict::Fixed);
        assert_eq!(PatchVerdict::from_exit_code(7), PatchVerdict::TargetBroken);
        assert_eq!(PatchVerdict::from_exit_code(8), PatchVerdict::CodeDeleted);
        assert_eq!(PatchVerdict::from_exit_code(0), PatchVerdict::StillVulnerable(0));
        assert_eq!(PatchVerdict::from_exit_code(1), PatchVerdict::StillVulnerable(1));
    }

    #[test]
    fn test_dos_table() {
        assert_eq!(DosOutcome::from_exit_code(0), DosOutcome::Vulnerable);
        assert_eq!(DosOutcome::from_exit_code(2), DosOutcome::NotVulnerable(2));
    }
}
