//! Scoring worker: `local-verified` -> `cvss-ready`.
//!
//! Six of the eight base metrics are fixed by the vulnerability class
//! (arbitrary file read over HTTP); only attack vector and availability are
//! derived from the evidence the PoC stages recorded.

use async_trait::async_trait;
use tracing::info;

use crate::cvss::{AttackComplexity, AttackVector, Cvss, Impact, PrivilegesRequired, Scope, UserInteraction};
use crate::db::Database;
use crate::errors::PatrolError;
use crate::models::{DosStatus, Project, Step};
use crate::workers::{PollOutcome, Worker};

pub struct ScoringWorker {
    db: Database,
}

impl ScoringWorker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Metric selection for one verified project. Fails if either evidence
/// field is still unresolved.
pub fn score_project(project: &Project) -> Result<Cvss, PatrolError> {
    let is_local = project.is_local.ok_or_else(|| {
        PatrolError::IncompleteMetrics(format!("Project {} has no reachability scope", project.id))
    })?;
    let availability = match project.dos_status {
        DosStatus::Vulnerable => Impact::High,
        DosStatus::NotVulnerable => Impact::None,
        DosStatus::NotChecked => {
            return Err(PatrolError::IncompleteMetrics(format!(
                "Project {} has not been DoS-probed",
                project.id
            )))
        }
    };
    Ok(Cvss {
        av: Some(if is_local {
            AttackVector::Local
        } else {
            AttackVector::Network
        }),
        ac: Some(AttackComplexity::Low),
        pr: Some(PrivilegesRequired::None),
        ui: Some(UserInteraction::None),
        scope: Some(Scope::Unchanged),
        c: Some(Impact::High),
        i: Some(Impact::None),
        a: Some(availability),
    })
}

#[async_trait]
impl Worker for ScoringWorker {
    fn name(&self) -> &'static str {
        "scoring"
    }

    async fn poll_once(&self) -> Result<PollOutcome, PatrolError> {
        let Some(project) = self.db.fetch_next_unscored(Step::LocalVerified)? else {
            return Ok(PollOutcome::Idle);
        };

        let cvss = score_project(&project)?;
        let vector = cvss.vector_string()?;
        let score = cvss.base_score()?;
        let severity = cvss.severity()?;
        info!(project = %project.id, %vector, score, severity = severity.as_str(), "Scored");

        self.db
            .update_score(&project.id, &vector, score, severity.as_str())?;
        self.db.change_step(&project.id, Step::CvssReady)?;
        Ok(PollOutcome::Worked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(is_local: bool, dos: DosStatus) -> Database {
        let db = Database::in_memory().unwrap();
        db.create_project(
            "p1",
            "acme/webapp",
            "https://github.com/acme/webapp/blob/ab12cd/server.js",
            "server.js",
        )
        .unwrap();
        db.change_step("p1", Step::LocalVerified).unwrap();
        db.set_is_local("p1", is_local).unwrap();
        db.set_dos_status("p1", dos).unwrap();
        db
    }

    #[tokio::test]
    async fn test_network_no_dos_scores_7_5_high() {
        let db = seeded(false, DosStatus::NotVulnerable);
        let worker = ScoringWorker::new(db.clone());
        assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Worked);
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(p.step, Step::CvssReady);
        assert_eq!(
            p.vector_string.as_deref(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N")
        );
        assert_eq!(p.base_score, Some(7.5));
        assert_eq!(p.severity.as_deref(), Some("High"));
    }

    #[tokio::test]
    async fn test_network_with_dos_scores_critical() {
        let db = seeded(false, DosStatus::Vulnerable);
        ScoringWorker::new(db.clone()).poll_once().await.unwrap();
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(
            p.vector_string.as_deref(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:H")
        );
        assert_eq!(p.base_score, Some(9.1));
        assert_eq!(p.severity.as_deref(), Some("Critical"));
    }

    #[tokio::test]
    async fn test_local_only_scores_medium() {
        let db = seeded(true, DosStatus::NotVulnerable);
        ScoringWorker::new(db.clone()).poll_once().await.unwrap();
        let p = db.get_project("p1").unwrap().unwrap();
        assert_eq!(
            p.vector_string.as_deref(),
            Some("CVSS:3.1/AV:L/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N")
        );
        assert_eq!(p.base_score, Some(6.1));
        assert_eq!(p.severity.as_deref(), Some("Medium"));
    }

    #[tokio::test]
    async fn test_unprobed_projects_not_claimed() {
        let db = seeded(false, DosStatus::NotChecked);
        let worker = ScoringWorker::new(db.clone());
        assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    }

    #[test]
    fn test_unresolved_scope_is_an_error() {
        let db = seeded(false, DosStatus::NotVulnerable);
        let mut p = db.get_project("p1").unwrap().unwrap();
        p.is_local = None;
        assert!(score_project(&p).is_err());
    }
}
