use chrono::Utc;
use rusqlite::params;

use super::Database;
use crate::errors::PatrolError;
use crate::models::{DosStatus, PauseReason, Project, RunMethod, Step};

const PROJECT_COLUMNS: &str = "id, repo_name, file_url, filename, step, pause_reason, is_local, \
     dos_status, run_method, poc, vector_string, base_score, severity, \
     llm_try_count, stars, pull_request_url";

/// Raw row image; enum text is validated after the rusqlite mapper so that an
/// unrecognized stored value surfaces as a database error, not a panic.
struct RawProject {
    id: String,
    repo_name: String,
    file_url: String,
    filename: String,
    step: String,
    pause_reason: Option<String>,
    is_local: Option<i64>,
    dos_status: String,
    run_method: Option<String>,
    poc: Option<String>,
    vector_string: Option<String>,
    base_score: Option<f64>,
    severity: Option<String>,
    llm_try_count: i64,
    stars: i64,
    pull_request_url: Option<String>,
}

fn map_raw(row: &rusqlite::Row) -> Result<RawProject, rusqlite::Error> {
    Ok(RawProject {
        id: row.get(0)?,
        repo_name: row.get(1)?,
        file_url: row.get(2)?,
        filename: row.get(3)?,
        step: row.get(4)?,
        pause_reason: row.get(5)?,
        is_local: row.get(6)?,
        dos_status: row.get(7)?,
        run_method: row.get(8)?,
        poc: row.get(9)?,
        vector_string: row.get(10)?,
        base_score: row.get(11)?,
        severity: row.get(12)?,
        llm_try_count: row.get(13)?,
        stars: row.get(14)?,
        pull_request_url: row.get(15)?,
    })
}

impl TryFrom<RawProject> for Project {
    type Error = PatrolError;

    fn try_from(raw: RawProject) -> Result<Self, Self::Error> {
        Ok(Project {
            step: Step::parse(&raw.step)?,
            pause_reason: raw.pause_reason.as_deref().map(PauseReason::parse).transpose()?,
            dos_status: DosStatus::parse(&raw.dos_status)?,
            run_method: raw.run_method.as_deref().map(RunMethod::parse).transpose()?,
            id: raw.id,
            repo_name: raw.repo_name,
            file_url: raw.file_url,
            filename: raw.filename,
            is_local: raw.is_local.map(|v| v != 0),
            poc: raw.poc,
            vector_string: raw.vector_string,
            base_score: raw.base_score,
            severity: raw.severity,
            llm_try_count: raw.llm_try_count as u32,
            stars: raw.stars,
            pull_request_url: raw.pull_request_url,
        })
    }
}

impl Database {
    pub fn create_project(
        &self,
        id: &str,
        repo_name: &str,
        file_url: &str,
        filename: &str,
    ) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO projects (id, repo_name, file_url, filename, step, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'cloned', ?5, ?5)",
            params![id, repo_name, file_url, filename, now],
        )
        .map_err(|e| PatrolError::Database(format!("Failed to create project: {}", e)))?;
        Ok(())
    }

    fn fetch_one(
        &self,
        where_clause: &str,
        bind: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<Project>, PatrolError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE {where_clause} \
             ORDER BY created_at ASC LIMIT 1"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PatrolError::Database(format!("Query failed: {}", e)))?;
        let raw = match stmt.query_row(bind, map_raw) {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(PatrolError::Database(format!("Query error: {}", e))),
        };
        Ok(Some(raw.try_into()?))
    }

    /// Oldest unpaused project at `step`, or None. This is the polling
    /// primitive every stage worker is built on; paused projects are never
    /// returned.
    pub fn fetch_next_at_step(&self, step: Step) -> Result<Option<Project>, PatrolError> {
        self.fetch_one("step = ?1 AND pause_reason IS NULL", &[&step.as_str()])
    }

    /// Oldest project at `step` carrying exactly `reason`, for stages that
    /// resume paused work.
    pub fn fetch_next_at_step_with_pause_reason(
        &self,
        step: Step,
        reason: PauseReason,
    ) -> Result<Option<Project>, PatrolError> {
        self.fetch_one(
            "step = ?1 AND pause_reason = ?2",
            &[&step.as_str(), &reason.as_str()],
        )
    }

    pub fn fetch_next_at_step_with_dos_status(
        &self,
        step: Step,
        dos: DosStatus,
    ) -> Result<Option<Project>, PatrolError> {
        self.fetch_one(
            "step = ?1 AND pause_reason IS NULL AND dos_status = ?2",
            &[&step.as_str(), &dos.as_str()],
        )
    }

    /// Oldest project at `step` with locality and DoS status resolved but no
    /// base score yet.
    pub fn fetch_next_unscored(&self, step: Step) -> Result<Option<Project>, PatrolError> {
        self.fetch_one(
            "step = ?1 AND pause_reason IS NULL AND base_score IS NULL \
             AND is_local IS NOT NULL AND dos_status != 'not-checked'",
            &[&step.as_str()],
        )
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>, PatrolError> {
        self.fetch_one("id = ?1", &[&id])
    }

    /// Advance a project to `new_step`. Steps only move forward: a backward
    /// or same-step write is rejected.
    pub fn change_step(&self, id: &str, new_step: Step) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        let current: String = conn
            .query_row("SELECT step FROM projects WHERE id = ?1", params![id], |r| {
                r.get(0)
            })
            .map_err(|e| PatrolError::Database(format!("Project {} not found: {}", id, e)))?;
        let current = Step::parse(&current)?;
        if new_step.position() <= current.position() {
            return Err(PatrolError::Database(format!(
                "Refusing non-forward step change for {}: {} -> {}",
                id, current, new_step
            )));
        }
        conn.execute(
            "UPDATE projects SET step = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, new_step.as_str(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| PatrolError::Database(format!("Step update failed: {}", e)))?;
        Ok(())
    }

    pub fn pause(&self, id: &str, reason: PauseReason) -> Result<(), PatrolError> {
        self.set_text_field(id, "pause_reason", Some(reason.as_str()))
    }

    pub fn clear_pause(&self, id: &str) -> Result<(), PatrolError> {
        self.set_text_field(id, "pause_reason", None)
    }

    pub fn set_is_local(&self, id: &str, is_local: bool) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE projects SET is_local = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, is_local as i64, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PatrolError::Database(format!("Update failed: {}", e)))?;
        Ok(())
    }

    pub fn set_dos_status(&self, id: &str, dos: DosStatus) -> Result<(), PatrolError> {
        self.set_text_field(id, "dos_status", Some(dos.as_str()))
    }

    pub fn set_run_method(&self, id: &str, method: RunMethod) -> Result<(), PatrolError> {
        self.set_text_field(id, "run_method", Some(method.as_str()))
    }

    pub fn set_poc(&self, id: &str, poc: &str) -> Result<(), PatrolError> {
        self.set_text_field(id, "poc", Some(poc))
    }

    pub fn save_scan_matches(&self, id: &str, matches_json: &str) -> Result<(), PatrolError> {
        self.set_text_field(id, "scan_matches", Some(matches_json))
    }

    /// Last unexpected verifier exit code, kept for diagnosis.
    pub fn set_exit_code(&self, id: &str, code: i32) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE projects SET exit_code = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, code, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PatrolError::Database(format!("Update failed: {}", e)))?;
        Ok(())
    }

    pub fn update_score(
        &self,
        id: &str,
        vector_string: &str,
        base_score: f64,
        severity: &str,
    ) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE projects SET vector_string = ?2, base_score = ?3, severity = ?4, \
             updated_at = ?5 WHERE id = ?1",
            params![id, vector_string, base_score, severity, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PatrolError::Database(format!("Score update failed: {}", e)))?;
        Ok(())
    }

    pub fn llm_try_count(&self, id: &str) -> Result<u32, PatrolError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT llm_try_count FROM projects WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .map_err(|e| PatrolError::Database(format!("Query error: {}", e)))?;
        Ok(count as u32)
    }

    /// `llm_try_count` is monotone: the counter survives process restarts and
    /// a lower write would reopen spent budget.
    pub fn set_llm_try_count(&self, id: &str, count: u32) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn
            .execute(
                "UPDATE projects SET llm_try_count = ?2, updated_at = ?3 \
                 WHERE id = ?1 AND llm_try_count <= ?2",
                params![id, count as i64, Utc::now().to_rfc3339()],
            )
            .map_err(|e| PatrolError::Database(format!("Update failed: {}", e)))?;
        if affected == 0 {
            return Err(PatrolError::Database(format!(
                "Refusing to decrease llm_try_count for {} to {}",
                id, count
            )));
        }
        Ok(())
    }

    pub fn record_timing(&self, id: &str, label: &str, duration_ms: u64) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO timings (project_id, label, duration_ms, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![id, label, duration_ms as i64, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PatrolError::Database(format!("Timing insert failed: {}", e)))?;
        Ok(())
    }

    /// Per-step project counts, split into active and paused. Feeds the
    /// `status` subcommand.
    pub fn step_counts(&self) -> Result<Vec<(String, i64, i64)>, PatrolError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT step, \
                 SUM(CASE WHEN pause_reason IS NULL THEN 1 ELSE 0 END), \
                 SUM(CASE WHEN pause_reason IS NOT NULL THEN 1 ELSE 0 END) \
                 FROM projects GROUP BY step",
            )
            .map_err(|e| PatrolError::Database(format!("Query failed: {}", e)))?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get(1)?, r.get(2)?)))
            .map_err(|e| PatrolError::Database(format!("Query error: {}", e)))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| PatrolError::Database(format!("Row error: {}", e)))?);
        }
        Ok(result)
    }

    fn set_text_field(
        &self,
        id: &str,
        column: &'static str,
        value: Option<&str>,
    ) -> Result<(), PatrolError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("UPDATE projects SET {column} = ?2, updated_at = ?3 WHERE id = ?1");
        conn.execute(&sql, params![id, value, Utc::now().to_rfc3339()])
            .map_err(|e| PatrolError::Database(format!("Update failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(db: &Database, id: &str) {
        db.create_project(
            id,
            "acme/webapp",
            "https://github.com/acme/webapp/blob/abc123/server.js",
            "server.js",
        )
        .unwrap();
    }

    #[test]
    fn test_create_and_fetch_at_step() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");

        let proj = db.fetch_next_at_step(Step::Cloned).unwrap().unwrap();
        assert_eq!(proj.id, "p1");
        assert_eq!(proj.step, Step::Cloned);
        assert_eq!(proj.dos_status, DosStatus::NotChecked);
        assert_eq!(proj.llm_try_count, 0);
        assert!(proj.is_local.is_none());
        assert_eq!(proj.github_link(), "https://github.com/acme/webapp");
    }

    #[test]
    fn test_fetch_returns_oldest_first() {
        let db = Database::in_memory().unwrap();
        {
            // created_at has second resolution in rfc3339; force distinct stamps
            let conn = db.conn.lock().unwrap();
            conn.execute_batch(
                "INSERT INTO projects (id, repo_name, file_url, filename, created_at, updated_at) \
                 VALUES ('old', 'a/a', 'u', 'f', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z'), \
                        ('new', 'b/b', 'u', 'f', '2024-06-01T00:00:00Z', '2024-06-01T00:00:00Z');",
            )
            .unwrap();
        }
        let proj = db.fetch_next_at_step(Step::Cloned).unwrap().unwrap();
        assert_eq!(proj.id, "old");
    }

    #[test]
    fn test_paused_project_never_polled() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.pause("p1", PauseReason::NoStaticMatch).unwrap();

        assert!(db.fetch_next_at_step(Step::Cloned).unwrap().is_none());

        db.clear_pause("p1").unwrap();
        assert!(db.fetch_next_at_step(Step::Cloned).unwrap().is_some());
    }

    #[test]
    fn test_fetch_by_pause_reason() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        seed(&db, "p2");
        db.change_step("p1", Step::StaticScanned).unwrap();
        db.change_step("p2", Step::StaticScanned).unwrap();
        db.pause("p1", PauseReason::NotReachable).unwrap();
        db.pause("p2", PauseReason::NoOpenPort).unwrap();

        let proj = db
            .fetch_next_at_step_with_pause_reason(Step::StaticScanned, PauseReason::NotReachable)
            .unwrap()
            .unwrap();
        assert_eq!(proj.id, "p1");
    }

    #[test]
    fn test_fetch_by_dos_status() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.change_step("p1", Step::LocalVerified).unwrap();

        assert!(db
            .fetch_next_at_step_with_dos_status(Step::LocalVerified, DosStatus::NotChecked)
            .unwrap()
            .is_some());

        db.set_dos_status("p1", DosStatus::NotVulnerable).unwrap();
        assert!(db
            .fetch_next_at_step_with_dos_status(Step::LocalVerified, DosStatus::NotChecked)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_fetch_unscored_requires_resolved_inputs() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.change_step("p1", Step::LocalVerified).unwrap();

        // DoS unresolved, locality unresolved: not eligible
        assert!(db.fetch_next_unscored(Step::LocalVerified).unwrap().is_none());

        db.set_is_local("p1", true).unwrap();
        assert!(db.fetch_next_unscored(Step::LocalVerified).unwrap().is_none());

        db.set_dos_status("p1", DosStatus::Vulnerable).unwrap();
        assert!(db.fetch_next_unscored(Step::LocalVerified).unwrap().is_some());

        db.update_score("p1", "CVSS:3.1/...", 7.5, "High").unwrap();
        assert!(db.fetch_next_unscored(Step::LocalVerified).unwrap().is_none());
    }

    #[test]
    fn test_step_only_moves_forward() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.change_step("p1", Step::StaticScanning).unwrap();
        db.change_step("p1", Step::StaticScanned).unwrap();

        assert!(db.change_step("p1", Step::StaticScanned).is_err());
        assert!(db.change_step("p1", Step::Cloned).is_err());

        // Forward jumps are allowed (local-only resume path)
        db.change_step("p1", Step::LocalVerified).unwrap();
        let proj = db.get_project("p1").unwrap().unwrap();
        assert_eq!(proj.step, Step::LocalVerified);
    }

    #[test]
    fn test_llm_try_count_never_decreases() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.set_llm_try_count("p1", 4).unwrap();
        assert_eq!(db.llm_try_count("p1").unwrap(), 4);

        assert!(db.set_llm_try_count("p1", 2).is_err());
        assert_eq!(db.llm_try_count("p1").unwrap(), 4);

        db.set_llm_try_count("p1", 4).unwrap();
        db.set_llm_try_count("p1", 5).unwrap();
        assert_eq!(db.llm_try_count("p1").unwrap(), 5);
    }

    #[test]
    fn test_run_method_and_poc_persist() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.set_run_method("p1", RunMethod::YarnStart).unwrap();
        db.set_poc("p1", "/../../etc/passwd").unwrap();

        let proj = db.get_project("p1").unwrap().unwrap();
        assert_eq!(proj.run_method, Some(RunMethod::YarnStart));
        assert_eq!(proj.poc.as_deref(), Some("/../../etc/passwd"));
    }

    #[test]
    fn test_record_timing() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        db.record_timing("p1", "semgrep", 1234).unwrap();

        let conn = db.conn.lock().unwrap();
        let ms: i64 = conn
            .query_row(
                "SELECT duration_ms FROM timings WHERE project_id = 'p1' AND label = 'semgrep'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(ms, 1234);
    }

    #[test]
    fn test_step_counts_split_paused() {
        let db = Database::in_memory().unwrap();
        seed(&db, "p1");
        seed(&db, "p2");
        db.pause("p2", PauseReason::NoStaticMatch).unwrap();

        let counts = db.step_counts().unwrap();
        let cloned = counts.iter().find(|(s, _, _)| s == "cloned").unwrap();
        assert_eq!((cloned.1, cloned.2), (1, 1));
    }
}
