use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::PatrolError;

/// Semgrep rule used by the static-scan stage. Fixed: the whole pipeline
/// models exactly one vulnerability class.
pub const SEMGREP_RULE: &str =
    "r/javascript.lang.security.audit.path-traversal.path-join-resolve-traversal.path-join-resolve-traversal";

fn default_db_path() -> String {
    "./data/pathpatrol.db".into()
}
fn default_scripts_dir() -> PathBuf {
    PathBuf::from("./scripts")
}
fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_patch_dir() -> PathBuf {
    PathBuf::from("./patches")
}
fn default_codeql_dir() -> PathBuf {
    PathBuf::from("./codeql")
}
fn default_app_root() -> String {
    "/usr/src/app".into()
}
fn default_network_timeout() -> u64 {
    600
}
fn default_local_timeout() -> u64 {
    600
}
fn default_dos_timeout() -> u64 {
    1200
}
fn default_patch_timeout() -> u64 {
    1200
}
fn default_semgrep_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    2
}
fn default_max_patch_tries() -> u32 {
    10
}
fn default_llm_model() -> String {
    "gpt-4-turbo".into()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

/// Runtime settings shared by every worker daemon. Values come from an
/// optional YAML file with environment overrides for secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    /// Directory holding the run-*.sh verifier scripts.
    pub scripts_dir: PathBuf,
    /// Directory where verifier side files land (run method, payload,
    /// captured snippet).
    pub work_dir: PathBuf,
    pub patch_dir: PathBuf,
    pub codeql_dir: PathBuf,
    /// Path prefix the sandbox mounts target checkouts under.
    pub container_app_root: String,
    pub network_timeout_secs: u64,
    pub local_timeout_secs: u64,
    pub dos_timeout_secs: u64,
    pub patch_timeout_secs: u64,
    pub semgrep_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Lifetime patch-generation budget per project.
    pub max_patch_tries: u32,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scripts_dir: default_scripts_dir(),
            work_dir: default_work_dir(),
            patch_dir: default_patch_dir(),
            codeql_dir: default_codeql_dir(),
            container_app_root: default_app_root(),
            network_timeout_secs: default_network_timeout(),
            local_timeout_secs: default_local_timeout(),
            dos_timeout_secs: default_dos_timeout(),
            patch_timeout_secs: default_patch_timeout(),
            semgrep_timeout_secs: default_semgrep_timeout(),
            poll_interval_secs: default_poll_interval(),
            max_patch_tries: default_max_patch_tries(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            llm_base_url: default_llm_base_url(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file if given, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings, PatrolError> {
        let mut settings = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    PatrolError::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                serde_yaml::from_str(&content)?
            }
            None => Settings::default(),
        };

        if let Ok(db) = std::env::var("PATHPATROL_DB") {
            settings.db_path = db;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            settings.llm_api_key = key;
        }

        Ok(settings)
    }

    /// Side file the verifier scripts write the discovered run method to.
    pub fn run_method_file(&self) -> PathBuf {
        self.work_dir.join("run_method.txt")
    }

    /// Side file holding the last successful exploit payload fragment.
    pub fn payload_file(&self) -> PathBuf {
        self.work_dir.join("payload.txt")
    }

    /// Captured vulnerable snippet the regression oracle runs against.
    pub fn snippet_file(&self) -> PathBuf {
        self.work_dir.join("static-analysis-test.ts")
    }

    pub fn patch_file(&self, project_id: &str) -> PathBuf {
        self.patch_dir.join(format!("{project_id}.patch"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.network_timeout_secs, 600);
        assert_eq!(s.dos_timeout_secs, 1200);
        assert_eq!(s.patch_timeout_secs, 1200);
        assert_eq!(s.poll_interval_secs, 2);
        assert_eq!(s.max_patch_tries, 10);
        assert_eq!(s.container_app_root, "/usr/src/app");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "db_path: /tmp/test.db\nmax_patch_tries: 3").unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.db_path, "/tmp/test.db");
        assert_eq!(s.max_patch_tries, 3);
        // Untouched keys fall back to defaults
        assert_eq!(s.network_timeout_secs, 600);
    }

    #[test]
    fn test_patch_file_keyed_by_project_id() {
        let s = Settings::default();
        assert!(s.patch_file("abc").ends_with("abc.patch"));
    }
}
