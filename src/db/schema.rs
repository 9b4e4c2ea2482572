pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    repo_name TEXT NOT NULL,
    file_url TEXT NOT NULL,
    filename TEXT NOT NULL,
    step TEXT NOT NULL DEFAULT 'cloned',
    pause_reason TEXT,
    is_local INTEGER,
    dos_status TEXT NOT NULL DEFAULT 'not-checked',
    run_method TEXT,
    poc TEXT,
    scan_matches TEXT,
    exit_code INTEGER,
    vector_string TEXT,
    base_score REAL,
    severity TEXT,
    llm_try_count INTEGER NOT NULL DEFAULT 0,
    stars INTEGER NOT NULL DEFAULT 0,
    pull_request_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS timings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    label TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_step ON projects(step);
CREATE INDEX IF NOT EXISTS idx_projects_pause ON projects(pause_reason);
CREATE INDEX IF NOT EXISTS idx_timings_project ON timings(project_id);
";
