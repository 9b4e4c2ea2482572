use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatrolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Verifier error: {0}")]
    Verifier(String),

    #[error("Static scanner error: {0}")]
    Scanner(String),

    #[error("Regression oracle error: {0}")]
    Oracle(String),

    #[error("Instance lock error: {0}")]
    Lock(String),

    #[error("Incomplete CVSS metrics: {0}")]
    IncompleteMetrics(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
