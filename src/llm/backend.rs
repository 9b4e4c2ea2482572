use async_trait::async_trait;

use crate::errors::PatrolError;

/// Patch-generation backend. No determinism is promised between calls; the
/// patch loop treats every call as a fresh sample.
#[async_trait]
pub trait PatchBackend: Send + Sync {
    /// Produce one candidate unified-diff patch for `source_code`.
    async fn generate_patch(
        &self,
        source_code: &str,
        file_name: &str,
    ) -> Result<String, PatrolError>;
}
