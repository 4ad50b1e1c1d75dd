//! The generation gateway seam

use async_trait::async_trait;
use taskloop_core::Result;

use crate::types::GenerationOptions;

/// Text-generation capability consumed by every phase
///
/// Implementations own timeout and retry policy. A returned error is
/// `TaskloopError::Generation` (or `Auth`) and ends the run.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}
