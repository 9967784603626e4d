//! The opaque language-model oracle

use crate::error::Result;
use async_trait::async_trait;

/// Text-to-text oracle with seconds-scale latency.
///
/// Implementations may block for a long time; callers must never await a
/// completion on the tick thread. The planner wraps every call in a spawned
/// task polled non-blockingly.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
