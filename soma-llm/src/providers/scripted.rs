//! Deterministic scripted provider for tests and offline bring-up

use crate::error::{LlmError, Result};
use crate::model::LanguageModel;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Replays canned responses in order; errors once the script runs dry.
///
/// An optional artificial delay models the oracle's latency class so
/// single-flight behavior can be exercised.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a provider failure at the current script position.
    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(LlmError::Provider(message.to_string())));
    }

    pub fn push_response(&self, response: &str) {
        self.responses.lock().push_back(Ok(response.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Provider("script exhausted".to_string())))
    }
}
