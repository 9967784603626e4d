//! The TTS worker queue

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Synthesis-and-playback backend. Runs on the worker thread and blocks for
/// the duration of playback; implementations must poll `cancel` and abort
/// promptly when it flips.
pub trait TtsBackend: Send + Sync {
    fn speak(&self, text: &str, cancel: &AtomicBool) -> Result<()>;
}

/// Backend that plays nothing. Useful for muted deployments and tests.
pub struct NullBackend;

impl TtsBackend for NullBackend {
    fn speak(&self, text: &str, _cancel: &AtomicBool) -> Result<()> {
        debug!(text, "null TTS backend swallowed utterance");
        Ok(())
    }
}

struct SpeechShared {
    queue: Mutex<VecDeque<String>>,
    available: Condvar,
    running: AtomicBool,
    speaking: AtomicBool,
    cancel: AtomicBool,
}

/// Owns the speech worker thread and its utterance queue.
pub struct TtsEngine {
    shared: Arc<SpeechShared>,
    handle: Option<JoinHandle<()>>,
}

impl TtsEngine {
    pub fn spawn(backend: Arc<dyn TtsBackend>) -> Self {
        let shared = Arc::new(SpeechShared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(true),
            speaking: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("soma-tts".to_string())
            .spawn(move || Self::worker_loop(worker_shared, backend))
            .expect("failed to spawn TTS worker thread");

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Enqueue an utterance; returns immediately.
    pub fn speak_async(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        {
            let mut queue = self.shared.queue.lock();
            queue.push_back(text.to_string());
        }
        self.shared.available.notify_one();
    }

    /// Barge-in: drain everything queued and abort the current utterance.
    pub fn stop(&self) {
        let drained = {
            let mut queue = self.shared.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        self.shared.cancel.store(true, Ordering::Release);
        info!(drained, "speech stopped");
    }

    pub fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::Acquire)
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    fn worker_loop(shared: Arc<SpeechShared>, backend: Arc<dyn TtsBackend>) {
        loop {
            let text = {
                let mut queue = shared.queue.lock();
                while queue.is_empty() && shared.running.load(Ordering::Acquire) {
                    shared.available.wait(&mut queue);
                }
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                queue.pop_front()
            };

            let Some(text) = text else { continue };

            shared.cancel.store(false, Ordering::Release);
            shared.speaking.store(true, Ordering::Release);
            if let Err(err) = backend.speak(&text, &shared.cancel) {
                warn!(error = %err, "TTS backend failed");
            }
            shared.speaking.store(false, Ordering::Release);
        }
    }
}

impl Drop for TtsEngine {
    fn drop(&mut self) {
        self.stop();
        self.shared.running.store(false, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
