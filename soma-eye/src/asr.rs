//! Background speech recognition worker
//!
//! The VAD path enqueues completed utterances into a shared PCM queue; a
//! dedicated worker thread drains it, runs the (slow, blocking) ASR engine,
//! and pushes transcripts into the transcript ring track.

use parking_lot::{Condvar, Mutex};
use soma_core::types::AudioTranscript;
use soma_core::{RingTrack, Timestamp};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Result of one recognition pass.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub speaker_id: Option<String>,
    pub confidence: f64,
}

/// ASR engine seam. Implementations block for the duration of recognition
/// and therefore only ever run on the worker thread.
pub trait AsrEngine: Send + Sync {
    /// Transcribe one utterance. `None` means no intelligible speech.
    fn transcribe(&self, pcm: &[i16], sample_rate: u32) -> Option<Transcription>;
}

struct AsrShared {
    queue: Mutex<VecDeque<Vec<i16>>>,
    available: Condvar,
    running: AtomicBool,
}

/// Owns the recognition worker thread and the shared utterance queue.
pub struct AsrWorker {
    shared: Arc<AsrShared>,
    handle: Option<JoinHandle<()>>,
}

impl AsrWorker {
    pub fn spawn(
        engine: Arc<dyn AsrEngine>,
        sample_rate: u32,
        text_track: Arc<RingTrack<AudioTranscript>>,
    ) -> Self {
        let shared = Arc::new(AsrShared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let worker_shared = shared.clone();
        let handle = std::thread::Builder::new()
            .name("soma-asr".to_string())
            .spawn(move || {
                Self::worker_loop(worker_shared, engine, sample_rate, text_track);
            })
            .expect("failed to spawn ASR worker thread");

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Called from the microphone path when the VAD closes an utterance.
    pub fn enqueue(&self, pcm: Vec<i16>) {
        if pcm.is_empty() {
            return;
        }
        {
            let mut queue = self.shared.queue.lock();
            queue.push_back(pcm);
        }
        self.shared.available.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    fn worker_loop(
        shared: Arc<AsrShared>,
        engine: Arc<dyn AsrEngine>,
        sample_rate: u32,
        text_track: Arc<RingTrack<AudioTranscript>>,
    ) {
        loop {
            let utterance = {
                let mut queue = shared.queue.lock();
                while queue.is_empty() && shared.running.load(Ordering::Acquire) {
                    shared.available.wait(&mut queue);
                }
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                queue.pop_front()
            };

            let Some(pcm) = utterance else { continue };

            debug!(samples = pcm.len(), "running ASR over utterance");
            match engine.transcribe(&pcm, sample_rate) {
                Some(result) if !result.text.is_empty() => {
                    info!(text = %result.text, confidence = result.confidence, "transcribed");
                    text_track.push(AudioTranscript {
                        t_end: Timestamp::now(),
                        text: result.text,
                        speaker_id: result.speaker_id,
                        confidence: result.confidence,
                        processed: false,
                    });
                }
                Some(_) => {}
                None => warn!("ASR produced no transcript for utterance"),
            }
        }
    }
}

impl Drop for AsrWorker {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.available.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct EchoEngine;

    impl AsrEngine for EchoEngine {
        fn transcribe(&self, pcm: &[i16], _sample_rate: u32) -> Option<Transcription> {
            Some(Transcription {
                text: format!("heard {} samples", pcm.len()),
                speaker_id: None,
                confidence: 0.95,
            })
        }
    }

    struct MuteEngine;

    impl AsrEngine for MuteEngine {
        fn transcribe(&self, _pcm: &[i16], _sample_rate: u32) -> Option<Transcription> {
            None
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) -> bool {
        for _ in 0..200 {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_worker_transcribes_enqueued_utterance() {
        let track = Arc::new(RingTrack::new(8));
        let worker = AsrWorker::spawn(Arc::new(EchoEngine), 16_000, track.clone());

        worker.enqueue(vec![0i16; 1000]);
        assert!(wait_for(|| !track.is_empty()));

        let transcript = track.get_latest().unwrap();
        assert_eq!(transcript.text, "heard 1000 samples");
        assert!(!transcript.processed);
    }

    #[test]
    fn test_empty_utterance_ignored() {
        let track: Arc<RingTrack<AudioTranscript>> = Arc::new(RingTrack::new(8));
        let worker = AsrWorker::spawn(Arc::new(EchoEngine), 16_000, track.clone());
        worker.enqueue(Vec::new());
        std::thread::sleep(Duration::from_millis(30));
        assert!(track.is_empty());
    }

    #[test]
    fn test_silent_engine_pushes_nothing() {
        let track: Arc<RingTrack<AudioTranscript>> = Arc::new(RingTrack::new(8));
        let worker = AsrWorker::spawn(Arc::new(MuteEngine), 16_000, track.clone());
        worker.enqueue(vec![1i16; 100]);
        std::thread::sleep(Duration::from_millis(30));
        assert!(track.is_empty());
        drop(worker);
    }

    #[test]
    fn test_shutdown_joins_cleanly() {
        let track: Arc<RingTrack<AudioTranscript>> = Arc::new(RingTrack::new(8));
        let worker = AsrWorker::spawn(Arc::new(EchoEngine), 16_000, track);
        drop(worker);
    }
}
