//! Energy + zero-crossing voice activity detection
//!
//! Chunks are classified as speech when RMS energy is high and the
//! zero-crossing count is low (voiced speech crosses zero far less often
//! than broadband noise). Utterances are accumulated during speech and
//! emitted after a run of trailing silence.

use crate::config::EyeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    SpeechActive,
}

/// Per-chunk VAD state machine. Owned by the microphone callback path.
pub struct VadMachine {
    energy_threshold: f64,
    zcr_threshold: usize,
    max_silence_chunks: u32,
    state: VadState,
    buffer: Vec<i16>,
    silence_counter: u32,
}

impl VadMachine {
    pub fn new(config: &EyeConfig) -> Self {
        Self {
            energy_threshold: config.energy_threshold,
            zcr_threshold: config.zcr_threshold,
            max_silence_chunks: config.max_silence_chunks,
            state: VadState::Silence,
            buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn rms_energy(pcm: &[i16]) -> f64 {
        if pcm.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = pcm.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_sq / pcm.len() as f64).sqrt()
    }

    pub fn zero_crossings(pcm: &[i16]) -> usize {
        pcm.windows(2)
            .filter(|w| (w[0] >= 0) != (w[1] >= 0))
            .count()
    }

    fn is_speech(&self, pcm: &[i16]) -> bool {
        Self::rms_energy(pcm) > self.energy_threshold
            && Self::zero_crossings(pcm) < self.zcr_threshold
    }

    /// Feed one PCM chunk. Returns a completed utterance when trailing
    /// silence closes the current speech segment.
    pub fn push_chunk(&mut self, pcm: &[i16]) -> Option<Vec<i16>> {
        let speech = self.is_speech(pcm);

        match self.state {
            VadState::Silence => {
                if speech {
                    self.state = VadState::SpeechActive;
                    self.silence_counter = 0;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(pcm);
                }
                None
            }
            VadState::SpeechActive => {
                self.buffer.extend_from_slice(pcm);
                if speech {
                    self.silence_counter = 0;
                    return None;
                }
                self.silence_counter += 1;
                if self.silence_counter > self.max_silence_chunks {
                    self.state = VadState::Silence;
                    self.silence_counter = 0;
                    return Some(std::mem::take(&mut self.buffer));
                }
                None
            }
        }
    }
}
