use std::sync::Arc;

use crate::Result;

/// Handle to one playing instance of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Decoded audio, owned by the backend that produced it.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Length in seconds.
    pub duration: f64,
    pub data: Arc<[u8]>,
}

/// Host audio output.
pub trait AudioBackend {
    /// Audio clock in seconds. Monotonic, independent of any voice.
    fn now(&self) -> f64;

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioClip>;

    /// Starts `clip` at `offset` seconds into it.
    fn play(&mut self, clip: &AudioClip, offset: f64) -> VoiceId;

    fn stop(&mut self, voice: VoiceId);

    /// True once `voice` ran to the end of its clip or was stopped.
    fn is_finished(&self, voice: VoiceId) -> bool;

    /// Plays `clip` once without tracking it.
    fn play_effect(&mut self, clip: &AudioClip);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportState {
    Stopped,
    Playing { voice: VoiceId, start_time: f64 },
    Paused { elapsed: f64 },
}

/// Music playback state machine. Chart time is derived from the audio
/// clock so rendering and judgement never drift from what is heard.
#[derive(Debug, Clone)]
pub struct Transport {
    clip: AudioClip,
    state: TransportState,
    audio_time: f64,
}

impl Transport {
    pub fn new(clip: AudioClip) -> Self {
        Self {
            clip,
            state: TransportState::Stopped,
            audio_time: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn clip(&self) -> &AudioClip {
        &self.clip
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, TransportState::Playing { .. })
    }

    /// Plays from `t` seconds, replacing whatever was playing.
    pub fn start<A: AudioBackend + ?Sized>(&mut self, backend: &mut A, t: f64) {
        self.detach(backend);
        let voice = backend.play(&self.clip, t);
        self.state = TransportState::Playing {
            voice,
            start_time: backend.now() - t,
        };
        self.audio_time = t;
        tracing::debug!(t, ?voice, "transport started");
    }

    /// Toggles between playing and paused.
    pub fn pause<A: AudioBackend + ?Sized>(&mut self, backend: &mut A) {
        match self.state {
            TransportState::Stopped => {}
            TransportState::Playing { voice, start_time } => {
                backend.stop(voice);
                let elapsed = backend.now() - start_time;
                self.state = TransportState::Paused { elapsed };
                self.audio_time = elapsed;
                tracing::debug!(elapsed, "transport paused");
            }
            TransportState::Paused { elapsed } => self.start(backend, elapsed),
        }
    }

    pub fn seek<A: AudioBackend + ?Sized>(&mut self, backend: &mut A, t: f64) {
        if self.state != TransportState::Stopped {
            self.start(backend, t);
        }
    }

    pub fn stop<A: AudioBackend + ?Sized>(&mut self, backend: &mut A) {
        self.detach(backend);
        self.state = TransportState::Stopped;
    }

    /// Notices a voice that ran out on its own.
    pub fn poll<A: AudioBackend + ?Sized>(&mut self, backend: &A) {
        if let TransportState::Playing { voice, .. } = self.state {
            if backend.is_finished(voice) {
                tracing::debug!(?voice, "music reached its end");
                self.state = TransportState::Stopped;
                self.audio_time = 0.0;
            }
        }
    }

    pub fn chart_time<A: AudioBackend + ?Sized>(&self, backend: &A) -> Option<f64> {
        match self.state {
            TransportState::Stopped => None,
            TransportState::Playing { start_time, .. } => Some(backend.now() - start_time),
            TransportState::Paused { elapsed } => Some(elapsed),
        }
    }

    /// Polls, then records and returns the current chart time.
    pub fn tick<A: AudioBackend + ?Sized>(&mut self, backend: &A) -> Option<f64> {
        self.poll(backend);
        let time = self.chart_time(backend)?;
        self.audio_time = time;
        Some(time)
    }

    /// Chart time as of the last start, pause or tick.
    pub fn audio_time(&self) -> f64 {
        self.audio_time
    }

    // The old voice is stopped before the state changes, so its end is never
    // mistaken for the music finishing.
    fn detach<A: AudioBackend + ?Sized>(&mut self, backend: &mut A) {
        if let TransportState::Playing { voice, .. } = self.state {
            backend.stop(voice);
        }
    }
}
