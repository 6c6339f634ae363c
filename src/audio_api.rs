// Boundaries between the core and the platform audio stack.
//
// The core never decodes audio or touches a device itself: a `SampleSource`
// hands it PCM16, a `SoundTrigger` fires sounds for the live clock. Both are
// injected, never looked up globally.

use crate::error::DecodeError;

pub use crate::audio::SampleBuffer;

/// Decoded PCM16 audio in its native layout. Samples are interleaved when
/// `channels > 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSample {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedSample {
    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate, channels: 1 }
    }

    /// Number of sample frames (one value per channel each).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Turns a named sound resource into PCM16.
pub trait SampleSource {
    fn load_pcm16(&self, resource: &str) -> Result<DecodedSample, DecodeError>;

    /// Whether `resource` names something this source knows about at all.
    /// Tracks the source cannot resolve are left out of an export; tracks it
    /// resolves but cannot decode fail it.
    fn contains(&self, _resource: &str) -> bool {
        true
    }
}

/// Fire-and-forget "play this sound now". Must not block: the step clock
/// calls it from its timing loop.
pub trait SoundTrigger: Send + Sync {
    fn play(&self, name: &str);
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't decode files (blocks the callback), so a decoded,
    // device-rate buffer is registered under its track name first
    RegisterSample { name: String, buffer: SampleBuffer },

    // then triggered by name
    Trigger { name: String, gain: f32 },
}
