use std::collections::HashMap;
use std::sync::Arc;

use crate::audio_api::AudioCommand;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::Voice;

pub const MAX_VOICES: usize = 24; // hard cap so we wont malloc in audio callback

pub struct Engine {
    samples: HashMap<String, Arc<SampleBuffer>>,
    voices: [Voice; MAX_VOICES], // fixed pool of voices
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            samples: HashMap::new(),
            voices: std::array::from_fn(|_| Voice::default()),
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterSample { name, buffer } => {
                self.samples.insert(name, Arc::new(buffer));
            }
            AudioCommand::Trigger { name, gain } => self.trigger_voice(&name, gain),
        }
    }

    // unknown names are ignored, same as an unloaded pad
    fn trigger_voice(&mut self, name: &str, gain: f32) {
        let Some(buffer) = self.samples.get(name) else {
            return;
        };

        // what slot do we write to? a free one, else steal the oldest hit
        let slot = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.pos())
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);

        self.voices[slot].start(Arc::clone(buffer), gain);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for f in out.iter_mut() {
            *f = StereoFrame::zero();
        }
        for v in self.voices.iter_mut() {
            v.render_into(out);
        }
        for f in out.iter_mut() {
            *f = f.clamp_unit();
        }
    }
}
