use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use std::sync::Arc;

// One playing hit. Plays its buffer once from the top, then goes idle.
#[derive(Clone, Debug, Default)]
pub struct Voice {
    buffer: Option<Arc<SampleBuffer>>,
    pos: usize,
    gain: f32,
}

impl Voice {
    pub fn start(&mut self, buffer: Arc<SampleBuffer>, gain: f32) {
        self.buffer = Some(buffer);
        self.pos = 0;
        self.gain = gain;
    }

    pub fn is_active(&self) -> bool {
        self.buffer.is_some()
    }

    // how far into the hit we are, for voice stealing
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let remaining = &buffer.data[self.pos.min(buffer.data.len())..];
        let n = remaining.len().min(out.len());
        for (frame, s) in out.iter_mut().zip(&remaining[..n]) {
            frame.add_scaled(*s, self.gain);
        }
        self.pos += n;
        if self.pos >= buffer.data.len() {
            self.buffer = None; // done; the Arc drops here
        }
    }
}
