// One stereo frame of live audio, [-1, 1] per side once clamped
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_mono(v: f32) -> Self {
        Self { left: v, right: v }
    }

    // accumulate another frame at `gain`
    pub fn add_scaled(&mut self, other: StereoFrame, gain: f32) {
        self.left += other.left * gain;
        self.right += other.right * gain;
    }

    pub fn clamp_unit(self) -> Self {
        Self {
            left: self.left.clamp(-1.0, 1.0),
            right: self.right.clamp(-1.0, 1.0),
        }
    }

    pub fn to_mono(self) -> f32 {
        (self.left + self.right) * 0.5
    }
}
