use super::frame::StereoFrame;
use super::resample::resample_linear;
use crate::audio_api::DecodedSample;

/// A sample ready for the live engine: float stereo at the device rate.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array
}

impl SampleBuffer {
    // Convert decoded PCM16 into engine frames, resampling on the way in so the
    // audio callback never has to
    pub fn from_decoded(sample: &DecodedSample, target_rate: u32) -> Self {
        let channels = sample.channels.max(1) as usize;
        let pcm = resample_linear(&sample.samples, channels, sample.sample_rate, target_rate);
        let full_scale = i16::MAX as f32;

        let data = pcm
            .chunks_exact(channels)
            .map(|c| {
                let left = c[0] as f32 / full_scale;
                if channels > 1 {
                    StereoFrame { left, right: c[1] as f32 / full_scale }
                } else {
                    StereoFrame::from_mono(left) // mono, duplicate
                }
            })
            .collect();

        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_spread_to_both_sides() {
        let s = DecodedSample::mono(vec![i16::MAX, 0], 44100);
        let b = SampleBuffer::from_decoded(&s, 44100);
        assert_eq!(b.len(), 2);
        assert_eq!(b.data[0].left, 1.0);
        assert_eq!(b.data[0].right, 1.0);
        assert_eq!(b.data[1].left, 0.0);
    }

    #[test]
    fn resamples_to_device_rate() {
        let s = DecodedSample { samples: vec![0; 200], sample_rate: 22050, channels: 2 };
        let b = SampleBuffer::from_decoded(&s, 44100);
        assert_eq!(b.len(), 200);
    }
}
