// Offline mixdown: pattern data + decoded samples in, one PCM16 loop out.
//
// Pure over its inputs. Every hit is summed into a wide accumulator and the
// whole loop is clamped to i16 once at the end, so stacked full-scale hits
// saturate instead of wrapping. A hit that runs past the loop end is cut off
// there; nothing wraps back to the start.

use crate::audio::resample::resample_linear;
use crate::audio_api::DecodedSample;
use crate::error::{ConfigError, DecodeError, ExportError};
use crate::shared::Tempo;

pub const MAX_CHANNELS: u16 = 2;

/// One track going into an export: its steps plus a borrowed decoded sample.
#[derive(Clone, Debug)]
pub struct TrackMix<'a> {
    pub name: String,
    pub pattern: Vec<bool>,
    pub sample: &'a DecodedSample,
}

/// Everything one export needs. Immutable for the length of the export.
#[derive(Clone, Debug)]
pub struct ExportJob<'a> {
    pub tempo: Tempo,
    pub steps: usize,
    pub sample_rate: u32,
    pub tracks: Vec<TrackMix<'a>>,
}

/// The finished loop, interleaved when `channels == 2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RenderedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

impl<'a> ExportJob<'a> {
    pub fn step_duration_samples(&self) -> usize {
        self.tempo.step_duration_samples(self.sample_rate)
    }

    /// Loop length in frames: `steps * step_duration_samples`.
    pub fn total_frames(&self) -> usize {
        self.steps * self.step_duration_samples()
    }

    /// Output is stereo as soon as one track is.
    pub fn output_channels(&self) -> u16 {
        self.tracks
            .iter()
            .map(|t| t.sample.channels)
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_CHANNELS)
    }

    /// Checked before anything is allocated or written.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.steps == 0 {
            return Err(ConfigError::InvalidSteps.into());
        }
        if self.tracks.is_empty() {
            return Err(ConfigError::NoTracks.into());
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate.into());
        }
        for t in &self.tracks {
            if t.pattern.len() != self.steps {
                return Err(ConfigError::PatternLength {
                    track: t.name.clone(),
                    expected: self.steps,
                    actual: t.pattern.len(),
                }
                .into());
            }
            let s = t.sample;
            let layout = if s.channels == 0 || s.channels > MAX_CHANNELS {
                Some(format!("{} channels", s.channels))
            } else if s.sample_rate == 0 {
                Some("0 Hz sample rate".to_string())
            } else if s.samples.len() % s.channels as usize != 0 {
                Some("partial frame at end of data".to_string())
            } else {
                None
            };
            if let Some(why) = layout {
                return Err(ExportError::SampleLoad {
                    track: t.name.clone(),
                    source: DecodeError::Unsupported(why),
                });
            }
        }
        Ok(())
    }
}

/// Mix every active step of every track into one loop.
pub fn render(job: &ExportJob<'_>) -> Result<RenderedAudio, ExportError> {
    job.validate()?;

    let channels = job.output_channels() as usize;
    let step_frames = job.step_duration_samples();
    let total_frames = job.total_frames();
    let mut acc = vec![0i64; total_frames * channels];

    for track in &job.tracks {
        if !track.pattern.iter().any(|&on| on) {
            continue;
        }
        // resample once per track, not once per hit
        let hit = conform(track.sample, job.sample_rate, channels);
        let hit_frames = hit.len() / channels;
        log::debug!(
            target: "beatpad::export",
            "mixing '{}': {} frames per hit",
            track.name,
            hit_frames
        );

        for (step, _) in track.pattern.iter().enumerate().filter(|(_, on)| **on) {
            let offset = step * step_frames;
            if offset >= total_frames {
                break;
            }
            let n = hit_frames.min(total_frames - offset);
            let dst = &mut acc[offset * channels..(offset + n) * channels];
            for (d, &s) in dst.iter_mut().zip(&hit[..n * channels]) {
                *d += s as i64;
            }
        }
    }

    let samples = acc
        .into_iter()
        .map(|v| v.clamp(i16::MIN as i64, i16::MAX as i64) as i16)
        .collect();

    Ok(RenderedAudio {
        samples,
        sample_rate: job.sample_rate,
        channels: channels as u16,
    })
}

/// Bring a sample to the output rate and channel count.
fn conform(sample: &DecodedSample, sample_rate: u32, channels: usize) -> Vec<i16> {
    let src_channels = sample.channels as usize;
    let resampled = resample_linear(&sample.samples, src_channels, sample.sample_rate, sample_rate);
    if src_channels == channels {
        return resampled;
    }
    // mono into stereo: same value on both sides
    resampled
        .iter()
        .flat_map(|&s| std::iter::repeat_n(s, channels))
        .collect()
}
