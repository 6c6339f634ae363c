// Constants and the tempo type shared by the live clock and the offline renderer.
//
// Timing model:
//   - One step is a sixteenth note, so a 16-step pattern is one bar of 4/4.
//   - Live playback works in whole milliseconds: `(60000 / bpm) / 4`, integer
//     division, same truncation the pad screen has always used.
//   - Offline rendering works in samples: `round(sr * 60 / bpm / 4)`, with ties
//     going to the even neighbour so 44.1k @ 120 bpm lands on 5512 exactly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_STEPS: usize = 16;
pub const DEFAULT_BPM: u32 = 120;
pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;
pub const BPM_INCREMENT: u32 = 2; // one press of the +/- button
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const STEPS_PER_BEAT: u32 = 4; // sixteenth notes

/// Beats per minute, validated to `[MIN_BPM, MAX_BPM]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Tempo(u32);

impl Tempo {
    pub fn new(bpm: u32) -> Result<Self, ConfigError> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(ConfigError::InvalidBpm(bpm));
        }
        Ok(Self(bpm))
    }

    pub fn bpm(self) -> u32 {
        self.0
    }

    /// Live step length in whole milliseconds.
    pub fn step_duration_ms(self) -> u64 {
        (60_000 / self.0 as u64) / STEPS_PER_BEAT as u64
    }

    pub fn step_duration(self) -> Duration {
        Duration::from_millis(self.step_duration_ms())
    }

    /// Offline step length in frames at `sample_rate`.
    ///
    /// Integer arithmetic on `sample_rate * 60 / (bpm * 4)`, rounded half to even,
    /// so the result never depends on float rounding modes.
    pub fn step_duration_samples(self, sample_rate: u32) -> usize {
        let num = sample_rate as u64 * 60;
        let den = self.0 as u64 * STEPS_PER_BEAT as u64;
        let (q, r) = (num / den, num % den);
        let rounded = match (2 * r).cmp(&den) {
            std::cmp::Ordering::Less => q,
            std::cmp::Ordering::Greater => q + 1,
            std::cmp::Ordering::Equal => q + (q & 1), // tie
        };
        rounded as usize
    }

    /// Nudge up by one increment, saturating at `MAX_BPM`.
    pub fn faster(self) -> Self {
        Self((self.0 + BPM_INCREMENT).min(MAX_BPM))
    }

    /// Nudge down by one increment, saturating at `MIN_BPM`.
    pub fn slower(self) -> Self {
        Self(self.0.saturating_sub(BPM_INCREMENT).max(MIN_BPM))
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_BPM)
    }
}

impl TryFrom<u32> for Tempo {
    type Error = ConfigError;

    fn try_from(bpm: u32) -> Result<Self, Self::Error> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(t: Tempo) -> u32 {
        t.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_duration_ms_is_a_sixteenth() {
        assert_eq!(Tempo::new(120).unwrap().step_duration_ms(), 125);
        assert_eq!(Tempo::new(60).unwrap().step_duration_ms(), 250);
        // 60000 / 190 = 315, / 4 = 78 (integer division both times)
        assert_eq!(Tempo::new(190).unwrap().step_duration_ms(), 78);
    }

    #[test]
    fn step_duration_samples_rounds_ties_to_even() {
        let t = Tempo::new(120).unwrap();
        assert_eq!(t.step_duration_samples(44100), 5512); // 5512.5
        assert_eq!(t.step_duration_samples(48000), 6000);
        // 44100 * 60 / 400 = 6615 exactly
        assert_eq!(Tempo::new(100).unwrap().step_duration_samples(44100), 6615);
        // 44100 * 60 / 364 = 7269.23..
        assert_eq!(Tempo::new(91).unwrap().step_duration_samples(44100), 7269);
        // 44100 * 60 / 268 = 9873.13..
        assert_eq!(Tempo::new(67).unwrap().step_duration_samples(44100), 9873);
    }

    #[test]
    fn bpm_out_of_range_is_rejected() {
        assert!(matches!(Tempo::new(59), Err(ConfigError::InvalidBpm(59))));
        assert!(matches!(Tempo::new(201), Err(ConfigError::InvalidBpm(201))));
        assert!(Tempo::new(0).is_err());
        assert!(Tempo::new(60).is_ok());
        assert!(Tempo::new(200).is_ok());
    }

    #[test]
    fn nudging_saturates_at_bounds() {
        assert_eq!(Tempo::new(198).unwrap().faster().bpm(), 200);
        assert_eq!(Tempo::new(200).unwrap().faster().bpm(), 200);
        assert_eq!(Tempo::new(61).unwrap().slower().bpm(), 60);
        assert_eq!(Tempo::new(120).unwrap().slower().bpm(), 118);
    }

    #[test]
    fn tempo_deserializes_with_validation() {
        let t: Tempo = serde_json::from_str("140").unwrap();
        assert_eq!(t.bpm(), 140);
        assert!(serde_json::from_str::<Tempo>("20").is_err());
    }
}
