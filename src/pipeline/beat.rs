// Beat files: a small JSON description of a loop the binary can play or export.
//
// {
//   "bpm": 120,
//   "steps": 16,
//   "sample_rate": 44100,
//   "tracks": {
//     "kick":  "x...x...x...x...",
//     "snare": "....x.......x..."
//   }
// }
//
// `x`, `X` and `1` are hits; `.`, `-` and `0` are rests; spaces and `|` are
// ignored so bars can be marked out. Every field but `tracks` has a default.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::pipeline::grid::PatternGrid;
use crate::shared::{DEFAULT_SAMPLE_RATE, DEFAULT_STEPS, Tempo};

fn default_steps() -> usize {
    DEFAULT_STEPS
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatFile {
    #[serde(default)]
    pub bpm: Tempo,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub tracks: BTreeMap<String, String>,
}

impl BeatFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading beat file {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("parsing beat file {}", path.display()))
    }

    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Build a grid holding every track in the file.
    pub fn to_grid(&self) -> anyhow::Result<PatternGrid> {
        let grid = PatternGrid::new(self.steps)?;
        for (name, cells) in &self.tracks {
            let steps = parse_steps(cells).with_context(|| format!("track '{name}'"))?;
            if steps.len() != self.steps {
                bail!("track '{name}' has {} steps, expected {}", steps.len(), self.steps);
            }
            grid.ensure_all(&[name]);
            for (i, on) in steps.into_iter().enumerate() {
                grid.set(name, i, on)?;
            }
        }
        Ok(grid)
    }

    /// Inverse of `to_grid`, for writing a loop back out.
    pub fn from_grid(grid: &PatternGrid, bpm: Tempo, sample_rate: u32) -> Self {
        let tracks: BTreeMap<String, String> = grid
            .snapshot()
            .into_iter()
            .map(|(name, cells)| (name, cells.iter().map(|&on| if on { 'x' } else { '.' }).collect()))
            .collect();
        Self {
            bpm,
            steps: grid.steps(),
            sample_rate,
            tracks,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn parse_steps(cells: &str) -> anyhow::Result<Vec<bool>> {
    cells
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '|')
        .map(|c| match c {
            'x' | 'X' | '1' => Ok(true),
            '.' | '-' | '0' => Ok(false),
            other => bail!("unexpected step character '{other}'"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_defaults() {
        let beat = BeatFile::from_json(r#"{ "tracks": { "kick": "x...|x...|x...|x..." } }"#).unwrap();
        assert_eq!(beat.bpm.bpm(), 120);
        assert_eq!(beat.steps, 16);
        assert_eq!(beat.sample_rate, 44100);

        let grid = beat.to_grid().unwrap();
        assert!(grid.is_on("kick", 0));
        assert!(grid.is_on("kick", 4));
        assert!(!grid.is_on("kick", 1));
    }

    #[test]
    fn rejects_bad_tempo_and_characters() {
        assert!(BeatFile::from_json(r#"{ "bpm": 400, "tracks": {} }"#).is_err());
        let beat = BeatFile::from_json(r#"{ "steps": 4, "tracks": { "hat": "x?x." } }"#).unwrap();
        assert!(beat.to_grid().is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        let beat = BeatFile::from_json(r#"{ "steps": 8, "tracks": { "hat": "x.x." } }"#).unwrap();
        let err = beat.to_grid().unwrap_err();
        assert!(err.to_string().contains("expected 8"));
    }

    #[test]
    fn survives_a_trip_through_a_grid() {
        let beat = BeatFile::from_json(
            r#"{ "bpm": 96, "steps": 4, "sample_rate": 48000, "tracks": { "kick": "x..x", "tom": "...." } }"#,
        )
        .unwrap();
        let grid = beat.to_grid().unwrap();
        let back = BeatFile::from_grid(&grid, beat.bpm, beat.sample_rate);
        assert_eq!(back, beat);
        assert!(back.to_json().unwrap().contains("\"x..x\""));
    }
}
