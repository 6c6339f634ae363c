use std::path::{Path, PathBuf};

use crate::audio::wav::read_wav_pcm16;
use crate::audio_api::{DecodedSample, SampleSource};
use crate::error::DecodeError;

/// Resolves track `name` to `<dir>/<name>.wav`.
#[derive(Clone, Debug)]
pub struct WavDirSource {
    dir: PathBuf,
}

impl WavDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.wav"))
    }

    /// Track names for every WAV in the directory, sorted.
    pub fn names(&self) -> std::io::Result<Vec<String>> {
        Ok(index_wav_in_dir(&self.dir)?
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect())
    }
}

impl SampleSource for WavDirSource {
    fn load_pcm16(&self, name: &str) -> Result<DecodedSample, DecodeError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(DecodeError::NotFound(path.display().to_string()));
        }
        log::debug!(target: "beatpad::loader", "decoding {}", path.display());
        read_wav_pcm16(&path)
    }

    fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }
}

// Every *.wav directly inside `dir`, sorted by path
pub fn index_wav_in_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .is_some_and(|e| e == "wav");
        if is_wav && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
