// Exporting a loop to disk.
//
// Guarantees, whatever fails:
//   - at most one export runs at a time per Exporter (a second one gets Busy)
//   - config and sample problems are found before any file is created
//   - an existing file is never overwritten: `beat.wav` becomes `beat_2.wav`, ...
//   - a failed write removes its own partial file

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;

use crate::audio::mixer::{self, ExportJob, RenderedAudio, TrackMix};
use crate::audio::wav;
use crate::audio_api::{DecodedSample, SampleSource};
use crate::error::ExportError;
use crate::pipeline::grid::PatternGrid;
use crate::shared::Tempo;

pub const EXTENSION: &str = "wav";

/// Writes loops to disk, one at a time.
///
/// The one-at-a-time guard lives in the instance: clones share it, separately
/// constructed exporters do not. Hand every caller the same exporter (or a
/// clone of it) to get a single export in flight.
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    busy: Arc<AtomicBool>,
}

/// Held for the length of one export; clears the busy flag on drop.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A track with its own decoded sample, for exports that outlive the caller's
/// borrow (see `Exporter::spawn`).
#[derive(Clone, Debug)]
pub struct OwnedTrack {
    pub name: String,
    pub pattern: Vec<bool>,
    pub sample: DecodedSample,
}

#[derive(Clone, Debug)]
pub struct ExportRequest {
    pub tempo: Tempo,
    pub steps: usize,
    pub sample_rate: u32,
    pub tracks: Vec<OwnedTrack>,
    pub dest_dir: PathBuf,
    pub name: String,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Render `job` and write it as `<dest_dir>/<slug(name)>.wav`, or the next
    /// free `_N` variant. Returns the path written.
    pub fn export(&self, job: &ExportJob<'_>, dest_dir: &Path, name: &str) -> Result<PathBuf, ExportError> {
        let _guard = self.acquire()?;
        export_job(job, dest_dir, name)
    }

    /// Snapshot `grid`, decode every track `source` knows, and export.
    ///
    /// The grid is copied first, so toggles made while this runs do not
    /// reach the file.
    pub fn export_grid(
        &self,
        grid: &PatternGrid,
        source: &dyn SampleSource,
        tempo: Tempo,
        sample_rate: u32,
        dest_dir: &Path,
        name: &str,
    ) -> Result<PathBuf, ExportError> {
        let _guard = self.acquire()?;
        let snapshot = grid.snapshot();
        let decoded = load_samples(&snapshot, source)?;
        let job = ExportJob {
            tempo,
            steps: grid.steps(),
            sample_rate,
            tracks: decoded
                .iter()
                .map(|(track, sample)| TrackMix {
                    name: track.clone(),
                    pattern: snapshot[track].clone(),
                    sample,
                })
                .collect(),
        };
        export_job(&job, dest_dir, name)
    }

    /// Run an export on a worker thread. Busy is reported right away, not
    /// through the channel; the result arrives on the returned receiver.
    pub fn spawn(&self, request: ExportRequest) -> Result<Receiver<Result<PathBuf, ExportError>>, ExportError> {
        let guard = self.acquire()?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("beatpad-export".into())
            .spawn(move || {
                let _guard = guard;
                let job = ExportJob {
                    tempo: request.tempo,
                    steps: request.steps,
                    sample_rate: request.sample_rate,
                    tracks: request
                        .tracks
                        .iter()
                        .map(|t| TrackMix {
                            name: t.name.clone(),
                            pattern: t.pattern.clone(),
                            sample: &t.sample,
                        })
                        .collect(),
                };
                let _ = tx.send(export_job(&job, &request.dest_dir, &request.name));
            })?;
        Ok(rx)
    }

    fn acquire(&self) -> Result<BusyGuard, ExportError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(BusyGuard(Arc::clone(&self.busy)))
    }
}

/// Decode every track the source can resolve. Any decode failure aborts.
fn load_samples(
    snapshot: &BTreeMap<String, Vec<bool>>,
    source: &dyn SampleSource,
) -> Result<BTreeMap<String, DecodedSample>, ExportError> {
    let mut out = BTreeMap::new();
    for name in snapshot.keys() {
        if !source.contains(name) {
            log::debug!(target: "beatpad::export", "skipping '{name}': no sample");
            continue;
        }
        let sample = source
            .load_pcm16(name)
            .map_err(|source| ExportError::SampleLoad { track: name.clone(), source })?;
        out.insert(name.clone(), sample);
    }
    Ok(out)
}

fn export_job(job: &ExportJob<'_>, dest_dir: &Path, name: &str) -> Result<PathBuf, ExportError> {
    job.validate()?;
    log::info!(
        target: "beatpad::export",
        "exporting {} tracks, {} steps @ {} bpm, {} Hz",
        job.tracks.len(),
        job.steps,
        job.tempo.bpm(),
        job.sample_rate
    );
    let rendered = mixer::render(job)?;
    let path = write_unique(&rendered, dest_dir, name)?;
    log::info!(target: "beatpad::export", "wrote {}", path.display());
    Ok(path)
}

/// Write to the first free name, removing the file again if writing fails.
fn write_unique(audio: &RenderedAudio, dest_dir: &Path, name: &str) -> Result<PathBuf, ExportError> {
    let (path, file) = create_unique(&dest_dir.join(format!("{}.{EXTENSION}", slug_or_default(name))))?;
    let result = wav::write_pcm16(BufWriter::new(file), &audio.samples, audio.sample_rate, audio.channels);
    match result {
        Ok(()) => Ok(path),
        Err(e) => {
            log::warn!(target: "beatpad::export", "write failed, removing {}: {e}", path.display());
            if let Err(rm) = std::fs::remove_file(&path) {
                log::error!(target: "beatpad::export", "could not remove {}: {rm}", path.display());
            }
            Err(match e {
                hound::Error::IoError(io) => ExportError::Io(io),
                other => ExportError::Wav(other),
            })
        }
    }
}

/// Create `target` or its first free `_N` sibling. `create_new` makes the
/// check and the creation one step, so a racing writer can't be clobbered.
fn create_unique(target: &Path) -> io::Result<(PathBuf, File)> {
    let mut candidate = target.to_path_buf();
    let mut n = 2;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = numbered(target, n);
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// First path among `target`, `target_2`, `target_3`, ... that doesn't exist yet.
pub fn unique_target(target: &Path) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }
    (2..)
        .map(|n| numbered(target, n))
        .find(|p| !p.exists())
        .unwrap_or_else(|| target.to_path_buf())
}

fn numbered(target: &Path, n: u32) -> PathBuf {
    let stem = target.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    target.with_file_name(name)
}

/// Lowercase, runs of anything outside `[a-z0-9]` become one `_`, edges
/// trimmed. Empty results fall back to `default_beat_name()`.
pub fn slug_or_default(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        default_beat_name()
    } else {
        slug.to_string()
    }
}

/// `beat_<n>` with n taken from the wall clock, as the pad screen names new beats.
pub fn default_beat_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("beat_{}", millis % 100_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slug_or_default("My Beat"), "my_beat");
        assert_eq!(slug_or_default("  Hot!!  Loop #3 "), "hot_loop_3");
        assert_eq!(slug_or_default("beat"), "beat");
        assert_eq!(slug_or_default("__x__"), "x");
        assert!(slug_or_default("!!!").starts_with("beat_"));
        assert!(slug_or_default("").starts_with("beat_"));
    }

    #[test]
    fn numbered_goes_before_extension() {
        assert_eq!(numbered(Path::new("/tmp/beat.wav"), 2), PathBuf::from("/tmp/beat_2.wav"));
        assert_eq!(numbered(Path::new("/tmp/beat"), 3), PathBuf::from("/tmp/beat_3"));
    }

    #[test]
    fn unique_target_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("beat.wav");
        assert_eq!(unique_target(&target), target);
        std::fs::write(&target, b"x").unwrap();
        assert_eq!(unique_target(&target), dir.path().join("beat_2.wav"));
        std::fs::write(dir.path().join("beat_2.wav"), b"x").unwrap();
        assert_eq!(unique_target(&target), dir.path().join("beat_3.wav"));
    }

    #[test]
    fn second_acquire_is_busy() {
        let exporter = Exporter::new();
        let guard = exporter.acquire().unwrap();
        assert!(exporter.is_busy());
        assert!(matches!(exporter.clone().acquire(), Err(ExportError::Busy)));
        drop(guard);
        assert!(!exporter.is_busy());
        assert!(exporter.acquire().is_ok());
    }

    #[test]
    fn clone_holding_the_guard_blocks_the_original() {
        let exporter = Exporter::new();
        let worker = exporter.clone();
        let guard = worker.acquire().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let kick = DecodedSample { samples: vec![1000; 64], sample_rate: 44_100, channels: 1 };
        let job = ExportJob {
            tempo: Tempo::new(120).unwrap(),
            steps: 4,
            sample_rate: 44_100,
            tracks: vec![TrackMix {
                name: "kick".into(),
                pattern: vec![true, false, false, false],
                sample: &kick,
            }],
        };
        assert!(matches!(exporter.export(&job, dir.path(), "beat"), Err(ExportError::Busy)));
        drop(guard);
        assert!(exporter.export(&job, dir.path(), "beat").is_ok());
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        // three samples can't fill whole stereo frames
        let audio = RenderedAudio { samples: vec![1, 2, 3], sample_rate: 44_100, channels: 2 };
        let err = write_unique(&audio, dir.path(), "beat").unwrap_err();
        assert!(matches!(err, ExportError::Wav(_)), "{err:?}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
