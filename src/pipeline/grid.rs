// The step grid: one boolean timeline per track, keyed by track name.
//
// The UI toggles cells while the clock thread reads them, so every cell is its
// own AtomicBool. The map lock is only taken for writing when a track is seen
// for the first time; flipping a cell never locks the grid.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{ConfigError, PatternError};

/// Shared handle to one track's steps. Length is fixed at creation.
#[derive(Clone, Debug)]
pub struct StepPattern(Arc<[AtomicBool]>);

impl StepPattern {
    fn new(steps: usize) -> Self {
        let cells: Vec<AtomicBool> = (0..steps).map(|_| AtomicBool::new(false)).collect();
        Self(cells.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `false` for indices past the end.
    pub fn get(&self, i: usize) -> bool {
        self.0.get(i).is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn flip(&self, i: usize) -> Option<bool> {
        // fetch_xor hands back the old value
        self.0.get(i).map(|c| !c.fetch_xor(true, Ordering::Relaxed))
    }

    fn set(&self, i: usize, on: bool) {
        if let Some(c) = self.0.get(i) {
            c.store(on, Ordering::Relaxed);
        }
    }

    fn zero(&self) {
        for c in self.0.iter() {
            c.store(false, Ordering::Relaxed);
        }
    }

    pub fn to_vec(&self) -> Vec<bool> {
        self.0.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

#[derive(Debug)]
pub struct PatternGrid {
    steps: usize,
    tracks: RwLock<HashMap<String, StepPattern>>,
}

impl PatternGrid {
    pub fn new(steps: usize) -> Result<Self, ConfigError> {
        if steps == 0 {
            return Err(ConfigError::InvalidSteps);
        }
        Ok(Self {
            steps,
            tracks: RwLock::new(HashMap::new()),
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Get-or-create: a track seen for the first time starts all-off.
    pub fn pattern(&self, name: &str) -> StepPattern {
        if let Some(p) = self.read().get(name) {
            return p.clone();
        }
        let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
        tracks
            .entry(name.to_string())
            .or_insert_with(|| StepPattern::new(self.steps))
            .clone()
    }

    /// Flip one cell and return its new value.
    pub fn toggle(&self, name: &str, i: usize) -> Result<bool, PatternError> {
        self.pattern(name)
            .flip(i)
            .ok_or_else(|| PatternError::IndexOutOfRange {
                track: name.to_string(),
                index: i,
                steps: self.steps,
            })
    }

    pub fn set(&self, name: &str, i: usize, on: bool) -> Result<(), PatternError> {
        if i >= self.steps {
            return Err(PatternError::IndexOutOfRange {
                track: name.to_string(),
                index: i,
                steps: self.steps,
            });
        }
        self.pattern(name).set(i, on);
        Ok(())
    }

    pub fn clear<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            self.pattern(name.as_ref()).zero();
        }
    }

    pub fn clear_all(&self) {
        for p in self.read().values() {
            p.zero();
        }
    }

    /// Make sure every name has a pattern, leaving existing ones alone.
    pub fn ensure_all<S: AsRef<str>>(&self, names: &[S]) {
        for name in names {
            self.pattern(name.as_ref());
        }
    }

    /// Is `name` on at step `i`? Never creates a track.
    pub fn is_on(&self, name: &str, i: usize) -> bool {
        self.read().get(name).is_some_and(|p| p.get(i))
    }

    /// Names of every track on at step `i`, sorted.
    pub fn active_at(&self, i: usize) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, p)| p.get(i))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Owned copy of every pattern, ordered by name. Later toggles don't
    /// reach it.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<bool>> {
        self.read()
            .iter()
            .map(|(name, p)| (name.clone(), p.to_vec()))
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, StepPattern>> {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_created_lazily_all_off() {
        let grid = PatternGrid::new(16).unwrap();
        assert!(grid.is_empty());
        let p = grid.pattern("kick");
        assert_eq!(p.len(), 16);
        assert!(p.to_vec().iter().all(|on| !on));
        assert_eq!(grid.names(), vec!["kick".to_string()]);
    }

    #[test]
    fn zero_steps_is_rejected() {
        assert!(matches!(PatternGrid::new(0), Err(ConfigError::InvalidSteps)));
    }

    #[test]
    fn toggle_flips_and_reports_new_value() {
        let grid = PatternGrid::new(8).unwrap();
        assert!(grid.toggle("snare", 3).unwrap());
        assert!(grid.is_on("snare", 3));
        assert!(!grid.toggle("snare", 3).unwrap());
        assert!(!grid.is_on("snare", 3));
    }

    #[test]
    fn toggle_out_of_range_fails() {
        let grid = PatternGrid::new(8).unwrap();
        let err = grid.toggle("snare", 8).unwrap_err();
        assert!(matches!(
            err,
            PatternError::IndexOutOfRange { index: 8, steps: 8, .. }
        ));
        assert!(grid.set("snare", 100, true).is_err());
    }

    #[test]
    fn handles_share_cells_with_the_grid() {
        let grid = PatternGrid::new(4).unwrap();
        let handle = grid.pattern("hat");
        grid.toggle("hat", 1).unwrap();
        assert!(handle.get(1));
    }

    #[test]
    fn clear_only_touches_listed_tracks() {
        let grid = PatternGrid::new(4).unwrap();
        grid.toggle("kick", 0).unwrap();
        grid.toggle("snare", 2).unwrap();
        grid.clear(&["kick"]);
        assert!(!grid.is_on("kick", 0));
        assert!(grid.is_on("snare", 2));
        grid.clear_all();
        assert!(!grid.is_on("snare", 2));
    }

    #[test]
    fn ensure_all_keeps_existing_data() {
        let grid = PatternGrid::new(4).unwrap();
        grid.toggle("kick", 0).unwrap();
        grid.ensure_all(&["kick", "clap", "tom"]);
        assert_eq!(grid.len(), 3);
        assert!(grid.is_on("kick", 0));
    }

    #[test]
    fn lengths_never_change() {
        let grid = PatternGrid::new(12).unwrap();
        grid.ensure_all(&["a", "b"]);
        grid.toggle("a", 11).unwrap();
        let _ = grid.toggle("b", 12);
        grid.clear(&["a", "c"]);
        grid.clear_all();
        grid.ensure_all(&["d"]);
        for name in grid.names() {
            assert_eq!(grid.pattern(&name).len(), 12, "track {name}");
        }
    }

    #[test]
    fn active_at_lists_tracks_sorted() {
        let grid = PatternGrid::new(4).unwrap();
        grid.toggle("snare", 2).unwrap();
        grid.toggle("kick", 2).unwrap();
        grid.toggle("kick", 0).unwrap();
        assert_eq!(grid.active_at(2), vec!["kick".to_string(), "snare".to_string()]);
        assert_eq!(grid.active_at(0), vec!["kick".to_string()]);
        assert!(grid.active_at(1).is_empty());
    }

    #[test]
    fn snapshot_is_detached() {
        let grid = PatternGrid::new(4).unwrap();
        grid.toggle("kick", 0).unwrap();
        let snap = grid.snapshot();
        grid.toggle("kick", 1).unwrap();
        assert_eq!(snap["kick"], vec![true, false, false, false]);
    }

    #[test]
    fn concurrent_toggles_keep_invariants() {
        let grid = Arc::new(PatternGrid::new(16).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let grid = Arc::clone(&grid);
                std::thread::spawn(move || {
                    for i in 0..64 {
                        let _ = grid.toggle(&format!("t{}", t % 2), i % 16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(grid.len(), 2);
        // every cell was flipped an even number of times
        for name in grid.names() {
            assert!(grid.pattern(&name).to_vec().iter().all(|on| !on));
        }
    }
}
