// The live step clock.
//
// One named thread owns the loop. Each pass it fires every track that is on at
// the current step, reports the step, advances modulo the step count, then
// waits on the stop channel until the next step is due. A message (or the
// sender being dropped) ends the loop, so stop() wakes it immediately instead
// of waiting out the step.
//
// The step length is read from the tempo once, in start(). set_bpm() while
// running only takes effect on the next start().

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::audio_api::SoundTrigger;
use crate::error::{ClockError, ConfigError};
use crate::pipeline::grid::PatternGrid;
use crate::shared::Tempo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    Started,
    Tick(usize),
    Stopped,
}

#[derive(Default)]
struct Subscribers(Mutex<Vec<Sender<ClockEvent>>>);

impl Subscribers {
    fn add(&self) -> Receiver<ClockEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock().push(tx);
        rx
    }

    fn notify(&self, event: ClockEvent) {
        // drop anyone who hung up
        self.lock().retain(|tx| tx.send(event).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<ClockEvent>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Run {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
    step_duration: Duration,
}

pub struct StepClock {
    grid: Arc<PatternGrid>,
    bpm: AtomicU32,
    running: Arc<AtomicBool>,
    current_step: Arc<AtomicUsize>,
    subscribers: Arc<Subscribers>,
    run: Option<Run>,
}

impl StepClock {
    pub fn new(tempo: Tempo, grid: Arc<PatternGrid>) -> Self {
        Self {
            grid,
            bpm: AtomicU32::new(tempo.bpm()),
            running: Arc::new(AtomicBool::new(false)),
            current_step: Arc::new(AtomicUsize::new(0)),
            subscribers: Arc::new(Subscribers::default()),
            run: None,
        }
    }

    pub fn grid(&self) -> &Arc<PatternGrid> {
        &self.grid
    }

    pub fn tempo(&self) -> Tempo {
        // only ever stored from a validated Tempo
        Tempo::new(self.bpm.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Relaxed)
    }

    /// Store a new tempo for the next start(). An in-progress run keeps its
    /// step length.
    pub fn set_bpm(&self, bpm: u32) -> Result<(), ConfigError> {
        let tempo = Tempo::new(bpm)?;
        self.bpm.store(tempo.bpm(), Ordering::Relaxed);
        log::debug!(target: "beatpad::clock", "bpm set to {}", tempo.bpm());
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Last step reported to observers.
    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::Relaxed)
    }

    /// Step length the current run was started with.
    pub fn active_step_duration(&self) -> Option<Duration> {
        self.run.as_ref().map(|r| r.step_duration)
    }

    /// Receive Started / Tick / Stopped events. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> Receiver<ClockEvent> {
        self.subscribers.add()
    }

    pub fn start<F>(&mut self, trigger: Arc<dyn SoundTrigger>, mut on_tick: F) -> Result<(), ClockError>
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.stop();

        let step_duration = self.tempo().step_duration();
        let steps = self.grid.steps().max(1);
        let grid = Arc::clone(&self.grid);
        let current_step = Arc::clone(&self.current_step);
        let subscribers = Arc::clone(&self.subscribers);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        current_step.store(0, Ordering::Relaxed);

        // visible before the first tick can fire
        self.running.store(true, Ordering::Release);
        self.subscribers.notify(ClockEvent::Started);

        let spawned = thread::Builder::new()
            .name("beatpad-clock".into())
            .spawn(move || {
                let mut step = 0;
                let mut due = Instant::now();
                loop {
                    for name in grid.active_at(step) {
                        trigger.play(&name);
                    }
                    current_step.store(step, Ordering::Relaxed);
                    on_tick(step);
                    subscribers.notify(ClockEvent::Tick(step));
                    log::trace!(target: "beatpad::clock", "step {step}");

                    step = (step + 1) % steps;
                    due += step_duration;
                    let now = Instant::now();
                    if due + step_duration < now {
                        // fell more than a step behind; resync instead of bursting
                        due = now;
                    }
                    match stop_rx.recv_deadline(due) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.subscribers.notify(ClockEvent::Stopped);
                return Err(ClockError::Spawn(e));
            }
        };

        self.run = Some(Run { stop_tx, handle, step_duration });
        log::info!(
            target: "beatpad::clock",
            "started: {} bpm, {} steps, {:?} per step",
            self.bpm(),
            steps,
            step_duration
        );
        Ok(())
    }

    /// Cancel the loop and wait for the thread to finish. Safe to call when
    /// already stopped.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.stop_tx.try_send(());
            drop(run.stop_tx);
            if run.handle.join().is_err() {
                log::error!(target: "beatpad::clock", "clock thread panicked");
            }
            self.subscribers.notify(ClockEvent::Stopped);
            log::info!(target: "beatpad::clock", "stopped");
        }
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for StepClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl SoundTrigger for Silent {
        fn play(&self, _name: &str) {}
    }

    fn clock(bpm: u32, steps: usize) -> StepClock {
        let grid = Arc::new(PatternGrid::new(steps).unwrap());
        StepClock::new(Tempo::new(bpm).unwrap(), grid)
    }

    #[test]
    fn stop_is_idempotent() {
        let mut c = clock(120, 16);
        c.stop();
        assert!(!c.is_running());
        c.stop();
        assert!(!c.is_running());
    }

    #[test]
    fn start_then_stop_flips_running() {
        let mut c = clock(200, 4);
        c.start(Arc::new(Silent), |_| {}).unwrap();
        assert!(c.is_running());
        c.stop();
        assert!(!c.is_running());
        c.stop();
        assert!(!c.is_running());
    }

    #[test]
    fn step_duration_is_fixed_at_start() {
        let mut c = clock(120, 16);
        c.start(Arc::new(Silent), |_| {}).unwrap();
        assert_eq!(c.active_step_duration(), Some(Duration::from_millis(125)));

        c.set_bpm(200).unwrap();
        assert_eq!(c.bpm(), 200);
        assert_eq!(c.active_step_duration(), Some(Duration::from_millis(125)));

        c.start(Arc::new(Silent), |_| {}).unwrap();
        assert_eq!(c.active_step_duration(), Some(Duration::from_millis(75)));
        c.stop();
        assert_eq!(c.active_step_duration(), None);
    }

    #[test]
    fn set_bpm_rejects_out_of_range() {
        let c = clock(120, 16);
        assert!(c.set_bpm(10).is_err());
        assert_eq!(c.bpm(), 120);
    }

    #[test]
    fn started_is_seen_before_the_first_tick() {
        let mut c = clock(200, 4);
        let rx = c.subscribe();
        let running = Arc::clone(&c.running);
        let (seen_tx, seen_rx) = crossbeam_channel::bounded(1);
        c.start(Arc::new(Silent), move |step| {
            if step == 0 {
                let _ = seen_tx.try_send(running.load(Ordering::Acquire));
            }
        })
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), ClockEvent::Started);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), ClockEvent::Tick(0));
        assert!(seen_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        c.stop();
    }

    #[test]
    fn empty_grid_still_ticks_and_wraps() {
        let mut c = clock(200, 3);
        let rx = c.subscribe();
        c.start(Arc::new(Silent), |_| {}).unwrap();
        let mut ticks = Vec::new();
        while ticks.len() < 4 {
            match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
                ClockEvent::Tick(i) => ticks.push(i),
                _ => {}
            }
        }
        c.stop();
        assert_eq!(ticks, vec![0, 1, 2, 0]);
    }
}
