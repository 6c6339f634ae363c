use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;

use beatpad::audio::export::unique_target;
use beatpad::audio::{self, AudioHandle};
use beatpad::loader::sample_loader::WavDirSource;
use beatpad::pipeline::beat::BeatFile;
use beatpad::shared::{DEFAULT_SAMPLE_RATE, DEFAULT_STEPS};
use beatpad::{ClockEvent, Exporter, PatternGrid, SampleSource, StepClock, Tempo};

const USAGE: &str = "\
usage:
  beatpad play   <beat.json> [--samples DIR] [--verbose]
  beatpad export <beat.json> [--samples DIR] [--out DIR] [--name NAME] [--verbose]
  beatpad init   <beat.json> [--samples DIR]

keys while playing: space start/stop, +/- bpm, c clear, esc or q quit";

#[derive(Debug, Default)]
struct Args {
    command: String,
    beat: PathBuf,
    samples: Option<PathBuf>,
    out: Option<PathBuf>,
    name: Option<String>,
    verbose: bool,
}

impl Args {
    fn parse(mut raw: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut args = Args::default();
        let mut positional = Vec::new();
        while let Some(arg) = raw.next() {
            match arg.as_str() {
                "--samples" => args.samples = Some(raw.next().context("--samples needs a directory")?.into()),
                "--out" => args.out = Some(raw.next().context("--out needs a directory")?.into()),
                "--name" => args.name = Some(raw.next().context("--name needs a value")?),
                "--verbose" | "-v" => args.verbose = true,
                flag if flag.starts_with('-') => bail!("unknown flag {flag}\n\n{USAGE}"),
                _ => positional.push(arg),
            }
        }
        let mut positional = positional.into_iter();
        args.command = positional.next().context(USAGE)?;
        args.beat = positional.next().context(USAGE)?.into();
        Ok(args)
    }

    // samples default to the beat file's own directory
    fn samples_dir(&self) -> PathBuf {
        self.samples.clone().unwrap_or_else(|| {
            self.beat
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    init_logging(args.verbose);

    match args.command.as_str() {
        "play" => play(&args),
        "export" => export(&args),
        "init" => init(&args),
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
}

// Logs go to a file so they never tear up the raw-mode terminal
fn init_logging(verbose: bool) {
    use simplelog::*;

    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    match std::fs::File::create("beatpad.log") {
        Ok(file) => {
            let _ = WriteLogger::init(level, Config::default(), file);
        }
        Err(e) => eprintln!("beatpad: logging disabled ({e})"),
    }
    log::info!("beatpad starting (log level: {:?})", level);
}

fn export(args: &Args) -> anyhow::Result<()> {
    let beat = BeatFile::load(&args.beat)?;
    let grid = beat.to_grid()?;
    let source = WavDirSource::new(args.samples_dir());
    let out_dir = args.out.clone().unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let name = args.name.clone().unwrap_or_else(|| {
        args.beat
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let path = Exporter::new()
        .export_grid(&grid, &source, beat.bpm, beat.sample_rate, &out_dir, &name)
        .context("export failed")?;
    println!("Exported: {}", path.display());
    Ok(())
}

// Write a starter beat with one empty track per sample found
fn init(args: &Args) -> anyhow::Result<()> {
    let source = WavDirSource::new(args.samples_dir());
    let names = source
        .names()
        .with_context(|| format!("listing samples in {}", source.dir().display()))?;
    if names.is_empty() {
        bail!("no .wav samples in {}", source.dir().display());
    }
    let grid = PatternGrid::new(DEFAULT_STEPS)?;
    grid.ensure_all(&names);
    let beat = BeatFile::from_grid(&grid, Tempo::default(), DEFAULT_SAMPLE_RATE);

    let target = unique_target(&args.beat);
    std::fs::write(&target, beat.to_json()?).with_context(|| format!("writing {}", target.display()))?;
    println!("Wrote {} with {} tracks", target.display(), names.len());
    Ok(())
}

fn play(args: &Args) -> anyhow::Result<()> {
    let beat = BeatFile::load(&args.beat)?;
    let grid = Arc::new(beat.to_grid()?);
    let source = WavDirSource::new(args.samples_dir());
    let audio = audio::start_audio()?;
    preload(&audio, &source, &grid);

    let mut clock = StepClock::new(beat.bpm, Arc::clone(&grid));
    let events = clock.subscribe();
    let trigger = Arc::new(audio.trigger());

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    println!("{USAGE}\r");

    clock.start(trigger.clone(), |_| {})?;
    let tick_rate = Duration::from_millis(16); // ~60fps
    loop {
        while let Ok(ev) = events.try_recv() {
            if let ClockEvent::Tick(step) = ev {
                draw_status(&clock, step)?;
            }
        }

        if !event::poll(tick_rate)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => break,
            KeyCode::Char(' ') => {
                if clock.is_running() {
                    clock.stop();
                } else {
                    clock.start(trigger.clone(), |_| {})?;
                }
            }
            // takes effect on the next start
            KeyCode::Char('+') | KeyCode::Char('=') => clock.set_bpm(clock.tempo().faster().bpm())?,
            KeyCode::Char('-') => clock.set_bpm(clock.tempo().slower().bpm())?,
            KeyCode::Char('c') => grid.clear_all(),
            _ => {}
        }
        draw_status(&clock, clock.current_step())?;
    }

    clock.stop();
    println!("\r");
    Ok(())
}

// Decode every track up front; the engine can't block on the disk
fn preload(audio: &AudioHandle, source: &WavDirSource, grid: &PatternGrid) {
    for name in grid.names() {
        match source.load_pcm16(&name) {
            Ok(sample) => audio.register(&name, &sample),
            Err(e) => log::warn!("track '{name}' has no playable sample: {e}"),
        }
    }
}

fn draw_status(clock: &StepClock, step: usize) -> anyhow::Result<()> {
    let steps = clock.grid().steps();
    let cells: String = (0..steps)
        .map(|i| match (i == step, clock.grid().active_at(i).is_empty()) {
            (true, _) => '#',
            (false, false) => 'x',
            (false, true) => '.',
        })
        .collect();
    let state = if clock.is_running() { "playing" } else { "stopped" };
    let mut out = std::io::stdout();
    crossterm::execute!(out, terminal::Clear(terminal::ClearType::CurrentLine))?;
    write!(out, "\r[{cells}] {state} {} bpm", clock.bpm())?;
    out.flush()?;
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: &[&str]) -> anyhow::Result<Args> {
        Args::parse(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_anywhere() {
        let a = parse(&["export", "--out", "renders", "beats/loop.json", "--name", "My Loop", "-v"]).unwrap();
        assert_eq!(a.command, "export");
        assert_eq!(a.beat, PathBuf::from("beats/loop.json"));
        assert_eq!(a.out, Some(PathBuf::from("renders")));
        assert_eq!(a.name.as_deref(), Some("My Loop"));
        assert!(a.verbose);
        assert_eq!(a.samples_dir(), PathBuf::from("beats"));
    }

    #[test]
    fn bare_beat_file_uses_cwd_for_samples() {
        let a = parse(&["play", "loop.json"]).unwrap();
        assert_eq!(a.samples_dir(), PathBuf::from("."));
    }

    #[test]
    fn missing_arguments_are_errors() {
        assert!(parse(&["play"]).is_err());
        assert!(parse(&["export", "x.json", "--out"]).is_err());
        assert!(parse(&["export", "x.json", "--bogus"]).is_err());
    }
}
