// beatpad: the timing and rendering core of a pad-based beat maker.
//
// `pipeline` holds the step grid and the live clock, `audio` the offline
// mixdown, WAV export and the live playback engine, `loader` the WAV-backed
// sample source. Platform services come in through the traits in `audio_api`.

pub mod audio;
pub mod audio_api;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod shared;

pub use audio::export::{ExportRequest, Exporter, OwnedTrack};
pub use audio::mixer::{ExportJob, RenderedAudio, TrackMix, render};
pub use audio_api::{DecodedSample, SampleSource, SoundTrigger};
pub use error::{ClockError, ConfigError, DecodeError, ExportError, PatternError};
pub use pipeline::grid::{PatternGrid, StepPattern};
pub use pipeline::sequencer::{ClockEvent, StepClock};
pub use shared::Tempo;
