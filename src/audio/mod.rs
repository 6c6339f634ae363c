use anyhow::Context;
use crossbeam_channel::Sender;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio_api::{AudioCommand, DecodedSample, SoundTrigger};

pub mod export;
pub mod mixer;
pub mod resample;
pub mod wav;

mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use engine::{Engine, MAX_VOICES};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;

const COMMAND_QUEUE: usize = 1024;

/// Owns the output stream; dropping it silences playback.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Convert and hand a decoded sample to the engine under `name`.
    pub fn register(&self, name: &str, sample: &DecodedSample) {
        self.send(AudioCommand::RegisterSample {
            name: name.to_string(),
            buffer: SampleBuffer::from_decoded(sample, self.sample_rate),
        });
    }

    pub fn trigger(&self) -> ChannelTrigger {
        ChannelTrigger { tx: self.tx.clone() }
    }
}

/// `SoundTrigger` that queues onto the engine's command channel. A full queue
/// drops the hit rather than stalling the clock.
#[derive(Clone)]
pub struct ChannelTrigger {
    tx: Sender<AudioCommand>,
}

impl ChannelTrigger {
    pub fn new(tx: Sender<AudioCommand>) -> Self {
        Self { tx }
    }
}

impl SoundTrigger for ChannelTrigger {
    fn play(&self, name: &str) {
        let cmd = AudioCommand::Trigger { name: name.to_string(), gain: 1.0 };
        if self.tx.try_send(cmd).is_err() {
            log::warn!(target: "beatpad::audio", "command queue full, dropped '{name}'");
        }
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate: u32 = config.sample_rate().into();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let mut engine = Engine::new();
            let mut scratch: Vec<StereoFrame> = Vec::with_capacity(4096);
            let err_fn = |err| log::error!(target: "beatpad::audio", "output stream error: {err}");

            let stream = device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _info| {
                    while let Ok(cmd) = rx.try_recv() { // set up command handling
                        engine.handle_cmd(cmd);
                    }

                    let n_frames = data.len() / channels.max(1);
                    scratch.resize(n_frames, StereoFrame::zero()); // only grows once
                    engine.render_block(&mut scratch);

                    for (out, f) in data.chunks_mut(channels.max(1)).zip(&scratch) {
                        match out {
                            [mono] => *mono = f.to_mono(),
                            [l, r, rest @ ..] => {
                                *l = f.left;
                                *r = f.right;
                                rest.iter_mut().for_each(|s| *s = 0.0);
                            }
                            [] => {}
                        }
                    }
                },
                err_fn,
                None,
            )?;
            stream.play().context("failed to play output stream")?;
            log::info!(target: "beatpad::audio", "output at {sample_rate} Hz, {channels} channels");

            Ok(AudioHandle {
                tx,
                sample_rate,
                _output_stream: stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}
