// PCM16 WAV in and out, via hound.
//
// hound writes the canonical 44-byte header (RIFF, `fmt ` with format tag 1,
// `data`) for 16-bit PCM with one or two channels, which is all we emit.

use std::io::{Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::audio_api::DecodedSample;
use crate::error::DecodeError;

pub const BITS_PER_SAMPLE: u16 = 16;

pub fn pcm16_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// Encode interleaved PCM16 into `out` and finalize the header sizes.
pub fn write_pcm16<W: Write + Seek>(
    out: W,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::new(out, pcm16_spec(sample_rate, channels))?;
    {
        let mut w16 = writer.get_i16_writer(samples.len() as u32);
        for &s in samples {
            w16.write_sample(s);
        }
        w16.flush()?;
    }
    writer.finalize()
}

/// Decode a WAV file to PCM16, converting other integer depths and float data.
pub fn read_wav_pcm16(path: &Path) -> Result<DecodedSample, DecodeError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(DecodeError::Malformed(format!(
            "{}: {} channels at {} Hz",
            path.display(),
            spec.channels,
            spec.sample_rate
        )));
    }

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader.samples::<i16>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            // rescale to 16 bits by shifting
            let shift = bits as i32 - 16;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|x| {
                        let v = if shift >= 0 { x >> shift } else { x << -shift };
                        v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
                    })
                })
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|x| (x.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16))
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(DecodeError::Unsupported(format!("{format:?} at {bits} bits")));
        }
    };

    Ok(DecodedSample {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
