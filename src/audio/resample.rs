// Linear-interpolation resampler over interleaved PCM16.
//
// Deterministic: the same input always yields the same output, no dithering.
// Good enough for one-shot drum hits; a windowed-sinc pass could replace it
// without changing any caller.

/// Resample `samples` (interleaved, `channels` wide) from `source_rate` to
/// `target_rate`. Output has `ceil(frames * target / source)` frames.
pub fn resample_linear(samples: &[i16], channels: usize, source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || channels == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }
    let (src, dst) = (source_rate as u64, target_rate as u64);
    let out_frames = ((frames as u64 * dst).div_ceil(src)) as usize;
    let mut out = Vec::with_capacity(out_frames * channels);

    for i in 0..out_frames {
        // fractional position in the source, ex. 3.7
        let src_pos = (i as u64 * src) as f64 / dst as f64;
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;
        if idx + 1 >= frames {
            // past the last pair, hold the final frame
            let last = (frames - 1) * channels;
            out.extend_from_slice(&samples[last..last + channels]);
            continue;
        }
        for ch in 0..channels {
            let a = samples[idx * channels + ch] as f64;
            let b = samples[(idx + 1) * channels + ch] as f64;
            let v = a + (b - a) * frac;
            out.push(v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
        }
    }
    out
}
