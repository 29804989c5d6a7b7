use crate::models::device::CaptureFormat;

/// Pure-math conversion from whatever the platform delivers to the graph's input format.
///
/// Channel remapping happens first (downmix or duplicate), then linear
/// interpolation resampling over interleaved frames.
#[derive(Debug, Clone, Copy)]
pub struct FormatAdapter {
    pub target: CaptureFormat,
}

impl FormatAdapter {
    pub fn new(target: CaptureFormat) -> Self {
        Self { target }
    }

    /// Convert interleaved `samples` at (`sample_rate`, `channels`) into the target format.
    pub fn adapt(&self, samples: &[f32], sample_rate: f64, channels: u16) -> Vec<f32> {
        let remapped = remap_channels(samples, channels as usize, self.target.channels as usize);
        self.resample(&remapped, sample_rate)
    }

    /// Linear interpolation resampling for interleaved audio in the target channel layout.
    ///
    /// Returns input unchanged if rates match.
    pub fn resample(&self, samples: &[f32], source_sample_rate: f64) -> Vec<f32> {
        let target_rate = self.target.sample_rate as f64;
        if (source_sample_rate - target_rate).abs() < 0.01 || samples.is_empty() || source_sample_rate <= 0.0 {
            return samples.to_vec();
        }

        let channels = self.target.channels.max(1) as usize;
        let frame_count = samples.len() / channels;
        let ratio = target_rate / source_sample_rate;
        let output_frames = (frame_count as f64 * ratio) as usize;
        if output_frames == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0f32; output_frames * channels];
        for i in 0..output_frames {
            let source_index = i as f64 / ratio;
            let index = source_index as usize;
            let fraction = (source_index - index as f64) as f32;

            for ch in 0..channels {
                if index + 1 < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch] * (1.0 - fraction)
                        + samples[(index + 1) * channels + ch] * fraction;
                } else if index < frame_count {
                    output[i * channels + ch] = samples[index * channels + ch];
                }
            }
        }
        output
    }
}

/// Convert interleaved audio between channel counts.
///
/// Multi-channel input is averaged down to mono first; mono is duplicated
/// into every output channel.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let mono = downmix_to_mono(samples, from);
    if to == 1 {
        return mono;
    }
    let mut out = Vec::with_capacity(mono.len() * to);
    for sample in mono {
        out.extend(std::iter::repeat(sample).take(to));
    }
    out
}

/// Average interleaved channels into a single mono channel.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-9).log10()
}
