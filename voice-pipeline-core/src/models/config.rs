use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::constraints::CaptureConstraints;
use super::stage::StageName;

/// Flat audio settings record: capture processing, effect stages, output gain.
///
/// Which stages are enabled, and every capture field, is structural data.
/// Levels of enabled stages, output gain and the latency hint are in-place data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,

    /// Requested capture sample rate in Hz (default: 48000).
    pub sample_rate_hz: u32,

    /// Requested sample size in bits. Valid values: 8, 16, 24, 32.
    pub sample_bits: u16,

    /// Requested channel count, 1 or 2.
    pub channel_count: u16,

    pub voice_enhancement: bool,
    /// Level driving the voice enhancement boost, 0.0–1.0.
    pub voice_clarity: f32,

    pub voice_isolation: bool,
    /// Level driving the voice isolation band width, 0.0–1.0.
    pub background_noise_reduction: f32,

    // Level-enabled stages: a level above zero enables the stage.
    pub voice_boost: f32,
    pub bass_boost: f32,
    pub treble_boost: f32,
    pub dynamic_range_compression: f32,

    pub stereo_enhancement: bool,
    pub spatial_audio: bool,

    /// Output gain, 0–100 (100 = unity).
    pub output_gain: f32,

    /// Post-capture latency hint for the transport, in milliseconds.
    pub latency_hint_ms: u32,
}

impl EffectConfig {
    pub const MAX_OUTPUT_GAIN: f32 = 100.0;

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate_hz == 0 || self.sample_rate_hz > 384_000 {
            return Err(format!("unsupported sample rate: {}", self.sample_rate_hz));
        }
        if ![8, 16, 24, 32].contains(&self.sample_bits) {
            return Err(format!("unsupported sample size: {}", self.sample_bits));
        }
        if ![1, 2].contains(&self.channel_count) {
            return Err(format!("unsupported channel count: {}", self.channel_count));
        }
        let levels = [
            ("voiceClarity", self.voice_clarity),
            ("backgroundNoiseReduction", self.background_noise_reduction),
            ("voiceBoost", self.voice_boost),
            ("bassBoost", self.bass_boost),
            ("trebleBoost", self.treble_boost),
            ("dynamicRangeCompression", self.dynamic_range_compression),
        ];
        for (name, value) in levels {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} out of range: {value}"));
            }
        }
        if !(0.0..=Self::MAX_OUTPUT_GAIN).contains(&self.output_gain) {
            return Err(format!("output gain out of range: {}", self.output_gain));
        }
        Ok(())
    }

    /// Apply a partial update. Levels are clamped to their ranges.
    pub fn merged(&self, patch: &EffectConfigPatch) -> Self {
        let mut next = self.clone();

        if let Some(v) = patch.echo_cancellation {
            next.echo_cancellation = v;
        }
        if let Some(v) = patch.noise_suppression {
            next.noise_suppression = v;
        }
        if let Some(v) = patch.auto_gain_control {
            next.auto_gain_control = v;
        }
        if let Some(v) = patch.sample_rate_hz {
            next.sample_rate_hz = v;
        }
        if let Some(v) = patch.sample_bits {
            next.sample_bits = v;
        }
        if let Some(v) = patch.channel_count {
            next.channel_count = v;
        }
        if let Some(v) = patch.voice_enhancement {
            next.voice_enhancement = v;
        }
        if let Some(v) = patch.voice_clarity {
            next.voice_clarity = clamp_level(v);
        }
        if let Some(v) = patch.voice_isolation {
            next.voice_isolation = v;
        }
        if let Some(v) = patch.background_noise_reduction {
            next.background_noise_reduction = clamp_level(v);
        }
        if let Some(v) = patch.voice_boost {
            next.voice_boost = clamp_level(v);
        }
        if let Some(v) = patch.bass_boost {
            next.bass_boost = clamp_level(v);
        }
        if let Some(v) = patch.treble_boost {
            next.treble_boost = clamp_level(v);
        }
        if let Some(v) = patch.dynamic_range_compression {
            next.dynamic_range_compression = clamp_level(v);
        }
        if let Some(v) = patch.stereo_enhancement {
            next.stereo_enhancement = v;
        }
        if let Some(v) = patch.spatial_audio {
            next.spatial_audio = v;
        }
        if let Some(v) = patch.output_gain {
            next.output_gain = if v.is_nan() {
                next.output_gain
            } else {
                v.clamp(0.0, Self::MAX_OUTPUT_GAIN)
            };
        }
        if let Some(v) = patch.latency_hint_ms {
            next.latency_hint_ms = v;
        }

        next
    }

    /// Stages present in the chain for this config. Changing this set is structural.
    pub fn enabled_stages(&self) -> BTreeSet<StageName> {
        let mut stages = BTreeSet::new();
        if self.echo_cancellation || self.noise_suppression || self.auto_gain_control {
            stages.insert(StageName::ConditioningHighPass);
            stages.insert(StageName::ConditioningLowPass);
        }
        if self.voice_enhancement {
            stages.insert(StageName::VoiceEnhancement);
        }
        if self.voice_isolation {
            stages.insert(StageName::VoiceIsolation);
        }
        if self.voice_boost > 0.0 {
            stages.insert(StageName::VoiceBoost);
        }
        if self.bass_boost > 0.0 {
            stages.insert(StageName::BassBoost);
        }
        if self.treble_boost > 0.0 {
            stages.insert(StageName::TrebleBoost);
        }
        if self.dynamic_range_compression > 0.0 {
            stages.insert(StageName::Compression);
        }
        if self.stereo_enhancement {
            stages.insert(StageName::StereoEnhancement);
        }
        if self.spatial_audio {
            stages.insert(StageName::SpatialAudio);
        }
        stages
    }

    /// Linear output gain applied after the chain.
    pub fn output_gain_linear(&self) -> f32 {
        self.output_gain / Self::MAX_OUTPUT_GAIN
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            sample_rate_hz: 48000,
            sample_bits: 16,
            channel_count: 1,
            voice_enhancement: false,
            voice_clarity: 0.5,
            voice_isolation: false,
            background_noise_reduction: 0.5,
            voice_boost: 0.0,
            bass_boost: 0.0,
            treble_boost: 0.0,
            dynamic_range_compression: 0.0,
            stereo_enhancement: false,
            spatial_audio: false,
            output_gain: 100.0,
            latency_hint_ms: 20,
        }
    }
}

fn clamp_level(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Partial update of an [`EffectConfig`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectConfigPatch {
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub sample_rate_hz: Option<u32>,
    pub sample_bits: Option<u16>,
    pub channel_count: Option<u16>,
    pub voice_enhancement: Option<bool>,
    pub voice_clarity: Option<f32>,
    pub voice_isolation: Option<bool>,
    pub background_noise_reduction: Option<f32>,
    pub voice_boost: Option<f32>,
    pub bass_boost: Option<f32>,
    pub treble_boost: Option<f32>,
    pub dynamic_range_compression: Option<f32>,
    pub stereo_enhancement: Option<bool>,
    pub spatial_audio: Option<bool>,
    pub output_gain: Option<f32>,
    pub latency_hint_ms: Option<u32>,
}

/// How a configuration change must be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Nothing observable changed.
    Unchanged,
    /// Parameters of existing stages only; session and topology untouched.
    InPlace,
    /// Session must be reopened and the graph rebuilt.
    Structural,
}

impl ChangeKind {
    /// Classify the transition between two configs (device selection aside).
    pub fn classify(before: &EffectConfig, after: &EffectConfig) -> Self {
        if before == after {
            return Self::Unchanged;
        }
        let constraints_changed = CaptureConstraints::from_config(before, None)
            != CaptureConstraints::from_config(after, None);
        if constraints_changed || before.enabled_stages() != after.enabled_stages() {
            Self::Structural
        } else {
            Self::InPlace
        }
    }
}
