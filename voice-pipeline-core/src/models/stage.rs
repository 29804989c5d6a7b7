use std::fmt;

/// Logical name of one DSP stage in the effect chain.
///
/// Variants are declared in chain order, so `Ord` follows signal flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageName {
    ConditioningHighPass,
    ConditioningLowPass,
    VoiceEnhancement,
    VoiceIsolation,
    VoiceBoost,
    BassBoost,
    TrebleBoost,
    Compression,
    StereoEnhancement,
    SpatialAudio,
}

impl StageName {
    /// Required processing order: each stage assumes the ones before it already ran.
    pub const CHAIN_ORDER: [StageName; 10] = [
        StageName::ConditioningHighPass,
        StageName::ConditioningLowPass,
        StageName::VoiceEnhancement,
        StageName::VoiceIsolation,
        StageName::VoiceBoost,
        StageName::BassBoost,
        StageName::TrebleBoost,
        StageName::Compression,
        StageName::StereoEnhancement,
        StageName::SpatialAudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConditioningHighPass => "conditioning-highpass",
            Self::ConditioningLowPass => "conditioning-lowpass",
            Self::VoiceEnhancement => "voice-enhancement",
            Self::VoiceIsolation => "voice-isolation",
            Self::VoiceBoost => "voice-boost",
            Self::BassBoost => "bass-boost",
            Self::TrebleBoost => "treble-boost",
            Self::Compression => "compression",
            Self::StereoEnhancement => "stereo-enhancement",
            Self::SpatialAudio => "spatial-audio",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
