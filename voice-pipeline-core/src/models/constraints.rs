use super::config::EffectConfig;
use super::device::CaptureFormat;

/// Everything a capture session requests from the platform.
///
/// Two constraint sets are equal iff every field is equal; equal constraints
/// never require reopening the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate_hz: u32,
    pub sample_bits: u16,
    pub channel_count: u16,
    /// Specific capture device, or `None` for the platform default.
    pub device_id: Option<String>,
}

impl CaptureConstraints {
    pub fn from_config(config: &EffectConfig, device_id: Option<&str>) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            sample_rate_hz: config.sample_rate_hz,
            sample_bits: config.sample_bits,
            channel_count: config.channel_count,
            device_id: device_id.map(str::to_string),
        }
    }

    /// Format being asked for. The platform may deliver something else.
    pub fn requested_format(&self) -> CaptureFormat {
        CaptureFormat::new(self.sample_rate_hz, self.channel_count)
    }

    /// Whether any platform-side voice processing is requested.
    pub fn wants_voice_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::from_config(&EffectConfig::default(), None)
    }
}
