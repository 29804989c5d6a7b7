/// Real-time level metering (RMS and peak, 0.0–1.0) before and after the effect chain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub input_level: f32,
    pub input_peak: f32,
    pub output_level: f32,
    pub output_peak: f32,
}

/// Counters for debugging pipeline behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    pub rebuilds_completed: u64,
    pub rebuilds_failed: u64,
    pub rebuilds_coalesced: u64,
    pub in_place_updates: u64,
    pub frames_processed: u64,
}
