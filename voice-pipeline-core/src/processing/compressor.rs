use super::signal::{db_to_linear, linear_to_db};

/// Dynamic range compressor settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl CompressorParams {
    /// Fixed voice tuning with a variable ratio.
    pub fn voice(ratio: f32) -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }

    fn is_valid(&self) -> bool {
        self.ratio >= 1.0
            && self.ratio.is_finite()
            && self.threshold_db.is_finite()
            && self.knee_db >= 0.0
            && self.attack_secs > 0.0
            && self.release_secs > 0.0
    }

    /// Soft-knee static curve: gain change in dB (≤ 0) for an input level in dBFS.
    pub fn static_gain_db(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        let output_db = if self.knee_db > 0.0 && 2.0 * over.abs() <= self.knee_db {
            let x = over + self.knee_db / 2.0;
            input_db + slope * x * x / (2.0 * self.knee_db)
        } else if over > 0.0 {
            self.threshold_db + over / self.ratio
        } else {
            input_db
        };
        output_db - input_db
    }
}

/// Feed-forward compressor with channel-linked peak detection.
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    sample_rate: u32,
    channels: usize,
    attack_coef: f32,
    release_coef: f32,
    gain_db: f32,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: u32, channels: u16) -> Option<Self> {
        if sample_rate == 0 || !params.is_valid() {
            return None;
        }
        let mut compressor = Self {
            params,
            sample_rate,
            channels: channels.max(1) as usize,
            attack_coef: 0.0,
            release_coef: 0.0,
            gain_db: 0.0,
        };
        compressor.update_coefficients();
        Some(compressor)
    }

    pub fn params(&self) -> CompressorParams {
        self.params
    }

    /// Current smoothed gain reduction in dB (≤ 0).
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_db
    }

    /// Retune without resetting the envelope. Returns `false` for invalid params.
    pub fn set_params(&mut self, params: CompressorParams) -> bool {
        if !params.is_valid() {
            return false;
        }
        self.params = params;
        self.update_coefficients();
        true
    }

    fn update_coefficients(&mut self) {
        let fs = self.sample_rate as f32;
        self.attack_coef = (-1.0 / (self.params.attack_secs * fs)).exp();
        self.release_coef = (-1.0 / (self.params.release_secs * fs)).exp();
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(self.channels) {
            let peak = frame.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let target = self.params.static_gain_db(linear_to_db(peak));
            let coef = if target < self.gain_db {
                self.attack_coef
            } else {
                self.release_coef
            };
            self.gain_db = coef * self.gain_db + (1.0 - coef) * target;

            let gain = db_to_linear(self.gain_db);
            frame.iter_mut().for_each(|s| *s *= gain);
        }
    }
}
