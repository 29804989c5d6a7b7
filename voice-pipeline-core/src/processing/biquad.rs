//! Second-order IIR filters (RBJ audio EQ cookbook).
//!
//! Coefficients are designed in f64 and run in transposed direct form II with
//! one state pair per interleaved channel.

use std::f64::consts::PI;

/// Response shape of a biquad stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    HighPass,
    LowPass,
    /// Constant 0 dB peak gain.
    BandPass,
    Peaking,
    LowShelf,
    HighShelf,
}

/// User-facing filter parameters. `gain_db` is ignored by pass filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub kind: FilterKind,
    pub frequency_hz: f32,
    pub q: f32,
    pub gain_db: f32,
}

/// Lowest corner frequency accepted, in Hz.
const MIN_FREQUENCY_HZ: f64 = 10.0;
/// Highest corner frequency as a fraction of the sample rate (just under Nyquist).
const MAX_FREQUENCY_RATIO: f64 = 0.49;

/// Normalized biquad coefficients (`a0` = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// Design coefficients for `params` at `sample_rate`.
    ///
    /// The frequency is clamped into `[10 Hz, 0.49·fs]`. Returns `None` when the
    /// result is non-finite or unstable.
    pub fn design(params: &FilterParams, sample_rate: u32) -> Option<Self> {
        if sample_rate == 0 {
            return None;
        }
        let fs = sample_rate as f64;
        let f0 = (params.frequency_hz as f64).clamp(MIN_FREQUENCY_HZ, fs * MAX_FREQUENCY_RATIO);
        let q = (params.q as f64).max(1e-3);
        let w0 = 2.0 * PI * f0 / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10f64.powf(params.gain_db as f64 / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match params.kind {
            FilterKind::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::BandPass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterKind::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterKind::LowShelf | FilterKind::HighShelf => {
                // Shelf slope S = 1: the steepest slope without overshoot.
                let shelf_alpha = sin_w0 / 2.0 * 2f64.sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * shelf_alpha;
                if params.kind == FilterKind::LowShelf {
                    (
                        a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                        a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                        (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                        -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                        (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                    )
                } else {
                    (
                        a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                        a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                        (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                        2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                        (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                    )
                }
            }
        };

        let coefficients = Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        };
        coefficients.is_stable().then_some(coefficients)
    }

    /// Poles strictly inside the unit circle and every coefficient finite.
    pub fn is_stable(&self) -> bool {
        let finite = [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite());
        finite && self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Magnitude response in dB at `frequency_hz`.
    pub fn magnitude_db(&self, frequency_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        let magnitude = (num_re.hypot(num_im)) / (den_re.hypot(den_im));
        20.0 * magnitude.max(1e-12).log10()
    }
}

/// A running biquad filter over interleaved audio.
#[derive(Debug, Clone)]
pub struct Biquad {
    params: FilterParams,
    sample_rate: u32,
    coefficients: Coefficients,
    state: Vec<[f64; 2]>,
}

impl Biquad {
    /// Returns `None` if the parameters yield unusable coefficients.
    pub fn new(params: FilterParams, sample_rate: u32, channels: u16) -> Option<Self> {
        let coefficients = Coefficients::design(&params, sample_rate)?;
        Some(Self {
            params,
            sample_rate,
            coefficients,
            state: vec![[0.0; 2]; channels.max(1) as usize],
        })
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    /// Retune without clearing filter memory. Keeps the old tuning and returns
    /// `false` if the new parameters are unusable.
    pub fn set_params(&mut self, params: FilterParams) -> bool {
        match Coefficients::design(&params, self.sample_rate) {
            Some(coefficients) => {
                self.params = params;
                self.coefficients = coefficients;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|z| *z = [0.0; 2]);
    }

    /// Filter interleaved samples in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        let c = self.coefficients;
        let channels = self.state.len();
        for frame in samples.chunks_exact_mut(channels) {
            for (sample, z) in frame.iter_mut().zip(self.state.iter_mut()) {
                let x = *sample as f64;
                let y = c.b0 * x + z[0];
                z[0] = c.b1 * x - c.a1 * y + z[1];
                z[1] = c.b2 * x - c.a2 * y;
                *sample = y as f32;
            }
        }
    }
}
