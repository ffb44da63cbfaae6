//! Two-band tone shaping
//!
//! Low shelf at 200 Hz and high shelf at 3 kHz (RBJ Audio EQ Cookbook
//! biquads) applied as one offline pass over the whole rendered buffer,
//! followed by the output gain stage. There is no parameter smoothing:
//! knob values cannot move mid-buffer in an offline render.

use std::f32::consts::PI;

use crate::render::RenderedBuffer;

const BASS_SHELF_HZ: f32 = 200.0;
const TREBLE_SHELF_HZ: f32 = 3000.0;
/// Shelf gains are clamped to this magnitude in dB
const MAX_SHELF_DB: f32 = 24.0;

/// Raw tone-control knob values
///
/// Bass and treble are arbitrary-range knobs; the shaper divides them by
/// 10 and clamps to ±24 dB. Volume is a plain linear scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneParams {
    pub bass: f32,
    pub treble: f32,
    pub volume: f32,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            bass: 0.0,
            treble: 0.0,
            volume: 1.0,
        }
    }
}

/// Biquad filter coefficients
#[derive(Clone, Copy, Default)]
struct BiquadCoeffs {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
}

/// Biquad filter state for a single channel
#[derive(Default, Clone)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.a0 * input + coeffs.a1 * self.x1 + coeffs.a2 * self.x2
            - coeffs.b1 * self.y1
            - coeffs.b2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Low shelf coefficients (RBJ cookbook)
fn low_shelf_coeffs(sample_rate: f32, freq: f32, gain_db: f32) -> BiquadCoeffs {
    if gain_db.abs() < 0.01 {
        return unity();
    }

    let a = 10.0f32.powf(gain_db / 40.0); // sqrt(10^(dB/20))
    let omega = 2.0 * PI * freq / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha = sin_omega / 2.0 * (2.0f32).sqrt(); // Slope = 1
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    let a0 = (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha;

    BiquadCoeffs {
        a0: (a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
        a1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
        a2: (a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
        b1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
        b2: ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
    }
}

/// High shelf coefficients (RBJ cookbook)
fn high_shelf_coeffs(sample_rate: f32, freq: f32, gain_db: f32) -> BiquadCoeffs {
    if gain_db.abs() < 0.01 {
        return unity();
    }

    let a = 10.0f32.powf(gain_db / 40.0);
    let omega = 2.0 * PI * freq / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha = sin_omega / 2.0 * (2.0f32).sqrt();
    let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

    let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;

    BiquadCoeffs {
        a0: (a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
        a1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
        a2: (a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
        b1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
        b2: ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
    }
}

fn unity() -> BiquadCoeffs {
    BiquadCoeffs {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Offline two-band shelving EQ plus output gain
pub struct ToneShaper {
    sample_rate: f32,
    bass_db: f32,
    treble_db: f32,
    volume: f32,
}

impl ToneShaper {
    pub fn new(sample_rate: u32, params: ToneParams) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            bass_db: (params.bass / 10.0).clamp(-MAX_SHELF_DB, MAX_SHELF_DB),
            treble_db: (params.treble / 10.0).clamp(-MAX_SHELF_DB, MAX_SHELF_DB),
            volume: params.volume,
        }
    }

    /// Normalized bass shelf gain in dB
    pub fn bass_db(&self) -> f32 {
        self.bass_db
    }

    /// Normalized treble shelf gain in dB
    pub fn treble_db(&self) -> f32 {
        self.treble_db
    }

    /// Apply the filter chain and output gain to a whole buffer
    ///
    /// With both shelf gains at zero the filter stage is skipped entirely
    /// and the samples pass through bit-exact.
    pub fn shape(&self, buffer: &mut RenderedBuffer) {
        if self.bass_db != 0.0 || self.treble_db != 0.0 {
            let low = low_shelf_coeffs(self.sample_rate, BASS_SHELF_HZ, self.bass_db);
            let high = high_shelf_coeffs(self.sample_rate, TREBLE_SHELF_HZ, self.treble_db);

            for channel in &mut buffer.channels {
                let mut low_state = BiquadState::default();
                let mut high_state = BiquadState::default();
                for sample in channel.iter_mut() {
                    let shelved = low_state.process(*sample, &low);
                    *sample = high_state.process(shelved, &high);
                }
            }
        }

        if self.volume != 1.0 {
            // Never amplify with a negative factor
            let gain = self.volume.max(0.0);
            for channel in &mut buffer.channels {
                for sample in channel.iter_mut() {
                    *sample *= gain;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin() * 0.25)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn buffer(channels: Vec<Vec<f32>>) -> RenderedBuffer {
        RenderedBuffer {
            channels,
            sample_rate: 48000,
        }
    }

    #[test]
    fn test_zero_gains_pass_through_exactly() {
        let original = buffer(vec![sine(440.0, 48000.0, 512), sine(80.0, 48000.0, 512)]);
        let mut shaped = original.clone();

        let shaper = ToneShaper::new(48000, ToneParams::default());
        shaper.shape(&mut shaped);

        assert_eq!(shaped, original);
    }

    #[test]
    fn test_knob_normalization_divides_and_clamps() {
        let shaper = ToneShaper::new(
            48000,
            ToneParams {
                bass: 60.0,
                treble: -1000.0,
                volume: 1.0,
            },
        );
        assert_eq!(shaper.bass_db(), 6.0);
        assert_eq!(shaper.treble_db(), -24.0);
    }

    #[test]
    fn test_bass_boost_raises_low_band() {
        let mut low = buffer(vec![sine(60.0, 48000.0, 8192)]);
        let before = rms(&low.channels[0]);

        let shaper = ToneShaper::new(
            48000,
            ToneParams {
                bass: 120.0, // +12 dB shelf
                treble: 0.0,
                volume: 1.0,
            },
        );
        shaper.shape(&mut low);

        assert!(rms(&low.channels[0]) > before * 2.0);
    }

    #[test]
    fn test_treble_cut_lowers_high_band() {
        let mut high = buffer(vec![sine(10_000.0, 48000.0, 8192)]);
        let before = rms(&high.channels[0]);

        let shaper = ToneShaper::new(
            48000,
            ToneParams {
                bass: 0.0,
                treble: -120.0, // -12 dB shelf
                volume: 1.0,
            },
        );
        shaper.shape(&mut high);

        assert!(rms(&high.channels[0]) < before * 0.5);
    }

    #[test]
    fn test_volume_scales_samples() {
        let mut buf = buffer(vec![vec![0.5, -0.5]]);
        let shaper = ToneShaper::new(
            48000,
            ToneParams {
                bass: 0.0,
                treble: 0.0,
                volume: 0.5,
            },
        );
        shaper.shape(&mut buf);
        assert_eq!(buf.channels[0], vec![0.25, -0.25]);
    }

    #[test]
    fn test_negative_volume_mutes_instead_of_inverting() {
        let mut buf = buffer(vec![vec![0.5, -0.5]]);
        let shaper = ToneShaper::new(
            48000,
            ToneParams {
                bass: 0.0,
                treble: 0.0,
                volume: -2.0,
            },
        );
        shaper.shape(&mut buf);
        assert_eq!(buf.channels[0], vec![0.0, 0.0]);
    }
}
