use core::f32::consts::PI;
use micromath::F32Ext;

/// Computes the feedback coefficient `k = exp(-2 * pi * f / sample_rate)` of a
/// one-pole lowpass filter with corner frequency `freq`.
pub fn one_pole_coefficient(freq: f32, sample_rate: f32) -> f32 {
    F32Ext::exp(-2.0 * PI * freq / sample_rate)
}

/// A one-pole lowpass filter, `y[n] = k * y[n - 1] + (1 - k) * x[n]`,
/// where `k` is the feedback coefficient passed to [OnePole::process].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OnePole {
    y: f32,
}

impl OnePole {
    pub fn process(&mut self, x: f32, k: f32) -> f32 {
        self.y = k * self.y + (1.0 - k) * x;
        self.y
    }

    pub fn value(&self) -> f32 {
        self.y
    }

    /// Jumps directly to `value`, bypassing the filter.
    pub fn reset(&mut self, value: f32) {
        self.y = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coefficient() {
        // micromath's exp is an approximation, so allow some slack.
        let k = one_pole_coefficient(0.0, 1000.0);
        assert!((k - 1.0).abs() <= 1e-3);
        let k = one_pole_coefficient(100.0, 1000.0);
        assert!((k - 0.533488).abs() <= 5e-3);
    }

    #[test]
    fn test_step_response() {
        let mut filter = OnePole::default();
        let k = 0.5;
        assert_eq!(filter.process(1.0, k), 0.5);
        assert_eq!(filter.process(1.0, k), 0.75);
        for _ in 0..100 {
            filter.process(1.0, k);
        }
        assert!((filter.value() - 1.0).abs() <= 1e-6);
    }
}
