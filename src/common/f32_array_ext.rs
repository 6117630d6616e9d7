//! `[f32]` extensions.

use micromath::F32Ext;

/// `[f32]` extensions.
pub trait F32ArrayExt {
    /// Returns the maximum absolute value.
    fn peak_level(&self) -> f32;
    /// Returns the sum of all values.
    fn sum(&self) -> f32;
}

impl F32ArrayExt for [f32] {
    fn peak_level(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        };

        let mut max: f32 = 0.0;
        for sample in self.iter() {
            let value = sample.abs();
            if value > max {
                max = value
            }
        }
        max
    }

    fn sum(&self) -> f32 {
        let mut sum = 0.0;
        for sample in self.iter() {
            sum += sample;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::F32ArrayExt;

    #[test]
    fn test_empty_slice() {
        let values: [f32; 0] = [];
        assert!(values.peak_level() == 0.0);
        assert!(values.sum() == 0.0);
    }

    #[test]
    fn test_levels() {
        let values = [0.5_f32, -2.0, 1.5, 0.0];
        assert_eq!(values.peak_level(), 2.0);
        assert_eq!(values.sum(), 0.0);
    }
}
