/// Reasons a configuration, calibration blob or output binding is rejected.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sensor grid {width}x{height} is too small")]
    GridTooSmall { width: usize, height: usize },

    #[error("sensor grid {width}x{height} is too large")]
    GridTooLarge { width: usize, height: usize },

    #[error("max touches {requested} exceeds the limit of {max}")]
    MaxTouchesOutOfRange { requested: usize, max: usize },

    #[error("max peaks {requested} must be in 1..={max}")]
    MaxPeaksOutOfRange { requested: usize, max: usize },

    /// The off threshold must be positive and below the on threshold.
    #[error("off threshold {off} must be positive and below on threshold {on}")]
    ThresholdOrder { on: f32, off: f32 },

    #[error("filter coefficient {0} must be in (0, 1]")]
    CoefficientOutOfRange(f32),

    /// A frequency is not positive or not below the Nyquist frequency.
    #[error("frequency {0} Hz is out of range")]
    InvalidFrequency(f32),

    #[error("unsupported fft size {0}")]
    UnsupportedFftSize(usize),

    #[error("spectral cutoff {0} is out of range")]
    CutoffOutOfRange(usize),

    /// A breakpoint table has fewer than two points or a domain that
    /// is not strictly increasing.
    #[error("bad breakpoint table")]
    BadBreakpointTable,

    /// The key layout has more keys than the span detector supports.
    #[error("{keys} keys exceed the span detector limit of {max}")]
    TooManyKeys { keys: usize, max: usize },

    /// A calibration blob does not match the sensor or template dimensions.
    #[error("calibration data has {actual} values, expected {expected}")]
    CalibrationSize { expected: usize, actual: usize },

    /// The output buffer cannot hold a row for every configured touch.
    #[error("output buffer holds {provided} values, {required} required")]
    OutputTooSmall { required: usize, provided: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_messages() {
        assert_eq!(
            ConfigError::OutputTooSmall {
                required: 20,
                provided: 19
            }
            .to_string(),
            "output buffer holds 19 values, 20 required"
        );
        assert_eq!(
            ConfigError::ThresholdOrder { on: 0.03, off: 0.05 }.to_string(),
            "off threshold 0.05 must be positive and below on threshold 0.03"
        );
    }
}
