//! Tracker configuration.
//!
//! The defaults describe a Soundplane model A: a 64x8 sensor grid sampled at 1 kHz.
//! The tuning constants were found empirically for that hardware and are
//! exposed here rather than assumed to be optimal.

use crate::common::is_supported_fft_size;
use crate::error::ConfigError;

/// The largest number of simultaneously tracked touches.
pub const MAX_TOUCHES: usize = 16;
/// The largest number of peaks kept per frame after sorting by magnitude.
pub const MAX_PEAKS: usize = 64;
/// The largest sensor grid height. Bounded by the diagnostics bitmap.
pub const MAX_SENSOR_ROWS: usize = 16;
/// The largest sensor grid width. Bounded by the diagnostics bitmap.
pub const MAX_SENSOR_COLUMNS: usize = 64;

/// Selects the peak detection strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DetectorKind {
    /// 2D curvature saliency maxima. The default.
    Curvature,
    /// Per-row and per-column concave spans, combined into key states.
    Span,
}

impl Default for DetectorKind {
    fn default() -> Self {
        DetectorKind::Curvature
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Sensor columns.
    pub width: usize,
    /// Sensor rows.
    pub height: usize,
    /// Sensor frames per second.
    pub sample_rate: f32,
    /// Number of touch slots. At most [MAX_TOUCHES].
    pub max_touches: usize,
    /// Number of peaks kept per frame. At most [MAX_PEAKS].
    pub max_peaks: usize,
    /// Input gain `k` of the temporal smoothing IIR `y = k * x + (1 - k) * y'`.
    pub temporal_coefficient: f32,
    /// Passes of the separable 3 tap smoothing kernel per axis.
    pub spatial_passes: usize,
    /// Optional FFT band limit along rows, in bins.
    pub spectral_cutoff: Option<usize>,
    pub detector: DetectorKind,
    /// Minimum saliency for a curvature peak.
    pub saliency_floor: f32,
    /// Filtered pressure above which a touch becomes active.
    pub on_threshold: f32,
    /// Filtered pressure below which a touch becomes inactive. Also the minimum
    /// pressure of a candidate touch.
    pub off_threshold: f32,
    /// Pressure filter corner frequency in Hz while pressure is rising.
    pub z_attack_freq: f32,
    /// Pressure filter corner frequency in Hz while pressure is falling.
    pub z_release_freq: f32,
    /// Position filter corner frequency in Hz at or below `xy_min_pressure`.
    pub xy_min_freq: f32,
    /// Position filter corner frequency in Hz at or above `xy_max_pressure`.
    pub xy_max_freq: f32,
    pub xy_min_pressure: f32,
    pub xy_max_pressure: f32,
    /// Largest combined distance, in key units, for which a touch continues
    /// from one frame to the next.
    pub match_distance: f32,
    /// Weight of the pressure difference in the combined match distance.
    pub pressure_weight: f32,
    /// Frames an inactive slot keeps its last position before being exiled.
    pub relink_frames: u32,
    /// Allocate new touches to slots round robin instead of near their
    /// previous position.
    pub rotate: bool,
    /// Optional maximum RMS difference between a peak and the calibrated
    /// touch template at its location.
    pub template_threshold: Option<f32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            width: 64,
            height: 8,
            sample_rate: 1000.0,
            max_touches: 4,
            max_peaks: 16,
            temporal_coefficient: 0.5,
            spatial_passes: 3,
            spectral_cutoff: None,
            detector: DetectorKind::Curvature,
            saliency_floor: 0.0005,
            on_threshold: 0.03,
            off_threshold: 0.02,
            z_attack_freq: 200.0,
            z_release_freq: 20.0,
            xy_min_freq: 2.0,
            xy_max_freq: 40.0,
            xy_min_pressure: 0.02,
            xy_max_pressure: 0.2,
            match_distance: 4.0,
            pressure_weight: 4.0,
            relink_frames: 30,
            rotate: false,
            template_threshold: None,
        }
    }
}

impl TrackerConfig {
    /// Checks sizes, ranges and the ordering of thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < 3 || self.height < 3 {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_SENSOR_COLUMNS || self.height > MAX_SENSOR_ROWS {
            return Err(ConfigError::GridTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        if self.max_touches > MAX_TOUCHES {
            return Err(ConfigError::MaxTouchesOutOfRange {
                requested: self.max_touches,
                max: MAX_TOUCHES,
            });
        }
        if self.max_peaks == 0 || self.max_peaks > MAX_PEAKS {
            return Err(ConfigError::MaxPeaksOutOfRange {
                requested: self.max_peaks,
                max: MAX_PEAKS,
            });
        }
        if !(self.off_threshold > 0.0 && self.off_threshold < self.on_threshold) {
            return Err(ConfigError::ThresholdOrder {
                on: self.on_threshold,
                off: self.off_threshold,
            });
        }
        if !(self.temporal_coefficient > 0.0 && self.temporal_coefficient <= 1.0) {
            return Err(ConfigError::CoefficientOutOfRange(self.temporal_coefficient));
        }
        if !(self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidFrequency(self.sample_rate));
        }
        let nyquist = 0.5 * self.sample_rate;
        for freq in [
            self.z_attack_freq,
            self.z_release_freq,
            self.xy_min_freq,
            self.xy_max_freq,
        ] {
            if !(freq > 0.0 && freq < nyquist) {
                return Err(ConfigError::InvalidFrequency(freq));
            }
        }
        if !(self.xy_min_pressure < self.xy_max_pressure) {
            return Err(ConfigError::ThresholdOrder {
                on: self.xy_max_pressure,
                off: self.xy_min_pressure,
            });
        }
        if let Some(cutoff) = self.spectral_cutoff {
            if !is_supported_fft_size(self.width) {
                return Err(ConfigError::UnsupportedFftSize(self.width));
            }
            if cutoff == 0 || cutoff > self.width / 2 {
                return Err(ConfigError::CutoffOutOfRange(cutoff));
            }
        }
        Ok(())
    }

    /// Sets the off threshold and derives the on threshold from it using a
    /// fixed hysteresis.
    pub fn set_threshold(&mut self, off_threshold: f32) {
        const HYSTERESIS: f32 = 0.002;
        self.off_threshold = off_threshold;
        self.on_threshold = off_threshold + HYSTERESIS;
    }
}

/// Calibration collection settings. See [crate::calibration::Calibrator].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CalibrationConfig {
    /// Frames of silence collected to find the noise floor.
    pub silence_frames: u32,
    /// Frames of silence collected after the normalize map is done.
    pub settle_frames: u32,
    /// Samples needed in every cell before the normalize map is complete.
    pub normalize_samples: u32,
    /// Fraction of the frame peak a smoothed cell must exceed to contribute
    /// to the normalize map.
    pub normalize_threshold: f32,
    /// Times each template bin must be entered before templates are complete.
    pub template_passes: u32,
    /// Collect per-location touch templates after the normalize map.
    pub collect_templates: bool,
    /// Input gain of the calibration input lowpass.
    pub input_coefficient: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            silence_frames: 1000,
            settle_frames: 2000,
            normalize_samples: 1000,
            normalize_threshold: 0.125,
            template_passes: 2,
            collect_templates: false,
            input_coefficient: 0.1,
        }
    }
}
