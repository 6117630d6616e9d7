use crate::common::Grid;
use crate::preprocess::SpectralRowFilter;

/// Weights of the 3 tap smoothing kernel. Applied along both axes, the
/// resulting 3x3 kernel weights the center 4/16, direct neighbors 2/16 and
/// diagonal neighbors 1/16.
const KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

/// Turns raw sensor frames into a smoothed, non-negative pressure field.
///
/// Each frame goes through these steps:
/// 1. Optional per-cell normalization gain.
/// 2. One-pole temporal smoothing, `y = k * x + (1 - k) * y'`.
/// 3. Clamping of negative values to zero.
/// 4. Zeroing of the first and last column.
/// 5. Optional spectral band limiting of each row.
/// 6. `spatial_passes` passes of a separable 3 tap kernel. Columns outside the
///    grid count as zero, rows outside the grid repeat the edge row.
///
/// The temporal filter history is owned by the caller, so that one preprocessor
/// can serve several independent streams.
pub struct FramePreprocessor {
    temporal_coefficient: f32,
    spatial_passes: usize,
    spectral_filter: Option<SpectralRowFilter>,
    field: Grid,
    scratch: Grid,
}

impl FramePreprocessor {
    pub fn new(width: usize, height: usize, temporal_coefficient: f32, spatial_passes: usize) -> Self {
        if !(temporal_coefficient > 0.0 && temporal_coefficient <= 1.0) {
            panic!("Temporal coefficient must be in (0, 1]")
        }
        FramePreprocessor {
            temporal_coefficient,
            spatial_passes,
            spectral_filter: None,
            field: Grid::new(width, height),
            scratch: Grid::new(width, height),
        }
    }

    /// Enables the spectral row filter. See [SpectralRowFilter].
    pub fn with_spectral_filter(mut self, cutoff: usize) -> Self {
        self.spectral_filter = Some(SpectralRowFilter::new(self.field.width(), cutoff));
        self
    }

    pub fn width(&self) -> usize {
        self.field.width()
    }

    pub fn height(&self) -> usize {
        self.field.height()
    }

    /// The field produced by the most recent call to [FramePreprocessor::process].
    pub fn field(&self) -> &Grid {
        &self.field
    }

    /// Processes a frame of `width * height` samples. `history` holds the temporal
    /// filter state and is updated in place. `normalize` is an optional per-cell gain map.
    pub fn process<'a>(&'a mut self, frame: &[f32], history: &mut Grid, normalize: Option<&Grid>) -> &'a Grid {
        let k = self.temporal_coefficient;
        self.field.copy_from_slice(frame);
        if let Some(gains) = normalize {
            self.field.multiply(gains);
        }

        for (y, x) in history.as_mut_slice().iter_mut().zip(self.field.as_slice().iter()) {
            *y = k * *x + (1.0 - k) * *y;
        }
        self.field.copy_from(history);
        self.field.clamp_min(0.0);
        self.field.clear_side_columns();

        if let Some(filter) = self.spectral_filter.as_mut() {
            filter.process(&mut self.field);
        }

        for _ in 0..self.spatial_passes {
            smooth_rows(&self.field, &mut self.scratch);
            smooth_columns(&self.scratch, &mut self.field);
        }

        &self.field
    }
}

/// Horizontal kernel pass. Samples beyond the left and right edges are zero.
fn smooth_rows(src: &Grid, dst: &mut Grid) {
    let width = src.width();
    for y in 0..src.height() {
        let input = src.row(y);
        let output = dst.row_mut(y);
        for x in 0..width {
            let left = if x > 0 { input[x - 1] } else { 0.0 };
            let right = if x + 1 < width { input[x + 1] } else { 0.0 };
            output[x] = KERNEL[0] * left + KERNEL[1] * input[x] + KERNEL[2] * right;
        }
    }
}

/// Vertical kernel pass. Samples beyond the top and bottom edges repeat the edge row.
fn smooth_columns(src: &Grid, dst: &mut Grid) {
    let height = src.height();
    for y in 0..height {
        let above = src.row(if y > 0 { y - 1 } else { 0 });
        let center = src.row(y);
        let below = src.row(if y + 1 < height { y + 1 } else { height - 1 });
        for (x, out) in dst.row_mut(y).iter_mut().enumerate() {
            *out = KERNEL[0] * above[x] + KERNEL[1] * center[x] + KERNEL[2] * below[x];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::F32ArrayExt;
    use alloc::vec;

    #[test]
    fn test_silence() {
        let mut preprocessor = FramePreprocessor::new(16, 4, 0.5, 3);
        let mut history = Grid::new(16, 4);
        let frame = vec![0.0; 64];
        let field = preprocessor.process(&frame, &mut history, None);
        assert_eq!(field.as_slice().peak_level(), 0.0);
    }

    #[test]
    fn test_negative_values_are_clamped() {
        let mut preprocessor = FramePreprocessor::new(8, 3, 1.0, 2);
        let mut history = Grid::new(8, 3);
        let frame = vec![-1.0; 24];
        let field = preprocessor.process(&frame, &mut history, None);
        for value in field.as_slice() {
            assert_eq!(*value, 0.0);
        }
        // The history keeps the unclamped input
        assert_eq!(history.get(3, 1), -1.0);
    }

    #[test]
    fn test_single_pass_kernel() {
        let mut preprocessor = FramePreprocessor::new(5, 5, 1.0, 1);
        let mut history = Grid::new(5, 5);
        let mut frame = vec![0.0; 25];
        frame[2 * 5 + 2] = 16.0;
        let field = preprocessor.process(&frame, &mut history, None);
        assert_eq!(field.get(2, 2), 4.0);
        assert_eq!(field.get(1, 2), 2.0);
        assert_eq!(field.get(2, 1), 2.0);
        assert_eq!(field.get(1, 1), 1.0);
        assert_eq!(field.get(0, 0), 0.0);
        assert_eq!(field.as_slice().sum(), 16.0);
    }

    #[test]
    fn test_side_columns_are_cleared() {
        let mut preprocessor = FramePreprocessor::new(6, 3, 1.0, 0);
        let mut history = Grid::new(6, 3);
        let frame = vec![1.0; 18];
        let field = preprocessor.process(&frame, &mut history, None);
        assert_eq!(field.row(1), &[0.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_top_and_bottom_rows_repeat() {
        // A uniform interior stays uniform along the vertical axis.
        let mut preprocessor = FramePreprocessor::new(5, 4, 1.0, 3);
        let mut history = Grid::new(5, 4);
        let mut frame = vec![0.0; 20];
        for y in 0..4 {
            frame[y * 5 + 2] = 1.0;
        }
        let field = preprocessor.process(&frame, &mut history, None);
        for y in 1..4 {
            assert!((field.get(2, y) - field.get(2, 0)).abs() <= 1e-6);
        }
    }

    #[test]
    fn test_temporal_smoothing() {
        let mut preprocessor = FramePreprocessor::new(5, 3, 0.5, 0);
        let mut history = Grid::new(5, 3);
        let mut frame = vec![0.0; 15];
        frame[5 + 2] = 1.0;
        assert_eq!(preprocessor.process(&frame, &mut history, None).get(2, 1), 0.5);
        assert_eq!(preprocessor.process(&frame, &mut history, None).get(2, 1), 0.75);
    }

    #[test]
    fn test_normalize_gain() {
        let mut preprocessor = FramePreprocessor::new(5, 3, 1.0, 0);
        let mut history = Grid::new(5, 3);
        let mut gains = Grid::new(5, 3);
        gains.fill(2.0);
        let frame = vec![0.25; 15];
        let field = preprocessor.process(&frame, &mut history, Some(&gains));
        assert_eq!(field.get(2, 1), 0.5);
    }
}
