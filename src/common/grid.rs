use alloc::{boxed::Box, vec};
use micromath::F32Ext;

/// A dense 2D field of samples, stored row by row. `x` is the column
/// index in `0..width` and `y` is the row index in `0..height`.
///
/// The backing storage is allocated once on construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    data: Box<[f32]>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        if width == 0 || height == 0 {
            panic!("Grid dimensions must be greater than 0")
        }
        Grid {
            width,
            height,
            data: vec![0.0; width * height].into_boxed_slice(),
        }
    }

    /// Creates a grid holding a copy of `samples`, which must contain
    /// exactly `width * height` values.
    pub fn from_slice(width: usize, height: usize, samples: &[f32]) -> Self {
        let mut grid = Grid::new(width, height);
        grid.copy_from_slice(samples);
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Returns the sample at (`x`, `y`), or zero outside the grid.
    #[inline]
    pub fn get_or_zero(&self, x: isize, y: isize) -> f32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            0.0
        } else {
            self.get(x as usize, y as usize)
        }
    }

    /// Returns the sample at (`x`, `y`) with the edge policy of the smoothing
    /// kernel: zero left and right of the grid, the edge row above and below it.
    #[inline]
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        if x < 0 || x as usize >= self.width {
            return 0.0;
        }
        let y = if y < 0 {
            0
        } else if y as usize >= self.height {
            self.height - 1
        } else {
            y as usize
        };
        self.get(x as usize, y)
    }

    /// Bilinearly interpolated sample at a continuous position. Samples outside
    /// the grid count as zero.
    pub fn interpolated(&self, x: f32, y: f32) -> f32 {
        let fx = x.floor();
        let fy = y.floor();
        let ix = fx as isize;
        let iy = fy as isize;
        let tx = x - fx;
        let ty = y - fy;
        let a = self.get_or_zero(ix, iy) * (1.0 - tx) + self.get_or_zero(ix + 1, iy) * tx;
        let b = self.get_or_zero(ix, iy + 1) * (1.0 - tx) + self.get_or_zero(ix + 1, iy + 1) * tx;
        a * (1.0 - ty) + b * ty
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn fill(&mut self, value: f32) {
        for sample in self.data.iter_mut() {
            *sample = value;
        }
    }

    pub fn copy_from(&mut self, other: &Grid) {
        self.assert_same_dims(other);
        self.data.copy_from_slice(&other.data);
    }

    pub fn copy_from_slice(&mut self, samples: &[f32]) {
        if samples.len() != self.data.len() {
            panic!(
                "Got {} samples, expected {} for a {}x{} grid",
                samples.len(),
                self.data.len(),
                self.width,
                self.height
            )
        }
        self.data.copy_from_slice(samples);
    }

    /// Replaces every sample below `min` with `min`.
    pub fn clamp_min(&mut self, min: f32) {
        for sample in self.data.iter_mut() {
            if *sample < min {
                *sample = min;
            }
        }
    }

    /// Replaces every sample above `max` with `max`.
    pub fn clamp_max(&mut self, max: f32) {
        for sample in self.data.iter_mut() {
            if *sample > max {
                *sample = max;
            }
        }
    }

    /// Point-wise multiplication by another grid of the same size.
    pub fn multiply(&mut self, other: &Grid) {
        self.assert_same_dims(other);
        for (sample, gain) in self.data.iter_mut().zip(other.data.iter()) {
            *sample *= *gain;
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for sample in self.data.iter_mut() {
            *sample *= factor;
        }
    }

    /// Zeroes the first and last column.
    pub fn clear_side_columns(&mut self) {
        let width = self.width;
        for row in self.data.chunks_exact_mut(width) {
            row[0] = 0.0;
            row[width - 1] = 0.0;
        }
    }

    /// Returns the position and value of the largest sample. The first
    /// occurrence wins on ties.
    pub fn peak(&self) -> (usize, usize, f32) {
        let mut best = (0, 0, self.data[0]);
        for y in 0..self.height {
            for (x, value) in self.row(y).iter().enumerate() {
                if *value > best.2 {
                    best = (x, y, *value);
                }
            }
        }
        best
    }

    fn assert_same_dims(&self, other: &Grid) {
        if self.width != other.width || self.height != other.height {
            panic!(
                "Grid size mismatch: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Grid;
    use micromath::F32Ext;

    #[test]
    fn test_row_major_layout() {
        let mut grid = Grid::new(4, 3);
        grid.set(1, 2, 5.0);
        assert_eq!(grid.as_slice()[2 * 4 + 1], 5.0);
        assert_eq!(grid.row(2)[1], 5.0);
        assert_eq!(grid.peak(), (1, 2, 5.0));
    }

    #[test]
    fn test_interpolation() {
        let mut grid = Grid::new(3, 3);
        grid.set(1, 1, 1.0);
        assert_eq!(grid.interpolated(1.0, 1.0), 1.0);
        assert!((grid.interpolated(1.5, 1.0) - 0.5).abs() <= f32::EPSILON);
        assert!((grid.interpolated(1.5, 1.5) - 0.25).abs() <= f32::EPSILON);
        // Outside the grid counts as zero
        assert_eq!(grid.interpolated(-3.0, 1.0), 0.0);
    }

    #[test]
    fn test_clamped_edges() {
        let mut grid = Grid::new(3, 2);
        grid.set(0, 0, 1.0);
        grid.set(2, 1, 2.0);
        assert_eq!(grid.get_clamped(0, -1), 1.0);
        assert_eq!(grid.get_clamped(2, 5), 2.0);
        assert_eq!(grid.get_clamped(-1, 0), 0.0);
        assert_eq!(grid.get_clamped(3, 1), 0.0);
    }

    #[test]
    fn test_clear_side_columns() {
        let mut grid = Grid::new(4, 2);
        grid.fill(1.0);
        grid.clear_side_columns();
        assert_eq!(grid.row(0), &[0.0, 1.0, 1.0, 0.0]);
        assert_eq!(grid.row(1), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn test_zero_size() {
        let _ = Grid::new(0, 8);
    }
}
