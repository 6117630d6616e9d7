use alloc::{boxed::Box, vec};
use micromath::F32Ext;

use crate::common::Grid;
use crate::detect::{parabolic_offset, Peak, PeakDetector, PeakList};

/// Finds touch centers as maxima of 2D curvature saliency.
///
/// Along each axis the negated second difference `-(z[i + 1] - 2 z[i] + z[i - 1])` is
/// computed and clamped to zero, so that only concave (dome shaped) regions remain.
/// The saliency of a cell is `sqrt(cx * cy)`, which is only positive where both
/// axes are concave. A ridge running along one axis has no curvature along that
/// axis and is rejected.
///
/// Samples outside the grid follow the smoothing kernel: zero beyond the first
/// and last column, the edge row beyond the top and bottom. The first and last
/// column carry no signal and never hold a peak.
///
/// A cell is a peak if its saliency exceeds the floor and that of all neighbors
/// inside the grid. On a plateau the first cell in row major order wins.
/// Positions are refined by fitting a parabola through the pressure at the cell
/// and its two neighbors, separately per axis.
pub struct CurvatureDetector {
    saliency_floor: f32,
    /// `cx * cy` per cell. Local maxima are found on the product so that
    /// the square root is only taken for accepted peaks.
    product: Box<[f32]>,
    width: usize,
    height: usize,
}

impl CurvatureDetector {
    pub fn new(width: usize, height: usize, saliency_floor: f32) -> Self {
        if width < 3 || height < 3 {
            panic!("Curvature detection needs at least 3x3 samples")
        }
        if saliency_floor < 0.0 {
            panic!("Saliency floor must be non-negative")
        }
        CurvatureDetector {
            saliency_floor,
            product: vec![0.0; width * height].into_boxed_slice(),
            width,
            height,
        }
    }

    fn compute_product(&mut self, field: &Grid) {
        for y in 0..self.height {
            for x in 1..self.width - 1 {
                let (ix, iy) = (x as isize, y as isize);
                let z = field.get(x, y);
                let cx = z + z - field.get_clamped(ix - 1, iy) - field.get_clamped(ix + 1, iy);
                let cy = z + z - field.get_clamped(ix, iy - 1) - field.get_clamped(ix, iy + 1);
                self.product[y * self.width + x] = if cx > 0.0 && cy > 0.0 { cx * cy } else { 0.0 };
            }
        }
    }

    /// Plateaus are resolved in favor of the cell that comes first in row major order.
    fn is_local_maximum(&self, x: usize, y: usize) -> bool {
        let index = y * self.width + x;
        let center = self.product[index];
        let x_range = x.saturating_sub(1)..=(x + 1).min(self.width - 1);
        for ny in y.saturating_sub(1)..=(y + 1).min(self.height - 1) {
            for nx in x_range.clone() {
                let neighbor_index = ny * self.width + nx;
                let neighbor = self.product[neighbor_index];
                let beaten = match neighbor_index.cmp(&index) {
                    core::cmp::Ordering::Less => neighbor >= center,
                    core::cmp::Ordering::Greater => neighbor > center,
                    core::cmp::Ordering::Equal => false,
                };
                if beaten {
                    return false;
                }
            }
        }
        true
    }
}

impl PeakDetector for CurvatureDetector {
    fn detect(&mut self, field: &Grid, peaks: &mut PeakList) {
        if field.width() != self.width || field.height() != self.height {
            panic!(
                "Expected a {}x{} field, got {}x{}",
                self.width,
                self.height,
                field.width(),
                field.height()
            )
        }
        peaks.clear();
        self.compute_product(field);

        let floor = self.saliency_floor * self.saliency_floor;
        for y in 0..self.height {
            for x in 1..self.width - 1 {
                let product = self.product[y * self.width + x];
                if product <= floor || !self.is_local_maximum(x, y) {
                    continue;
                }
                let (ix, iy) = (x as isize, y as isize);
                let z = field.get(x, y);
                let dx = parabolic_offset(field.get_clamped(ix - 1, iy), z, field.get_clamped(ix + 1, iy));
                let dy = parabolic_offset(field.get_clamped(ix, iy - 1), z, field.get_clamped(ix, iy + 1));
                peaks.insert(Peak {
                    x: x as f32 + dx,
                    y: y as f32 + dy,
                    z,
                    saliency: product.sqrt(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micromath::F32Ext;

    fn blob(grid: &mut Grid, cx: f32, cy: f32, amplitude: f32, sigma: f32) {
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let value = amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                grid.set(x, y, grid.get(x, y) + value);
            }
        }
    }

    #[test]
    fn test_empty_field() {
        let mut detector = CurvatureDetector::new(16, 8, 0.0005);
        let mut peaks = PeakList::new(8);
        detector.detect(&Grid::new(16, 8), &mut peaks);
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_single_blob() {
        let mut field = Grid::new(32, 8);
        blob(&mut field, 12.3, 3.8, 0.2, 1.5);
        let mut detector = CurvatureDetector::new(32, 8, 0.0005);
        let mut peaks = PeakList::new(8);
        detector.detect(&field, &mut peaks);
        assert_eq!(peaks.len(), 1);
        let peak = peaks.as_slice()[0];
        assert!((peak.x - 12.3).abs() < 0.1);
        assert!((peak.y - 3.8).abs() < 0.1);
        assert!((peak.z - 0.2).abs() < 0.02);
        assert!(peak.saliency > 0.0);
    }

    #[test]
    fn test_ranked_by_pressure() {
        let mut field = Grid::new(32, 8);
        blob(&mut field, 6.0, 3.0, 0.1, 1.0);
        blob(&mut field, 16.0, 4.0, 0.3, 1.0);
        blob(&mut field, 26.0, 3.0, 0.2, 1.0);
        let mut detector = CurvatureDetector::new(32, 8, 0.0005);
        let mut peaks = PeakList::new(2);
        detector.detect(&field, &mut peaks);
        assert_eq!(peaks.len(), 2);
        assert!((peaks.as_slice()[0].x - 16.0).abs() < 0.05);
        assert!((peaks.as_slice()[1].x - 26.0).abs() < 0.05);
    }

    #[test]
    fn test_ridge_is_rejected() {
        let mut detector = CurvatureDetector::new(16, 8, 0.0005);
        let mut peaks = PeakList::new(8);

        let mut field = Grid::new(16, 8);
        for x in 0..16 {
            field.set(x, 3, 0.5);
        }
        detector.detect(&field, &mut peaks);
        assert!(peaks.is_empty());

        // A bar across all rows has no curvature along y, edge rows included
        let mut field = Grid::new(16, 8);
        for y in 0..8 {
            field.set(7, y, 0.5);
        }
        detector.detect(&field, &mut peaks);
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_blob_near_edge_rows() {
        let mut detector = CurvatureDetector::new(32, 8, 0.0005);
        let mut peaks = PeakList::new(8);
        for y in [0.8, 1.0, 6.2] {
            let mut field = Grid::new(32, 8);
            blob(&mut field, 12.3, y, 0.2, 1.5);
            detector.detect(&field, &mut peaks);
            assert_eq!(peaks.len(), 1, "blob at y {}", y);
            let peak = peaks.as_slice()[0];
            assert!((peak.x - 12.3).abs() < 0.1);
            assert!((peak.y - y).abs() < 0.05, "blob at y {} found at {}", y, peak.y);
        }
    }

    #[test]
    fn test_floor() {
        let mut field = Grid::new(16, 8);
        blob(&mut field, 8.0, 4.0, 0.001, 1.0);
        let mut detector = CurvatureDetector::new(16, 8, 0.01);
        let mut peaks = PeakList::new(8);
        detector.detect(&field, &mut peaks);
        assert!(peaks.is_empty());
    }
}
