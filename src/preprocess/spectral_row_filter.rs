use alloc::{boxed::Box, vec};

use crate::common::{inverse_fft, is_supported_fft_size, real_fft, Complex32, Grid};

/// Band limits each row of a field in the frequency domain. The DC bin and
/// every bin at or above the cutoff are removed, which takes out slowly varying
/// offsets along a row as well as spatial noise finer than a touch.
pub struct SpectralRowFilter {
    cutoff: usize,
    real: Box<[f32]>,
    spectrum: Box<[Complex32]>,
}

impl SpectralRowFilter {
    /// Creates a filter for rows of `width` samples. Panics if `width` is not a
    /// supported FFT size or if `cutoff` is not in `1..=width / 2`.
    pub fn new(width: usize, cutoff: usize) -> Self {
        if !is_supported_fft_size(width) {
            panic!("Unsupported row width {}", width)
        }
        if cutoff == 0 || cutoff > width / 2 {
            panic!("Cutoff {} must be in 1..={}", cutoff, width / 2)
        }
        SpectralRowFilter {
            cutoff,
            real: vec![0.0; width].into_boxed_slice(),
            spectrum: vec![Complex32::new(0.0, 0.0); width].into_boxed_slice(),
        }
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// Filters every row of `field` in place. Negative results are clamped to zero.
    pub fn process(&mut self, field: &mut Grid) {
        let width = self.real.len();
        if field.width() != width {
            panic!("Expected rows of {} samples, got {}", width, field.width())
        }
        for y in 0..field.height() {
            self.real.copy_from_slice(field.row(y));

            let spectrum = &mut self.spectrum;
            for bin in spectrum.iter_mut() {
                *bin = Complex32::new(0.0, 0.0);
            }
            let bins = real_fft(&mut self.real);
            // Bin 0 holds DC and Nyquist, both of which are dropped.
            for k in 1..self.cutoff.min(width / 2) {
                spectrum[k] = bins[k];
                spectrum[width - k] = bins[k].conj();
            }

            inverse_fft(spectrum);
            for (out, value) in field.row_mut(y).iter_mut().zip(spectrum.iter()) {
                *out = if value.re > 0.0 { value.re } else { 0.0 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;
    use micromath::F32Ext;

    #[test]
    fn test_removes_dc() {
        let mut filter = SpectralRowFilter::new(16, 4);
        let mut field = Grid::new(16, 2);
        field.fill(0.3);
        filter.process(&mut field);
        for value in field.as_slice() {
            assert!(value.abs() <= 1e-4);
        }
    }

    #[test]
    fn test_passes_low_frequencies() {
        let width = 32;
        let mut filter = SpectralRowFilter::new(width, 4);
        let mut field = Grid::new(width, 1);
        let mut expected = vec![0.0; width];
        for x in 0..width {
            let low = (2.0 * PI * (x as f32) / (width as f32)).cos();
            let high = 0.2 * (2.0 * PI * 10.0 * (x as f32) / (width as f32)).cos();
            field.set(x, 0, 1.0 + low + high);
            expected[x] = if low > 0.0 { low } else { 0.0 };
        }
        filter.process(&mut field);
        for (value, expected) in field.row(0).iter().zip(expected.iter()) {
            assert!((value - expected).abs() <= 1e-2);
        }
    }

    #[test]
    #[should_panic]
    fn test_unsupported_width() {
        let _ = SpectralRowFilter::new(48, 4);
    }
}
