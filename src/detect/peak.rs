use micromath::F32Ext;

use crate::config::MAX_PEAKS;

/// A pressure maximum found in a smoothed field, in sensor coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Peak {
    /// Column position, refined to sub-sensor precision.
    pub x: f32,
    /// Row position, refined to sub-sensor precision.
    pub y: f32,
    /// Pressure at the peak. Peaks are ranked by this value.
    pub z: f32,
    /// Detector specific strength of the peak, e.g. the curvature saliency.
    pub saliency: f32,
}

/// A bounded list of peaks, kept sorted by descending pressure. Once the list
/// holds `capacity` peaks, inserting a stronger peak evicts the weakest one.
#[derive(Clone, Copy, Debug)]
pub struct PeakList {
    peaks: [Peak; MAX_PEAKS],
    len: usize,
    capacity: usize,
}

impl PeakList {
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 || capacity > MAX_PEAKS {
            panic!("Peak list capacity must be in 1..={}", MAX_PEAKS)
        }
        PeakList {
            peaks: [Peak::default(); MAX_PEAKS],
            len: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks[..self.len]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Peak> {
        self.as_slice().iter()
    }

    /// Inserts a peak at its rank. Peaks of equal pressure keep insertion order.
    /// Returns false if the list is full and the peak is not stronger than any
    /// peak in it.
    pub fn insert(&mut self, peak: Peak) -> bool {
        let position = self.peaks[..self.len]
            .iter()
            .position(|p| peak.z > p.z)
            .unwrap_or(self.len);
        if position >= self.capacity {
            return false;
        }
        let end = if self.len < self.capacity {
            self.len += 1;
            self.len - 1
        } else {
            self.capacity - 1
        };
        // Shift weaker peaks down, dropping the last one if full
        self.peaks.copy_within(position..end, position + 1);
        self.peaks[position] = peak;
        true
    }

    /// Keeps only the peaks for which `f` returns true, preserving order.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&Peak) -> bool,
    {
        let mut kept = 0;
        for i in 0..self.len {
            if f(&self.peaks[i]) {
                self.peaks[kept] = self.peaks[i];
                kept += 1;
            }
        }
        self.len = kept;
    }
}

/// Returns the offset from the center sample to the vertex of the parabola
/// through `(-1, a)`, `(0, b)` and `(1, c)`, clamped to `[-0.5, 0.5]`.
/// A flat or degenerate parabola gives an offset of zero.
pub fn parabolic_offset(a: f32, b: f32, c: f32) -> f32 {
    let denominator = a - 2.0 * b + c;
    if denominator.abs() <= f32::EPSILON {
        return 0.0;
    }
    let offset = 0.5 * (a - c) / denominator;
    if !offset.is_finite() {
        0.0
    } else if offset < -0.5 {
        -0.5
    } else if offset > 0.5 {
        0.5
    } else {
        offset
    }
}
