use alloc::{boxed::Box, vec};

use crate::common::Grid;
use crate::detect::{Peak, PeakDetector, PeakList};
use crate::keymap::KeyMapper;
use crate::snapshot::TrackerSnapshot;

/// The largest number of pings kept per axis and frame.
pub const MAX_PINGS: usize = 64;
/// The largest number of keys supported by [SpanDetector].
pub const MAX_KEY_STATES: usize = 256;

/// A 1D peak found along a single sensor row or column, in sensor coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ping {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A bounded list of pings. Pings beyond the capacity are ignored.
#[derive(Clone, Copy, Debug)]
pub struct PingList {
    pings: [Ping; MAX_PINGS],
    len: usize,
}

impl PingList {
    pub fn new() -> Self {
        PingList {
            pings: [Ping::default(); MAX_PINGS],
            len: 0,
        }
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

    pub fn push(&mut self, ping: Ping) -> bool {
        if self.len == MAX_PINGS {
            return false;
        }
        self.pings[self.len] = ping;
        self.len += 1;
        true
    }

    pub fn as_slice(&self) -> &[Ping] {
        &self.pings[..self.len]
    }
}

impl Default for PingList {
    fn default() -> Self {
        PingList::new()
    }
}

/// The combined estimate for one key. `z` is zero for keys without both a row
/// and a column ping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KeyState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Default)]
struct KeyAccumulator {
    x_sum: f32,
    x_weight: f32,
    y_sum: f32,
    y_weight: f32,
    z: f32,
}

/// Finds touches from 1D concave spans.
///
/// Every row and every column is scanned for spans where the second difference
/// is negative, i.e. where the pressure profile is dome shaped. Span ends are
/// linearly interpolated between samples. A span with at least one sample above
/// the on threshold yields a ping at its center. Row pings give x estimates and
/// column pings give y estimates; both are gathered per key and a key with both
/// kinds of pings becomes a key state. Key states stronger than their neighbors
/// are reported as peaks.
pub struct SpanDetector {
    width: usize,
    height: usize,
    on_threshold: f32,
    ping_floor: f32,
    mapper: KeyMapper,
    row_pings: PingList,
    column_pings: PingList,
    accumulators: Box<[KeyAccumulator]>,
    key_states: Box<[KeyState]>,
}

impl SpanDetector {
    pub fn new(width: usize, height: usize, mapper: KeyMapper, on_threshold: f32, ping_floor: f32) -> Self {
        if width < 3 || height < 3 {
            panic!("Span detection needs at least 3x3 samples")
        }
        let key_count = mapper.key_count();
        if key_count > MAX_KEY_STATES {
            panic!("At most {} keys are supported, got {}", MAX_KEY_STATES, key_count)
        }
        SpanDetector {
            width,
            height,
            on_threshold,
            ping_floor,
            mapper,
            row_pings: PingList::new(),
            column_pings: PingList::new(),
            accumulators: vec![KeyAccumulator::default(); key_count].into_boxed_slice(),
            key_states: vec![KeyState::default(); key_count].into_boxed_slice(),
        }
    }

    pub fn set_on_threshold(&mut self, on_threshold: f32) {
        self.on_threshold = on_threshold;
    }

    pub fn row_pings(&self) -> &[Ping] {
        self.row_pings.as_slice()
    }

    pub fn column_pings(&self) -> &[Ping] {
        self.column_pings.as_slice()
    }

    /// Key states in row major key order.
    pub fn key_states(&self) -> &[KeyState] {
        &self.key_states
    }

    fn find_pings(&mut self, field: &Grid) {
        self.row_pings.clear();
        self.column_pings.clear();
        let (on_threshold, floor) = (self.on_threshold, self.ping_floor);

        for y in 0..self.height {
            let row_pings = &mut self.row_pings;
            let sample = |i: usize| field.get(i, y);
            find_spans(self.width, on_threshold, sample, |center, z| {
                if z > floor {
                    row_pings.push(Ping { x: center, y: y as f32, z });
                }
            });
        }
        for x in 0..self.width {
            let column_pings = &mut self.column_pings;
            let sample = |i: usize| field.get(x, i);
            find_spans(self.height, on_threshold, sample, |center, z| {
                if z > floor {
                    column_pings.push(Ping { x: x as f32, y: center, z });
                }
            });
        }
    }

    fn gather_key_states(&mut self) {
        for accumulator in self.accumulators.iter_mut() {
            *accumulator = KeyAccumulator::default();
        }
        for ping in self.row_pings.as_slice() {
            let accumulator = &mut self.accumulators[self.mapper.key_index_at(ping.x, ping.y)];
            accumulator.x_sum += ping.x * ping.z;
            accumulator.x_weight += ping.z;
            accumulator.z = accumulator.z.max(ping.z);
        }
        for ping in self.column_pings.as_slice() {
            let accumulator = &mut self.accumulators[self.mapper.key_index_at(ping.x, ping.y)];
            accumulator.y_sum += ping.y * ping.z;
            accumulator.y_weight += ping.z;
            accumulator.z = accumulator.z.max(ping.z);
        }
        for (state, accumulator) in self.key_states.iter_mut().zip(self.accumulators.iter()) {
            *state = if accumulator.x_weight > 0.0 && accumulator.y_weight > 0.0 {
                KeyState {
                    x: accumulator.x_sum / accumulator.x_weight,
                    y: accumulator.y_sum / accumulator.y_weight,
                    z: accumulator.z,
                }
            } else {
                KeyState::default()
            };
        }
    }

    /// True if no neighboring key is stronger. Ties go to the lower key index.
    fn is_strongest_key(&self, index: usize) -> bool {
        let columns = self.mapper.key_columns();
        let rows = self.mapper.key_rows();
        let (kx, ky) = (index % columns, index / columns);
        let z = self.key_states[index].z;
        for ny in ky.saturating_sub(1)..=(ky + 1).min(rows - 1) {
            for nx in kx.saturating_sub(1)..=(kx + 1).min(columns - 1) {
                let neighbor = ny * columns + nx;
                let other = self.key_states[neighbor].z;
                if (neighbor < index && other >= z) || (neighbor > index && other > z) {
                    return false;
                }
            }
        }
        true
    }
}

impl PeakDetector for SpanDetector {
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
        self.find_pings(field);
        self.gather_key_states();

        for index in 0..self.key_states.len() {
            let state = self.key_states[index];
            if state.z > 0.0 && self.is_strongest_key(index) {
                peaks.insert(Peak {
                    x: state.x,
                    y: state.y,
                    z: state.z,
                    saliency: state.z,
                });
            }
        }
    }

    fn set_on_threshold(&mut self, on_threshold: f32) {
        SpanDetector::set_on_threshold(self, on_threshold);
    }

    fn publish(&self, snapshot: &mut TrackerSnapshot) {
        snapshot.row_pings = self.row_pings;
        snapshot.column_pings = self.column_pings;
        snapshot.key_state_count = self.key_states.len();
        snapshot.key_states[..self.key_states.len()].copy_from_slice(&self.key_states);
    }
}

/// Scans `len` samples for concave spans, calling `emit` with the interpolated
/// center and pressure of every span that rises above `threshold`.
fn find_spans<S, E>(len: usize, threshold: f32, sample: S, mut emit: E)
where
    S: Fn(usize) -> f32,
    E: FnMut(f32, f32),
{
    let at = |i: isize| {
        if i < 0 || i as usize >= len {
            0.0
        } else {
            sample(i as usize)
        }
    };
    // Positive inside a dome
    let concavity = |i: isize| 2.0 * at(i) - at(i - 1) - at(i + 1);

    let mut start: Option<f32> = None;
    let mut exceeds = false;
    let mut previous = concavity(-1);
    for i in 0..len as isize {
        let current = concavity(i);
        if current > 0.0 && start.is_none() {
            start = Some(if previous <= 0.0 && i > 0 {
                (i - 1) as f32 + previous / (previous - current)
            } else {
                i as f32
            });
            exceeds = false;
        }
        if let Some(span_start) = start {
            if current > 0.0 {
                exceeds |= at(i) > threshold;
            } else {
                let end = (i - 1) as f32 + previous / (previous - current);
                if exceeds {
                    emit_span(span_start, end, len, &at, &mut emit);
                }
                start = None;
            }
        }
        previous = current;
    }
    if let Some(span_start) = start {
        if exceeds {
            emit_span(span_start, (len - 1) as f32, len, &at, &mut emit);
        }
    }
}

fn emit_span<A, E>(start: f32, end: f32, len: usize, at: &A, emit: &mut E)
where
    A: Fn(isize) -> f32,
    E: FnMut(f32, f32),
{
    let max = (len - 1) as f32;
    let center = 0.5 * (start.max(0.0) + end.min(max));
    let i = center as isize;
    let t = center - i as f32;
    let z = at(i) * (1.0 - t) + at(i + 1) * t;
    emit(center, z);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
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

    fn spans(samples: &[f32], threshold: f32) -> Vec<(f32, f32)> {
        let mut result = Vec::new();
        find_spans(samples.len(), threshold, |i| samples[i], |center, z| result.push((center, z)));
        result
    }

    #[test]
    fn test_symmetric_span() {
        let samples = [0.0, 0.0, 0.1, 0.4, 0.1, 0.0, 0.0];
        let found = spans(&samples, 0.2);
        assert_eq!(found.len(), 1);
        assert!((found[0].0 - 3.0).abs() <= 1e-5);
        assert!((found[0].1 - 0.4).abs() <= 1e-5);
    }

    #[test]
    fn test_span_below_threshold() {
        let samples = [0.0, 0.0, 0.1, 0.15, 0.1, 0.0, 0.0];
        assert!(spans(&samples, 0.2).is_empty());
    }

    #[test]
    fn test_two_spans() {
        let samples = [0.0, 0.1, 0.5, 0.1, 0.0, 0.0, 0.1, 0.3, 0.1, 0.0];
        let found = spans(&samples, 0.2);
        assert_eq!(found.len(), 2);
        assert!((found[0].0 - 2.0).abs() <= 1e-5);
        assert!((found[1].0 - 7.0).abs() <= 1e-5);
    }

    #[test]
    fn test_blob_in_key_space() {
        let mapper = KeyMapper::identity(32, 8);
        let mut detector = SpanDetector::new(32, 8, mapper, 0.03, 0.001);
        let mut field = Grid::new(32, 8);
        // Centered inside key (12, 4), away from key boundaries
        blob(&mut field, 12.5, 4.5, 0.2, 1.2);
        let mut peaks = PeakList::new(8);
        detector.detect(&field, &mut peaks);

        assert!(!detector.row_pings().is_empty());
        assert!(!detector.column_pings().is_empty());
        assert_eq!(peaks.len(), 1);
        let peak = peaks.as_slice()[0];
        assert!((peak.x - 12.5).abs() < 0.1);
        assert!((peak.y - 4.5).abs() < 0.1);
        assert!(peak.z > 0.1);
    }

    #[test]
    fn test_silence() {
        let mut detector = SpanDetector::new(16, 8, KeyMapper::identity(16, 8), 0.03, 0.001);
        let mut peaks = PeakList::new(8);
        detector.detect(&Grid::new(16, 8), &mut peaks);
        assert!(peaks.is_empty());
        assert!(detector.key_states().iter().all(|state| state.z == 0.0));
    }
}
