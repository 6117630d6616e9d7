use micromath::F32Ext;

use crate::error::ConfigError;
use crate::keymap::BreakpointTable;

/// Column breakpoints of a Soundplane model A. Sensor columns 3.5 and 59.5
/// were measured at the centers of key columns 1 and 29, two sensors per key.
const SOUNDPLANE_A_X: [(f32, f32); 4] = [(1.5, 0.0), (3.5, 1.0), (59.5, 29.0), (61.5, 30.0)];
/// Row breakpoints of a Soundplane model A. Sensor rows 1.25 and 5.75 were
/// measured at key rows 1 and 4, one and a half sensors per key, and the
/// outer rows continue at the same pitch.
const SOUNDPLANE_A_Y: [(f32, f32); 4] = [(-0.25, 0.0), (1.25, 1.0), (5.75, 4.0), (7.25, 5.0)];

/// Converts sensor coordinates to logical key coordinates. A key coordinate of
/// `(2.5, 1.5)` is the center of the key in column 2, row 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyMapper {
    x: BreakpointTable,
    y: BreakpointTable,
    key_columns: usize,
    key_rows: usize,
}

impl KeyMapper {
    pub fn new(
        x: BreakpointTable,
        y: BreakpointTable,
        key_columns: usize,
        key_rows: usize,
    ) -> Result<Self, ConfigError> {
        if key_columns == 0 || key_rows == 0 {
            return Err(ConfigError::BadBreakpointTable);
        }
        Ok(KeyMapper {
            x,
            y,
            key_columns,
            key_rows,
        })
    }

    /// The 30x5 key layout of a Soundplane model A.
    pub fn soundplane_a() -> Self {
        KeyMapper {
            x: soundplane_table(&SOUNDPLANE_A_X),
            y: soundplane_table(&SOUNDPLANE_A_Y),
            key_columns: 30,
            key_rows: 5,
        }
    }

    /// Maps sensor coordinates directly to key coordinates, with one key per sensor.
    pub fn identity(width: usize, height: usize) -> Self {
        let x = [(0.0, 0.0), (width as f32, width as f32)];
        let y = [(0.0, 0.0), (height as f32, height as f32)];
        KeyMapper {
            x: soundplane_table(&x),
            y: soundplane_table(&y),
            key_columns: width,
            key_rows: height,
        }
    }

    pub fn key_columns(&self) -> usize {
        self.key_columns
    }

    pub fn key_rows(&self) -> usize {
        self.key_rows
    }

    pub fn key_count(&self) -> usize {
        self.key_columns * self.key_rows
    }

    /// Sensor coordinates to key coordinates.
    #[inline]
    pub fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x.map(x), self.y.map(y))
    }

    /// Key coordinates to sensor coordinates.
    pub fn unmap(&self, kx: f32, ky: f32) -> (f32, f32) {
        (self.x.invert(kx), self.y.invert(ky))
    }

    /// Index of the key under a point in key coordinates. Points outside the
    /// layout belong to the nearest edge key.
    pub fn key_index(&self, kx: f32, ky: f32) -> usize {
        let ix = cell(kx, self.key_columns);
        let iy = cell(ky, self.key_rows);
        iy * self.key_columns + ix
    }

    /// Index of the key under a point in sensor coordinates.
    pub fn key_index_at(&self, x: f32, y: f32) -> usize {
        let (kx, ky) = self.map(x, y);
        self.key_index(kx, ky)
    }

    /// Center of a key in sensor coordinates, or `None` for an out of range index.
    pub fn key_center(&self, index: usize) -> Option<(f32, f32)> {
        if index >= self.key_count() {
            return None;
        }
        let ix = index % self.key_columns;
        let iy = index / self.key_columns;
        Some(self.unmap(ix as f32 + 0.5, iy as f32 + 0.5))
    }

    /// Center, in sensor coordinates, of the key under a point in sensor coordinates.
    pub fn key_center_at(&self, x: f32, y: f32) -> (f32, f32) {
        let index = self.key_index_at(x, y);
        let ix = index % self.key_columns;
        let iy = index / self.key_columns;
        self.unmap(ix as f32 + 0.5, iy as f32 + 0.5)
    }
}

impl Default for KeyMapper {
    fn default() -> Self {
        KeyMapper::soundplane_a()
    }
}

fn cell(k: f32, count: usize) -> usize {
    if !(k > 0.0) {
        0
    } else {
        (k.floor() as usize).min(count - 1)
    }
}

/// Builds a table from points known to be valid.
fn soundplane_table(points: &[(f32, f32)]) -> BreakpointTable {
    match BreakpointTable::new(points) {
        Ok(table) => table,
        Err(_) => panic!("Invalid built-in breakpoint table"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soundplane_a() {
        let mapper = KeyMapper::soundplane_a();
        assert_eq!(mapper.key_count(), 150);
        assert_eq!(mapper.map(3.5, 1.25), (1.0, 1.0));
        assert_eq!(mapper.map(59.5, 5.75), (29.0, 4.0));
        assert_eq!(mapper.map(31.5, 3.5), (15.0, 2.5));
        // Clamped outside the table
        assert_eq!(mapper.map(-10.0, 20.0), (0.0, 5.0));
    }

    #[test]
    fn test_key_index() {
        let mapper = KeyMapper::soundplane_a();
        assert_eq!(mapper.key_index(0.0, 0.0), 0);
        assert_eq!(mapper.key_index(2.5, 1.5), 32);
        assert_eq!(mapper.key_index(30.0, 5.0), 149);
        assert_eq!(mapper.key_index(-1.0, f32::NAN), 0);
    }

    #[test]
    fn test_key_center_round_trip() {
        let mapper = KeyMapper::soundplane_a();
        for index in [0, 31, 77, 149] {
            let (x, y) = mapper.key_center(index).unwrap();
            assert_eq!(mapper.key_index_at(x, y), index);
            let (cx, cy) = mapper.key_center_at(x, y);
            assert!((cx - x).abs() <= 1e-5);
            assert!((cy - y).abs() <= 1e-5);
        }
        assert_eq!(mapper.key_center(150), None);
    }

    #[test]
    fn test_identity() {
        let mapper = KeyMapper::identity(16, 8);
        assert_eq!(mapper.map(3.25, 2.5), (3.25, 2.5));
        assert_eq!(mapper.key_index_at(3.25, 2.5), 2 * 16 + 3);
    }
}
