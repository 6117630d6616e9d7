use crate::error::ConfigError;

/// The largest number of points in a [BreakpointTable].
pub const MAX_BREAKPOINTS: usize = 16;

/// A piecewise linear function defined by `(input, output)` points. Inputs must
/// be strictly increasing and outputs non-decreasing. Inputs outside the table
/// map to the output of the nearest end point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreakpointTable {
    points: [(f32, f32); MAX_BREAKPOINTS],
    len: usize,
}

impl BreakpointTable {
    pub fn new(points: &[(f32, f32)]) -> Result<Self, ConfigError> {
        if points.len() < 2 || points.len() > MAX_BREAKPOINTS {
            return Err(ConfigError::BadBreakpointTable);
        }
        for (x, y) in points.iter() {
            if !x.is_finite() || !y.is_finite() {
                return Err(ConfigError::BadBreakpointTable);
            }
        }
        for pair in points.windows(2) {
            if !(pair[1].0 > pair[0].0) || pair[1].1 < pair[0].1 {
                return Err(ConfigError::BadBreakpointTable);
            }
        }
        let mut table = BreakpointTable {
            points: [(0.0, 0.0); MAX_BREAKPOINTS],
            len: points.len(),
        };
        table.points[..points.len()].copy_from_slice(points);
        Ok(table)
    }

    /// The identity mapping over `[min, max]`.
    pub fn identity(min: f32, max: f32) -> Result<Self, ConfigError> {
        BreakpointTable::new(&[(min, min), (max, max)])
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points[..self.len]
    }

    pub fn map(&self, x: f32) -> f32 {
        interpolate(self.points().iter().copied(), x)
    }

    /// Maps an output value back to an input. On flat segments the
    /// smallest matching input is returned.
    pub fn invert(&self, y: f32) -> f32 {
        let points = self.points();
        let first = points[0];
        if y <= first.1 {
            return first.0;
        }
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if y <= y1 && y1 > y0 {
                return x0 + (y - y0) * (x1 - x0) / (y1 - y0);
            }
        }
        points[points.len() - 1].0
    }
}

fn interpolate<I>(mut points: I, x: f32) -> f32
where
    I: Iterator<Item = (f32, f32)>,
{
    let (mut x0, mut y0) = match points.next() {
        Some(point) => point,
        None => return x,
    };
    if x <= x0 {
        return y0;
    }
    for (x1, y1) in points {
        if x <= x1 {
            return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
        }
        x0 = x1;
        y0 = y1;
    }
    y0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map() {
        let table = BreakpointTable::new(&[(0.0, 0.0), (1.0, 1.0), (2.5, 2.0)]).unwrap();
        assert_eq!(table.map(0.5), 0.5);
        assert_eq!(table.map(1.75), 1.5);
        // Clamped to the end points
        assert_eq!(table.map(-3.0), 0.0);
        assert_eq!(table.map(10.0), 2.0);
    }

    #[test]
    fn test_invert() {
        let table = BreakpointTable::new(&[(4.5, 1.5), (60.5, 29.5)]).unwrap();
        assert_eq!(table.invert(1.5), 4.5);
        assert_eq!(table.invert(29.5), 60.5);
        assert!((table.invert(table.map(20.0)) - 20.0).abs() <= 1e-5);
        assert_eq!(table.invert(-1.0), 4.5);
        assert_eq!(table.invert(40.0), 60.5);
    }

    #[test]
    fn test_flat_segment() {
        let table = BreakpointTable::new(&[(0.0, 0.0), (1.0, 1.0), (2.0, 1.0), (3.0, 2.0)]).unwrap();
        assert_eq!(table.map(1.5), 1.0);
        assert_eq!(table.invert(1.0), 1.0);
        assert_eq!(table.invert(1.5), 2.5);
    }

    #[test]
    fn test_invalid_tables() {
        assert_eq!(BreakpointTable::new(&[(0.0, 0.0)]), Err(ConfigError::BadBreakpointTable));
        assert_eq!(
            BreakpointTable::new(&[(0.0, 0.0), (0.0, 1.0)]),
            Err(ConfigError::BadBreakpointTable)
        );
        assert_eq!(
            BreakpointTable::new(&[(0.0, 1.0), (1.0, 0.0)]),
            Err(ConfigError::BadBreakpointTable)
        );
        assert_eq!(
            BreakpointTable::new(&[(0.0, 0.0), (f32::NAN, 1.0)]),
            Err(ConfigError::BadBreakpointTable)
        );
    }
}
