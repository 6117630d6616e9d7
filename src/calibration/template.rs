use alloc::{boxed::Box, vec};
use micromath::F32Ext;

use crate::common::Grid;

/// Distance from the template center to its edge, in sensor cells.
pub const TEMPLATE_RADIUS: usize = 2;
/// Width and height of a template.
pub const TEMPLATE_SIZE: usize = 2 * TEMPLATE_RADIUS + 1;
const TEMPLATE_LEN: usize = TEMPLATE_SIZE * TEMPLATE_SIZE;

/// The expected pressure profile of a single touch around its center,
/// normalized to 1 at the center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Template {
    values: [f32; TEMPLATE_LEN],
}

impl Template {
    pub fn filled(value: f32) -> Self {
        Template {
            values: [value; TEMPLATE_LEN],
        }
    }

    /// A cone falling off linearly to zero at 3.5 cells along x and 3 cells along y.
    pub fn cone() -> Self {
        let (scale_x, scale_y) = (3.5, 3.0);
        let center = TEMPLATE_SIZE as f32 / 2.0;
        let mut template = Template::filled(0.0);
        for j in 0..TEMPLATE_SIZE {
            for i in 0..TEMPLATE_SIZE {
                let dx = (i as f32 + 0.5 - center) / scale_x;
                let dy = (j as f32 + 0.5 - center) / scale_y;
                let distance = (dx * dx + dy * dy).sqrt().min(1.0);
                template.set(i, j, 1.0 - distance);
            }
        }
        template
    }

    pub fn from_slice(values: &[f32]) -> Self {
        let mut template = Template::filled(0.0);
        template.values.copy_from_slice(values);
        template
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[j * TEMPLATE_SIZE + i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        self.values[j * TEMPLATE_SIZE + i] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Point-wise minimum with another template.
    pub fn min_with(&mut self, other: &Template) {
        for (value, other) in self.values.iter_mut().zip(other.values.iter()) {
            if *other < *value {
                *value = *other;
            }
        }
    }

    /// Linear interpolation towards `other`, `t = 0` giving `self`.
    pub fn lerp(&self, other: &Template, t: f32) -> Template {
        let mut result = *self;
        for (value, other) in result.values.iter_mut().zip(other.values.iter()) {
            *value += (*other - *value) * t;
        }
        result
    }

    /// RMS difference between this template and the pressure around (`x`, `y`),
    /// normalized by the pressure at the center. Cells with no pressure are skipped.
    /// Returns 1 if no cell has pressure.
    pub fn difference(&self, field: &Grid, x: f32, y: f32) -> f32 {
        let z = (field.interpolated(x, y) * center_adjust(x, y)).max(0.00001).min(1.0);
        let scale = 1.0 / z;
        let radius = TEMPLATE_RADIUS as f32;
        let (width, height) = (field.width() as f32, field.height() as f32);

        let mut sum = 0.0;
        let mut count = 0;
        for j in 0..TEMPLATE_SIZE {
            for i in 0..TEMPLATE_SIZE {
                let sx = x + i as f32 - radius;
                let sy = y + j as f32 - radius;
                if sx < 0.0 || sy < 0.0 || sx >= width || sy >= height {
                    continue;
                }
                let value = field.interpolated(sx, sy) * scale;
                if value > 0.0 {
                    let d = self.get(i, j) - value;
                    sum += d * d;
                    count += 1;
                }
            }
        }
        if count > 0 {
            (sum / count as f32).sqrt()
        } else {
            1.0
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Template::cone()
    }
}

/// Compensates for the loss of peak height when sampling a peak between
/// sensor centers.
fn center_adjust(x: f32, y: f32) -> f32 {
    let dx = x - x.floor() - 0.5;
    let dy = y - y.floor() - 0.5;
    1.414 - (dx * dx + dy * dy).sqrt() * 0.5
}

/// One template per sensor cell, stored as a flat array of
/// `width * height * TEMPLATE_SIZE * TEMPLATE_SIZE` values.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateSet {
    width: usize,
    height: usize,
    data: Box<[f32]>,
}

impl TemplateSet {
    /// Creates a set where every cell holds `template`.
    pub fn new(width: usize, height: usize, template: &Template) -> Self {
        let mut data = vec![0.0; width * height * TEMPLATE_LEN].into_boxed_slice();
        for chunk in data.chunks_exact_mut(TEMPLATE_LEN) {
            chunk.copy_from_slice(template.as_slice());
        }
        TemplateSet { width, height, data }
    }

    /// Returns None if `data` does not hold exactly one template per cell.
    pub fn from_slice(width: usize, height: usize, data: &[f32]) -> Option<Self> {
        if data.len() != TemplateSet::len_for(width, height) {
            return None;
        }
        Some(TemplateSet {
            width,
            height,
            data: data.into(),
        })
    }

    /// The number of values in a set for a `width` x `height` grid.
    pub fn len_for(width: usize, height: usize) -> usize {
        width * height * TEMPLATE_LEN
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Template {
        let start = (y * self.width + x) * TEMPLATE_LEN;
        Template::from_slice(&self.data[start..start + TEMPLATE_LEN])
    }

    pub fn set(&mut self, x: usize, y: usize, template: &Template) {
        let start = (y * self.width + x) * TEMPLATE_LEN;
        self.data[start..start + TEMPLATE_LEN].copy_from_slice(template.as_slice());
    }

    /// Template at a continuous position, bilinearly interpolated from the four
    /// surrounding cells. Cells outside the set use the cone template.
    pub fn interpolated(&self, x: f32, y: f32) -> Template {
        let x = x.max(0.0).min((self.width - 1) as f32);
        let y = y.max(0.0).min((self.height - 1) as f32);
        let (ix, iy) = (x.floor() as usize, y.floor() as usize);
        let (fx, fy) = (x - ix as f32, y - iy as f32);

        let cell = |cx: usize, cy: usize| {
            if cx < self.width && cy < self.height {
                self.get(cx, cy)
            } else {
                Template::cone()
            }
        };
        let top = cell(ix, iy).lerp(&cell(ix + 1, iy), fx);
        let bottom = cell(ix, iy + 1).lerp(&cell(ix + 1, iy + 1), fx);
        top.lerp(&bottom, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cone() {
        let cone = Template::cone();
        let center = cone.get(TEMPLATE_RADIUS, TEMPLATE_RADIUS);
        assert!(center > 0.8);
        // Falls off towards the corners
        assert!(cone.get(0, 0) < cone.get(1, 1));
        assert!(cone.get(1, 1) < center);
        // Symmetric
        assert_eq!(cone.get(0, 2), cone.get(4, 2));
        assert_eq!(cone.get(2, 0), cone.get(2, 4));
    }

    #[test]
    fn test_min_and_lerp() {
        let mut a = Template::filled(1.0);
        let b = Template::filled(0.5);
        assert_eq!(a.lerp(&b, 0.5), Template::filled(0.75));
        a.min_with(&b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_interpolated_set() {
        let mut set = TemplateSet::new(4, 3, &Template::filled(0.0));
        set.set(2, 1, &Template::filled(1.0));
        assert_eq!(set.interpolated(2.0, 1.0), Template::filled(1.0));
        assert_eq!(set.interpolated(1.5, 1.0), Template::filled(0.5));
        assert_eq!(set.interpolated(1.5, 0.5), Template::filled(0.25));
        assert_eq!(TemplateSet::from_slice(4, 3, &[0.0; 10]), None);
    }

    #[test]
    fn test_difference_of_matching_shape() {
        // A field shaped like the template scores better than a flat field.
        let cone = Template::cone();
        let mut field = Grid::new(9, 7);
        let mut flat = Grid::new(9, 7);
        for j in 0..TEMPLATE_SIZE {
            for i in 0..TEMPLATE_SIZE {
                field.set(i + 2, j + 1, 0.1 * cone.get(i, j));
                flat.set(i + 2, j + 1, 0.1);
            }
        }
        let good = cone.difference(&field, 4.0, 3.0);
        let bad = cone.difference(&flat, 4.0, 3.0);
        assert!(good < bad);
        assert_eq!(cone.difference(&Grid::new(9, 7), 4.0, 3.0), 1.0);
    }
}
