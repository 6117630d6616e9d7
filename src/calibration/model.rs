use crate::calibration::{Template, TemplateSet};
use crate::common::Grid;
use crate::error::ConfigError;

/// Lower bound of a normalize gain.
pub const MIN_NORMALIZE_GAIN: f32 = 0.125;
/// Upper bound of a normalize gain.
pub const MAX_NORMALIZE_GAIN: f32 = 3.0;

/// Per-cell gains and per-location touch templates collected by a
/// [Calibrator](crate::calibration::Calibrator). The neutral model has neither.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationModel {
    normalize_map: Option<Grid>,
    templates: Option<TemplateSet>,
}

impl CalibrationModel {
    /// Unit gains and the default cone template everywhere.
    pub fn neutral() -> Self {
        CalibrationModel::default()
    }

    pub fn new(normalize_map: Option<Grid>, templates: Option<TemplateSet>) -> Self {
        CalibrationModel {
            normalize_map,
            templates,
        }
    }

    /// Builds a model from stored data. `normalize_map` must hold one gain per
    /// sensor cell and `templates` one template per sensor cell. Gains are clamped
    /// to `[MIN_NORMALIZE_GAIN, MAX_NORMALIZE_GAIN]`.
    pub fn from_parts(
        width: usize,
        height: usize,
        normalize_map: Option<&[f32]>,
        templates: Option<&[f32]>,
    ) -> Result<Self, ConfigError> {
        let normalize_map = match normalize_map {
            Some(gains) => {
                if gains.len() != width * height {
                    return Err(ConfigError::CalibrationSize {
                        expected: width * height,
                        actual: gains.len(),
                    });
                }
                let mut map = Grid::from_slice(width, height, gains);
                map.clamp_min(MIN_NORMALIZE_GAIN);
                map.clamp_max(MAX_NORMALIZE_GAIN);
                Some(map)
            }
            None => None,
        };
        let templates = match templates {
            Some(data) => Some(TemplateSet::from_slice(width, height, data).ok_or(
                ConfigError::CalibrationSize {
                    expected: TemplateSet::len_for(width, height),
                    actual: data.len(),
                },
            )?),
            None => None,
        };
        Ok(CalibrationModel {
            normalize_map,
            templates,
        })
    }

    pub fn is_neutral(&self) -> bool {
        self.normalize_map.is_none() && self.templates.is_none()
    }

    pub fn normalize_map(&self) -> Option<&Grid> {
        self.normalize_map.as_ref()
    }

    pub fn templates(&self) -> Option<&TemplateSet> {
        self.templates.as_ref()
    }

    /// The expected touch shape at a position in sensor coordinates.
    pub fn template_at(&self, x: f32, y: f32) -> Template {
        match &self.templates {
            Some(templates) => templates.interpolated(x, y),
            None => Template::cone(),
        }
    }

    /// How far the pressure around (`x`, `y`) is from the expected touch shape.
    /// Zero is a perfect fit.
    pub fn template_distance(&self, field: &Grid, x: f32, y: f32) -> f32 {
        self.template_at(x, y).difference(field, x, y)
    }
}
