//! Optional sensor calibration.
//!
//! A [Calibrator] turns a guided sequence of frames (silence, a palm swept across
//! the surface, optionally a finger visiting every area) into a [CalibrationModel]:
//! a per-cell gain map and per-cell touch shape templates. Without a model the
//! tracker uses unit gains and a cone shaped default template.

mod calibrator;
mod model;
mod template;

pub use calibrator::{CalibrationStage, CalibrationStatus, Calibrator};
pub use model::{CalibrationModel, MAX_NORMALIZE_GAIN, MIN_NORMALIZE_GAIN};
pub use template::{Template, TemplateSet, TEMPLATE_RADIUS, TEMPLATE_SIZE};
