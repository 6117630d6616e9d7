//! Peak detection in smoothed pressure fields.
//!
//! [CurvatureDetector] is the default strategy. [SpanDetector] is an older
//! approach built from 1D row and column spans, kept for comparison and for the
//! diagnostics it produces.
//!
//! # Examples
//!
//! ```
//! use microtouch::common::Grid;
//! use microtouch::detect::{CurvatureDetector, PeakDetector, PeakList};
//!
//! let mut field = Grid::new(16, 8);
//! field.set(6, 3, 0.2);
//! field.set(5, 3, 0.1);
//! field.set(7, 3, 0.1);
//! field.set(6, 2, 0.1);
//! field.set(6, 4, 0.1);
//!
//! let mut detector = CurvatureDetector::new(16, 8, 0.0005);
//! let mut peaks = PeakList::new(4);
//! detector.detect(&field, &mut peaks);
//! assert_eq!(peaks.len(), 1);
//! assert_eq!(peaks.as_slice()[0].x, 6.0);
//! ```

mod curvature;
mod peak;
mod span;

pub use curvature::CurvatureDetector;
pub use peak::{parabolic_offset, Peak, PeakList};
pub use span::{KeyState, Ping, PingList, SpanDetector, MAX_KEY_STATES, MAX_PINGS};

use crate::common::Grid;
use crate::snapshot::TrackerSnapshot;

/// A strategy for finding touch candidates in a smoothed field.
pub trait PeakDetector {
    /// Replaces the contents of `peaks` with the peaks found in `field`, strongest first.
    fn detect(&mut self, field: &Grid, peaks: &mut PeakList);

    /// Called when the tracker's on threshold changes.
    fn set_on_threshold(&mut self, _on_threshold: f32) {}

    /// Copies detector specific diagnostics into a snapshot.
    fn publish(&self, _snapshot: &mut TrackerSnapshot) {}
}
