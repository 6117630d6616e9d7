//! Multi-touch tracking for pressure sensing surfaces like the
//! [Soundplane](https://madronalabs.com/soundplane) model A, a 64x8 grid of capacitive
//! pressure sensors sampled at roughly 1 kHz.
//!
//! Every incoming sensor frame passes through a fixed pipeline:
//!
//! 1. [preprocess] - temporal IIR smoothing, negative value clamping and repeated
//!    separable spatial smoothing.
//! 2. [detect] - curvature (second difference) maps along rows and columns, combined into a
//!    2D saliency map whose local maxima are refined to sub-sensor precision.
//! 3. [keymap] - piecewise linear warping from sensor coordinates to logical key coordinates.
//! 4. [track] - candidate ranking, identity preserving slot assignment using mutual nearest
//!    neighbors, adaptive position and pressure filters and finally the output buffer.
//!
//! Optional per-cell normalization and per-location touch templates are collected by the
//! [calibration] state machine. Intermediate signals can be published to a lower priority
//! thread using the lock free [snapshot] channel.
//!
//! Features
//! * No allocations after construction, suitable for the sensor callback thread.
//! * `no_std` compatible (requires `alloc`).
//! * All tuning constants are exposed through [TrackerConfig].
//!
//! # Examples
//!
//! ```
//! use microtouch::{TouchTracker, TrackerConfig, FrameStatus, OUTPUT_COLUMNS};
//!
//! let config = TrackerConfig::default();
//! let mut tracker = TouchTracker::new(config).unwrap();
//! let mut state = tracker.new_state();
//! let mut output = vec![0.0; config.max_touches * OUTPUT_COLUMNS];
//! tracker.bind_output(output.len()).unwrap();
//!
//! // A single pressed cell in an otherwise silent 64x8 frame.
//! let mut frame = vec![0.0; config.width * config.height];
//! frame[3 * config.width + 20] = 0.5;
//!
//! for _ in 0..100 {
//!     let status = tracker.process(&mut state, &frame, &mut output);
//!     assert!(status != FrameStatus::BadFrame);
//! }
//! // Each touch occupies one row of the output: x, y, z, dz, age.
//! let age = output[4];
//! assert!(age > 0.0);
//! ```

#![no_std]

extern crate alloc;

pub mod calibration;
pub mod common;
pub mod config;
pub mod detect;
pub mod error;
pub mod keymap;
pub mod preprocess;
pub mod snapshot;
pub mod track;

pub use config::{CalibrationConfig, DetectorKind, TrackerConfig, MAX_PEAKS, MAX_TOUCHES};
pub use error::ConfigError;
pub use track::{FrameStatus, Touch, TouchTracker, TrackerState, OUTPUT_COLUMNS};
