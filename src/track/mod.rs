//! Touch tracking: turning peaks into persistent, filtered touches.
//!
//! Each frame the strongest peaks become candidates ([CandidateBuilder]),
//! candidates are assigned to slots ([TouchMatcher]), and every slot's raw
//! touch is smoothed and gated ([FilterBank]) before being written to the
//! output buffer. [TouchTracker] runs the whole pipeline.

mod candidates;
mod filter_bank;
mod matcher;
mod output;
mod touch;
mod tracker;

pub use candidates::CandidateBuilder;
pub use filter_bank::{FilterBank, TouchFilter, XyFilter, ZFilter};
pub use matcher::{Assignment, Slot, SlotState, TouchMatcher};
pub use output::{read_touch, write_touches, OUTPUT_COLUMNS};
pub use touch::Touch;
pub use tracker::{FrameStatus, TouchTracker, TrackerState};
