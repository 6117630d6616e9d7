//! Sensor to key coordinate mapping.
//!
//! Positions found in the sensor grid are warped into a coarser logical key space
//! using one piecewise linear table per axis. The tables are hardware specific;
//! [KeyMapper::soundplane_a] holds the measured layout of a Soundplane model A.

mod breakpoint_table;
mod key_mapper;

pub use breakpoint_table::{BreakpointTable, MAX_BREAKPOINTS};
pub use key_mapper::KeyMapper;
