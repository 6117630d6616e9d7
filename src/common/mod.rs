//! Common algorithms and utilities.

mod f32_array_ext;
mod fft;
mod grid;
mod one_pole;

pub use f32_array_ext::F32ArrayExt;
pub use fft::{complex_fft, inverse_fft, is_supported_fft_size, real_fft, Complex32};
pub use grid::Grid;
pub use one_pole::{one_pole_coefficient, OnePole};
