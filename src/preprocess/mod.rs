//! Frame preprocessing: temporal and spatial smoothing of raw sensor frames.

mod frame_preprocessor;
mod spectral_row_filter;

pub use frame_preprocessor::FramePreprocessor;
pub use spectral_row_filter::SpectralRowFilter;
