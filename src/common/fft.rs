use core::convert::TryInto;

pub use microfft::Complex32;

/// Returns true if `size` is a transform length supported by [real_fft] and [complex_fft].
pub fn is_supported_fft_size(size: usize) -> bool {
    matches!(size, 8 | 16 | 32 | 64 | 128 | 256 | 512 | 1024)
}

/// Performs an in-place real FFT on a given buffer. The returned slice holds
/// `buffer.len() / 2` bins, with the real valued Nyquist coefficient packed into
/// the imaginary part of the DC bin.
pub fn real_fft(buffer: &mut [f32]) -> &mut [Complex32] {
    let fft_size = buffer.len();
    match fft_size {
        8 => microfft::real::rfft_8(buffer.try_into().unwrap()),
        16 => microfft::real::rfft_16(buffer.try_into().unwrap()),
        32 => microfft::real::rfft_32(buffer.try_into().unwrap()),
        64 => microfft::real::rfft_64(buffer.try_into().unwrap()),
        128 => microfft::real::rfft_128(buffer.try_into().unwrap()),
        256 => microfft::real::rfft_256(buffer.try_into().unwrap()),
        512 => microfft::real::rfft_512(buffer.try_into().unwrap()),
        1024 => microfft::real::rfft_1024(buffer.try_into().unwrap()),
        _ => panic!("Unsupported fft size {}", fft_size),
    }
}

/// Performs an in-place complex FFT on a given buffer.
pub fn complex_fft(buffer: &mut [Complex32]) {
    let fft_size = buffer.len();
    match fft_size {
        8 => {
            let _ = microfft::complex::cfft_8(buffer.try_into().unwrap());
        }
        16 => {
            let _ = microfft::complex::cfft_16(buffer.try_into().unwrap());
        }
        32 => {
            let _ = microfft::complex::cfft_32(buffer.try_into().unwrap());
        }
        64 => {
            let _ = microfft::complex::cfft_64(buffer.try_into().unwrap());
        }
        128 => {
            let _ = microfft::complex::cfft_128(buffer.try_into().unwrap());
        }
        256 => {
            let _ = microfft::complex::cfft_256(buffer.try_into().unwrap());
        }
        512 => {
            let _ = microfft::complex::cfft_512(buffer.try_into().unwrap());
        }
        1024 => {
            let _ = microfft::complex::cfft_1024(buffer.try_into().unwrap());
        }
        _ => panic!("Unsupported fft size {}", fft_size),
    }
}

/// Computes the inverse FFT of a full spectrum in place, including the 1 / N scaling.
pub fn inverse_fft(buffer: &mut [Complex32]) {
    // Reordering the bins turns the forward transform into the inverse transform (up to a scale)
    buffer[1..].reverse();
    complex_fft(buffer);

    let scale = 1.0 / (buffer.len() as f32);
    for value in buffer.iter_mut() {
        value.re *= scale;
        value.im *= scale;
    }
}
