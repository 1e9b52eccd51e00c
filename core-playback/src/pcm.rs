//! # Fixed-Point to PCM Conversion
//!
//! Turns decoder output ([`Fixed`] samples with [`FRAC_BITS`] fractional
//! bits) into interleaved signed 16-bit PCM.
//!
//! The quantization is round-to-nearest with hard clipping and no dither.

use crate::engine::{Fixed, PcmFrame, FIXED_ONE, FRAC_BITS};

const ROUNDING_BIAS: Fixed = 1 << (FRAC_BITS - 16);
const OUTPUT_SHIFT: u32 = FRAC_BITS + 1 - 16;

/// Quantize one fixed-point sample to 16 bits.
///
/// `+1.0` clips to `i16::MAX`, `-1.0` maps to `i16::MIN`.
#[inline]
pub fn scale(sample: Fixed) -> i16 {
    let rounded = sample.saturating_add(ROUNDING_BIAS);
    let clipped = rounded.clamp(-FIXED_ONE, FIXED_ONE - 1);
    (clipped >> OUTPUT_SHIFT) as i16
}

/// Convert `sample` in `[-1.0, 1.0]` to [`Fixed`], saturating outside it.
#[inline]
pub fn fixed_from_f32(sample: f32) -> Fixed {
    (sample * FIXED_ONE as f32) as Fixed
}

/// Append a frame's samples to `out`, interleaved `L, R` for stereo.
///
/// Mono frames produce one sample per input sample. Returns the number of
/// samples appended.
pub fn interleave_into(frame: &PcmFrame<'_>, out: &mut Vec<i16>) -> usize {
    let len = frame.len();
    let before = out.len();

    match frame.right {
        Some(right) => {
            out.reserve(len * 2);
            for (&l, &r) in frame.left[..len].iter().zip(&right[..len]) {
                out.push(scale(l));
                out.push(scale(r));
            }
        }
        None => {
            out.reserve(len);
            out.extend(frame.left[..len].iter().map(|&s| scale(s)));
        }
    }

    out.len() - before
}

/// Size in bytes of a slice of 16-bit samples.
#[inline]
pub fn byte_len(samples: &[i16]) -> usize {
    std::mem::size_of_val(samples)
}
