// ============================================================================
// SHARPEN — 3×3 four-neighbour unsharp kernel
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

/// Sharpen interior pixels by amplifying each RGB channel's deviation from
/// its four neighbours:
///
/// ```text
/// out = clamp(c + amount * (5c - (n + s + e + w)), 0, 255)
/// ```
///
/// `sharpen` is in percent (`amount = sharpen / 100`). Border pixels and the
/// alpha channel are copied unchanged, and a zero amount returns an exact
/// copy.
pub fn sharpen(src: &PixelBuffer, sharpen: f32) -> PixelBuffer {
    let amount = sharpen / 100.0;
    let (w, h) = src.dimensions();
    if amount <= 0.0 || !amount.is_finite() || w < 3 || h < 3 {
        return src.clone();
    }

    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst = src.clone();
    let last_row = h as usize - 1;

    dst.as_raw_mut().par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        if y == 0 || y == last_row {
            return;
        }
        let above = &src_raw[(y - 1) * stride..y * stride];
        let here  = &src_raw[y * stride..(y + 1) * stride];
        let below = &src_raw[(y + 1) * stride..(y + 2) * stride];

        for x in 1..w as usize - 1 {
            let pi = x * 4;
            for ch in 0..3 {
                let c = here[pi + ch] as f32;
                let sum = above[pi + ch] as f32
                    + below[pi + ch] as f32
                    + here[pi - 4 + ch] as f32
                    + here[pi + 4 + ch] as f32;
                let v = c + amount * (5.0 * c - sum);
                row_out[pi + ch] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    });
    dst
}
