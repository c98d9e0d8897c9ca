// ============================================================================
// ADJUSTMENT OPERATIONS — per-pixel colour adjustments
// ============================================================================
//
// Every operation reads one buffer and returns a new one. Rows are processed
// in parallel via rayon; channel maths is done in f32 and clamped back into
// 0..=255 on write.
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

/// Rec. 601 luma weights.
pub const LUMA_R: f32 = 0.299;
pub const LUMA_G: f32 = 0.587;
pub const LUMA_B: f32 = 0.114;

/// Contrast pivots around mid-grey.
const CONTRAST_PIVOT: f32 = 128.0;

// ============================================================================
// HELPER: per-pixel transform
// ============================================================================

/// Apply a per-pixel transform and collect the result into a new buffer.
/// `transform` receives (r, g, b, a) as f32 and returns (r, g, b, a) as f32.
pub fn apply_pixel_transform<F>(src: &PixelBuffer, transform: F) -> PixelBuffer
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let (w, h) = src.dimensions();
    if src.is_empty() {
        return src.clone();
    }

    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst = PixelBuffer::new(w, h);

    dst.as_raw_mut().par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for pi in (0..stride).step_by(4) {
            let r = row_in[pi] as f32;
            let g = row_in[pi + 1] as f32;
            let b = row_in[pi + 2] as f32;
            let a = row_in[pi + 3] as f32;
            let (nr, ng, nb, na) = transform(r, g, b, a);
            row_out[pi]     = to_channel(nr);
            row_out[pi + 1] = to_channel(ng);
            row_out[pi + 2] = to_channel(nb);
            row_out[pi + 3] = to_channel(na);
        }
    });
    dst
}

#[inline]
fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn clamp_channel(v: f32) -> f32 {
    v.clamp(0.0, 255.0)
}

// ============================================================================
// PER-CHANNEL FORMULAS
// ============================================================================

/// `brightness` in percent; 100 is identity.
#[inline]
pub fn brightness_channel(c: f32, brightness: f32) -> f32 {
    clamp_channel(c * brightness / 100.0)
}

/// `contrast` in percent around mid-grey; 100 is identity.
#[inline]
pub fn contrast_channel(c: f32, contrast: f32) -> f32 {
    clamp_channel((c - CONTRAST_PIVOT) * contrast / 100.0 + CONTRAST_PIVOT)
}

/// Push each channel away from (or toward) the pixel's luma.
/// `saturation` in percent; 0 is greyscale, 100 is identity.
#[inline]
pub fn saturate_rgb(r: f32, g: f32, b: f32, saturation: f32) -> (f32, f32, f32) {
    let l = LUMA_R * r + LUMA_G * g + LUMA_B * b;
    let k = saturation / 100.0;
    (
        clamp_channel(l + (r - l) * k),
        clamp_channel(l + (g - l) * k),
        clamp_channel(l + (b - l) * k),
    )
}

/// Rotate hue by `degrees` in HSL space. Channels are 0..255.
#[inline]
pub fn hue_rotate_rgb(r: f32, g: f32, b: f32, degrees: f32) -> (f32, f32, f32) {
    let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
    let nh = (h + degrees / 360.0).rem_euclid(1.0);
    let (nr, ng, nb) = hsl_to_rgb(nh, s, l);
    (nr * 255.0, ng * 255.0, nb * 255.0)
}

// ============================================================================
// BUFFER OPERATIONS
// ============================================================================

pub fn brightness(src: &PixelBuffer, brightness: f32) -> PixelBuffer {
    apply_pixel_transform(src, move |r, g, b, a| {
        (
            brightness_channel(r, brightness),
            brightness_channel(g, brightness),
            brightness_channel(b, brightness),
            a,
        )
    })
}

pub fn contrast(src: &PixelBuffer, contrast: f32) -> PixelBuffer {
    apply_pixel_transform(src, move |r, g, b, a| {
        (
            contrast_channel(r, contrast),
            contrast_channel(g, contrast),
            contrast_channel(b, contrast),
            a,
        )
    })
}

pub fn saturation(src: &PixelBuffer, saturation: f32) -> PixelBuffer {
    apply_pixel_transform(src, move |r, g, b, a| {
        let (nr, ng, nb) = saturate_rgb(r, g, b, saturation);
        (nr, ng, nb, a)
    })
}

/// Brightness, contrast and saturation fused into one pass. Each stage
/// clamps before the next, so the result matches running them in sequence
/// up to the final rounding.
pub fn tone(src: &PixelBuffer, brightness: f32, contrast: f32, saturation: f32) -> PixelBuffer {
    apply_pixel_transform(src, move |r, g, b, a| {
        let r = contrast_channel(brightness_channel(r, brightness), contrast);
        let g = contrast_channel(brightness_channel(g, brightness), contrast);
        let b = contrast_channel(brightness_channel(b, brightness), contrast);
        let (nr, ng, nb) = saturate_rgb(r, g, b, saturation);
        (nr, ng, nb, a)
    })
}

pub fn hue_rotate(src: &PixelBuffer, degrees: f32) -> PixelBuffer {
    apply_pixel_transform(src, move |r, g, b, a| {
        let (nr, ng, nb) = hue_rotate_rgb(r, g, b, degrees);
        (nr, ng, nb, a)
    })
}

/// Scale alpha by `opacity` percent. RGB is untouched.
pub fn opacity(src: &PixelBuffer, opacity: f32) -> PixelBuffer {
    let k = (opacity / 100.0).clamp(0.0, 1.0);
    apply_pixel_transform(src, move |r, g, b, a| (r, g, b, a * k))
}

// ============================================================================
// COLOR SPACE HELPERS
// ============================================================================

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// HSL (H: 0..1, S: 0..1, L: 0..1) → RGB (0..1)
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

pub fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 { return p + (q - p) * 6.0 * t; }
    if t < 1.0 / 2.0 { return q; }
    if t < 2.0 / 3.0 { return p + (q - p) * (2.0 / 3.0 - t) * 6.0; }
    p
}
