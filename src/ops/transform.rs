// ============================================================================
// TRANSFORM OPERATIONS — flip, rotate, resize, crop
// ============================================================================

use std::str::FromStr;

use image::imageops;
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::components::crop::CropRect;
use crate::error::{EditorError, Result};

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Bilinear,
    #[default]
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic  => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bilinear" | "triangle" => Ok(Interpolation::Bilinear),
            "bicubic" | "catmullrom" => Ok(Interpolation::Bicubic),
            "lanczos3" | "lanczos" => Ok(Interpolation::Lanczos3),
            other => Err(format!("unknown interpolation '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
//  Flip / rotate (canvas size fixed)
// ---------------------------------------------------------------------------

/// Mirror across the vertical axis (`horizontal`) and/or the horizontal axis
/// (`vertical`). Pure index remapping, so flipping twice is exact identity.
pub fn flip(src: &PixelBuffer, horizontal: bool, vertical: bool) -> PixelBuffer {
    let (w, h) = src.dimensions();
    if (!horizontal && !vertical) || src.is_empty() {
        return src.clone();
    }

    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst = PixelBuffer::new(w, h);

    dst.as_raw_mut().par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let sy = if vertical { h as usize - 1 - y } else { y };
        let row_in = &src_raw[sy * stride..(sy + 1) * stride];
        if horizontal {
            for x in 0..w as usize {
                let sx = w as usize - 1 - x;
                row_out[x * 4..x * 4 + 4].copy_from_slice(&row_in[sx * 4..sx * 4 + 4]);
            }
        } else {
            row_out.copy_from_slice(row_in);
        }
    });
    dst
}

/// Rotate about the canvas centre by `degrees` (clockwise on screen).
/// The canvas keeps its size: corners that leave it are clipped and
/// uncovered pixels become transparent.
pub fn rotate(src: &PixelBuffer, degrees: f32) -> PixelBuffer {
    orient(src, false, false, degrees)
}

/// Reduce an angle to `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let d = degrees.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

/// The geometric stage of the render pipeline: translate to the centre,
/// scale by ±1 per flipped axis, rotate, translate back.
///
/// Whole-turn rotations skip resampling and reduce to [`flip`], so the
/// result is pixel-exact.
pub fn orient(src: &PixelBuffer, flip_h: bool, flip_v: bool, degrees: f32) -> PixelBuffer {
    let deg = normalize_degrees(degrees);
    if deg == 0.0 || src.is_empty() {
        return flip(src, flip_h, flip_v);
    }

    let (w, h) = src.dimensions();
    let mut dst = PixelBuffer::new(w, h);
    let cx = w as f32 * 0.5;
    let cy = h as f32 * 0.5;
    let (s, c) = deg.to_radians().sin_cos();
    let sx = if flip_h { -1.0 } else { 1.0 };
    let sy = if flip_v { -1.0 } else { 1.0 };

    let src_w = w as i32;
    let src_h = h as i32;
    let src_stride = src.stride();
    let src_raw = src.as_raw();
    let row_bytes = src.stride();

    // Inverse mapping of flip-then-rotate: source = C + S · R(-θ) · (dest − C),
    // sampled at pixel centres. Bilinear taps are premultiplied so
    // transparent neighbours only thin the alpha.
    dst.as_raw_mut().par_chunks_mut(row_bytes).enumerate().for_each(|(dy, row)| {
        let v = dy as f32 + 0.5 - cy;

        for dx in 0..w as usize {
            let u = dx as f32 + 0.5 - cx;
            let src_x = (c * u + s * v) * sx + cx - 0.5;
            let src_y = (-s * u + c * v) * sy + cy - 0.5;

            let x0 = src_x.floor() as i32;
            let y0 = src_y.floor() as i32;

            if x0 < -1 || y0 < -1 || x0 >= src_w || y0 >= src_h { continue; }

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let sample = |px: i32, py: i32| -> [f32; 4] {
                if px < 0 || py < 0 || px >= src_w || py >= src_h {
                    [0.0; 4]
                } else {
                    let idx = py as usize * src_stride + px as usize * 4;
                    let a = src_raw[idx + 3] as f32;
                    let k = a / 255.0;
                    [
                        src_raw[idx]     as f32 * k,
                        src_raw[idx + 1] as f32 * k,
                        src_raw[idx + 2] as f32 * k,
                        a,
                    ]
                }
            };

            let tl = sample(x0, y0);
            let tr = sample(x0 + 1, y0);
            let bl = sample(x0, y0 + 1);
            let br = sample(x0 + 1, y0 + 1);

            let mut acc = [0.0f32; 4];
            for ch in 0..4 {
                let top = tl[ch] + (tr[ch] - tl[ch]) * fx;
                let bot = bl[ch] + (br[ch] - bl[ch]) * fx;
                acc[ch] = top + (bot - top) * fy;
            }
            write_unpremultiplied(&mut row[dx * 4..dx * 4 + 4], acc);
        }
    });
    dst
}

/// Store a premultiplied RGBA accumulator as straight 8-bit RGBA.
pub(crate) fn write_unpremultiplied(px: &mut [u8], acc: [f32; 4]) {
    let a = acc[3].round().clamp(0.0, 255.0);
    if a <= 0.0 {
        px.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    let scale = 255.0 / acc[3];
    for ch in 0..3 {
        px[ch] = (acc[ch] * scale).round().clamp(0.0, 255.0) as u8;
    }
    px[3] = a as u8;
}

// ---------------------------------------------------------------------------
//  Resize / crop (produce new dimensions)
// ---------------------------------------------------------------------------

/// Resample to exactly `new_w × new_h`.
pub fn resize(src: &PixelBuffer, new_w: u32, new_h: u32, interp: Interpolation) -> Result<PixelBuffer> {
    if new_w == 0 || new_h == 0 {
        return Err(EditorError::InvalidDimensions {
            width: new_w as i64,
            height: new_h as i64,
        });
    }
    if src.is_empty() {
        return Ok(PixelBuffer::new(new_w, new_h));
    }
    let resized = imageops::resize(&src.to_rgba_image(), new_w, new_h, interp.to_filter());
    Ok(PixelBuffer::from_rgba_image(resized))
}

/// Turn possibly-partial user input into concrete resize dimensions.
///
/// A missing side is derived from the other one, keeping the
/// `orig_w:orig_h` aspect ratio (rounded, never below 1).
pub fn resolve_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    width: Option<i64>,
    height: Option<i64>,
) -> Result<(u32, u32)> {
    let invalid = || EditorError::InvalidDimensions {
        width: width.unwrap_or(0),
        height: height.unwrap_or(0),
    };
    let positive = |v: i64| -> Result<u32> {
        if v <= 0 { return Err(invalid()); }
        u32::try_from(v).map_err(|_| invalid())
    };

    match (width, height) {
        (Some(w), Some(h)) => Ok((positive(w)?, positive(h)?)),
        (Some(w), None) => {
            let w = positive(w)?;
            if orig_w == 0 { return Err(invalid()); }
            let ratio = orig_h as f64 / orig_w as f64;
            Ok((w, derive_side(w, ratio)))
        }
        (None, Some(h)) => {
            let h = positive(h)?;
            if orig_h == 0 { return Err(invalid()); }
            let ratio = orig_w as f64 / orig_h as f64;
            Ok((derive_side(h, ratio), h))
        }
        (None, None) => Err(invalid()),
    }
}

fn derive_side(known: u32, ratio: f64) -> u32 {
    (known as f64 * ratio).round().clamp(1.0, u32::MAX as f64) as u32
}

/// Extract `rect` into a new buffer of exactly the rectangle's pixel size.
pub fn crop(src: &PixelBuffer, rect: &CropRect) -> Result<PixelBuffer> {
    let (w, h) = src.dimensions();
    rect.validate(w, h)?;
    let (x0, y0, cw, ch) = rect.pixel_bounds(w, h);

    let src_stride = src.stride();
    let src_raw = src.as_raw();
    let row_bytes = cw as usize * 4;
    let mut dst = PixelBuffer::new(cw, ch);

    dst.as_raw_mut().par_chunks_mut(row_bytes).enumerate().for_each(|(ly, row)| {
        let start = (y0 as usize + ly) * src_stride + x0 as usize * 4;
        row.copy_from_slice(&src_raw[start..start + row_bytes]);
    });
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Every pixel gets a distinct colour derived from its coordinates.
    fn gradient(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        for y in 0..h {
            for x in 0..w {
                buf.put_pixel(x, y, Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255]));
            }
        }
        buf
    }

    fn max_channel_diff(a: &PixelBuffer, b: &PixelBuffer) -> u8 {
        a.as_raw()
            .iter()
            .zip(b.as_raw())
            .map(|(&p, &q)| p.abs_diff(q))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn flip_horizontal_twice_is_identity() {
        let src = gradient(17, 9);
        let once = flip(&src, true, false);
        assert_ne!(once, src);
        assert_eq!(flip(&once, true, false), src);
    }

    #[test]
    fn flip_mirrors_through_centre() {
        let src = gradient(5, 4);
        let h = flip(&src, true, false);
        assert_eq!(h.get_pixel(0, 1), src.get_pixel(4, 1));
        let v = flip(&src, false, true);
        assert_eq!(v.get_pixel(2, 0), src.get_pixel(2, 3));
        let both = flip(&src, true, true);
        assert_eq!(both.get_pixel(0, 0), src.get_pixel(4, 3));
    }

    #[test]
    fn rotate_whole_turns_are_identity() {
        let src = gradient(12, 8);
        assert_eq!(rotate(&src, 0.0), src);
        assert_eq!(rotate(&src, 360.0), src);
        assert_eq!(rotate(&src, -720.0), src);
    }

    #[test]
    fn rotate_near_full_turn_within_one_unit() {
        let src = PixelBuffer::new_filled(10, 10, Rgba([200, 100, 50, 255]));
        let out = rotate(&src, 359.999);
        // Interior pixels are unaffected by clipped corners.
        for y in 2..8 {
            for x in 2..8 {
                let a = out.get_pixel(x, y).unwrap();
                for c in 0..4 {
                    assert!(a[c].abs_diff(src.get_pixel(x, y).unwrap()[c]) <= 1);
                }
            }
        }
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        let mut src = PixelBuffer::new_filled(3, 3, Rgba([0, 0, 0, 255]));
        src.put_pixel(2, 1, Rgba([255, 0, 0, 255]));
        let out = rotate(&src, 90.0);
        assert_eq!(out.dimensions(), (3, 3));
        assert_eq!(out.get_pixel(1, 2), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(out.get_pixel(2, 1), Some(Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn rotate_clips_corners_to_transparent() {
        let src = PixelBuffer::new_filled(40, 40, Rgba([255, 255, 255, 255]));
        let out = rotate(&src, 45.0);
        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(out.get_pixel(0, 0).unwrap()[3], 0);
        assert_eq!(out.get_pixel(20, 20), Some(Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn rotate_edges_keep_colour() {
        let src = PixelBuffer::new_filled(40, 40, Rgba([255, 255, 255, 255]));
        let out = rotate(&src, 45.0);
        let mut partial = 0;
        for p in out.as_raw().chunks_exact(4) {
            if p[3] > 0 {
                assert_eq!(&p[..3], &[255, 255, 255], "{:?}", p);
            }
            if p[3] > 0 && p[3] < 255 {
                partial += 1;
            }
        }
        assert!(partial > 0);
    }

    fn max_diff(a: &PixelBuffer, b: &PixelBuffer) -> u8 {
        a.as_raw().iter().zip(b.as_raw()).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
    }

    #[test]
    fn orient_flips_before_rotating() {
        let mut src = PixelBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                src.put_pixel(x, y, Rgba([(x * 60) as u8, (y * 60) as u8, 100, 255]));
            }
        }
        let out = orient(&src, true, false, 90.0);
        let flip_then_rotate = rotate(&flip(&src, true, false), 90.0);
        let rotate_then_flip = flip(&rotate(&src, 90.0), true, false);

        assert!(max_diff(&out, &flip_then_rotate) <= 1);
        assert!(max_diff(&out, &rotate_then_flip) > 100);
    }

    #[test]
    fn orient_without_rotation_matches_flip() {
        let src = gradient(9, 7);
        assert_eq!(orient(&src, true, true, 0.0), flip(&src, true, true));
    }

    #[test]
    fn resize_produces_exact_dimensions() {
        let src = gradient(64, 48);
        for interp in Interpolation::all() {
            let out = resize(&src, 31, 97, *interp).unwrap();
            assert_eq!(out.dimensions(), (31, 97));
            assert_eq!(out.as_raw().len(), 31 * 97 * 4);
        }
    }

    #[test]
    fn resize_rejects_zero_dimensions() {
        let src = gradient(8, 8);
        assert!(matches!(
            resize(&src, 0, 10, Interpolation::Bilinear),
            Err(EditorError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(matches!(
            resize(&src, 10, 0, Interpolation::Bilinear),
            Err(EditorError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn resolve_derives_missing_side_from_aspect() {
        assert_eq!(resolve_resize_dimensions(200, 100, Some(50), None).unwrap(), (50, 25));
        assert_eq!(resolve_resize_dimensions(200, 100, None, Some(30)).unwrap(), (60, 30));
        assert_eq!(resolve_resize_dimensions(3, 2, Some(5), None).unwrap(), (5, 3));
        assert_eq!(resolve_resize_dimensions(200, 100, Some(7), Some(9)).unwrap(), (7, 9));
    }

    #[test]
    fn resolve_rejects_non_positive_or_missing() {
        assert!(matches!(
            resolve_resize_dimensions(200, 100, Some(-4), Some(10)),
            Err(EditorError::InvalidDimensions { width: -4, height: 10 })
        ));
        assert!(resolve_resize_dimensions(200, 100, Some(10), Some(0)).is_err());
        assert!(resolve_resize_dimensions(200, 100, None, None).is_err());
        assert!(resolve_resize_dimensions(200, 100, Some(i64::MAX), Some(1)).is_err());
    }

    #[test]
    fn crop_extracts_sub_rectangle() {
        let src = gradient(200, 100);
        let rect = CropRect::new(50.0, 20.0, 60.0, 60.0);
        let out = crop(&src, &rect).unwrap();
        assert_eq!(out.dimensions(), (60, 60));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(50, 20));
        assert_eq!(out.get_pixel(59, 59), src.get_pixel(109, 79));
    }

    #[test]
    fn crop_dimensions_match_rect_for_all_valid_sizes() {
        let src = gradient(120, 90);
        for w in (50..=120).step_by(7) {
            for h in (50..=90).step_by(5) {
                let rect = CropRect::new(0.0, 0.0, w as f32, h as f32);
                assert_eq!(crop(&src, &rect).unwrap().dimensions(), (w, h));
            }
        }
    }

    #[test]
    fn crop_rejects_invalid_rects() {
        let src = gradient(100, 100);
        for rect in [
            CropRect::new(-1.0, 0.0, 60.0, 60.0),
            CropRect::new(0.0, 0.0, 49.0, 60.0),
            CropRect::new(60.0, 0.0, 50.0, 60.0),
            CropRect::new(0.0, 51.0, 60.0, 50.0),
        ] {
            assert!(matches!(crop(&src, &rect), Err(EditorError::InvalidRect { .. })), "{rect}");
        }
    }

    #[test]
    fn normalize_wraps_negative_angles() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(45.0), 45.0);
    }
}
