// ============================================================================
// FILTER PIPELINE — filter state and the ordered colour stages
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::PixelBuffer;
use crate::ops::adjustments;
use crate::ops::transform::write_unpremultiplied;

// ============================================================================
// FILTER STATE
// ============================================================================

/// One adjustable slider of the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterParam {
    Brightness,
    Contrast,
    Saturation,
    Blur,
    Hue,
    Rotate,
    Opacity,
    Sharpen,
}

impl FilterParam {
    pub fn all() -> &'static [FilterParam] {
        &[
            FilterParam::Brightness,
            FilterParam::Contrast,
            FilterParam::Saturation,
            FilterParam::Blur,
            FilterParam::Hue,
            FilterParam::Rotate,
            FilterParam::Opacity,
            FilterParam::Sharpen,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterParam::Brightness => "brightness",
            FilterParam::Contrast   => "contrast",
            FilterParam::Saturation => "saturation",
            FilterParam::Blur       => "blur",
            FilterParam::Hue        => "hue",
            FilterParam::Rotate     => "rotate",
            FilterParam::Opacity    => "opacity",
            FilterParam::Sharpen    => "sharpen",
        }
    }

    pub fn default_value(&self) -> f32 {
        match self {
            FilterParam::Brightness | FilterParam::Contrast | FilterParam::Saturation => 100.0,
            FilterParam::Opacity => 100.0,
            FilterParam::Blur | FilterParam::Hue | FilterParam::Rotate | FilterParam::Sharpen => 0.0,
        }
    }

    /// Degrees; wraps rather than clamps.
    pub fn is_angle(&self) -> bool {
        matches!(self, FilterParam::Hue | FilterParam::Rotate)
    }

    /// Inclusive `(min, max)` accepted by [`FilterState::set`].
    pub fn range(&self) -> (f32, f32) {
        match self {
            FilterParam::Brightness | FilterParam::Contrast | FilterParam::Saturation => (0.0, 200.0),
            FilterParam::Blur => (0.0, 20.0),
            FilterParam::Hue | FilterParam::Rotate => (0.0, 360.0),
            FilterParam::Opacity | FilterParam::Sharpen => (0.0, 100.0),
        }
    }
}

impl fmt::Display for FilterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        FilterParam::all()
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| format!("unknown filter '{}'", s.trim()))
    }
}

/// Every live adjustment of a session. Geometric fields (`rotate`, flips)
/// live here too because they are re-applied on every render.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur: f32,
    pub hue: f32,
    pub rotate: f32,
    pub opacity: f32,
    pub sharpen: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
            hue: 0.0,
            rotate: 0.0,
            opacity: 100.0,
            sharpen: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

impl FilterState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn get(&self, param: FilterParam) -> f32 {
        match param {
            FilterParam::Brightness => self.brightness,
            FilterParam::Contrast   => self.contrast,
            FilterParam::Saturation => self.saturation,
            FilterParam::Blur       => self.blur,
            FilterParam::Hue        => self.hue,
            FilterParam::Rotate     => self.rotate,
            FilterParam::Opacity    => self.opacity,
            FilterParam::Sharpen    => self.sharpen,
        }
    }

    /// Set a slider, clamped into its range; angles wrap instead. Non-finite
    /// input falls back to the default. Returns the value actually stored.
    pub fn set(&mut self, param: FilterParam, value: f32) -> f32 {
        let (lo, hi) = param.range();
        let v = if !value.is_finite() {
            param.default_value()
        } else if param.is_angle() {
            value.rem_euclid(360.0).clamp(lo, hi)
        } else {
            value.clamp(lo, hi)
        };
        let slot = match param {
            FilterParam::Brightness => &mut self.brightness,
            FilterParam::Contrast   => &mut self.contrast,
            FilterParam::Saturation => &mut self.saturation,
            FilterParam::Blur       => &mut self.blur,
            FilterParam::Hue        => &mut self.hue,
            FilterParam::Rotate     => &mut self.rotate,
            FilterParam::Opacity    => &mut self.opacity,
            FilterParam::Sharpen    => &mut self.sharpen,
        };
        *slot = v;
        v
    }

    /// Re-clamp every field, e.g. after deserializing a recipe.
    pub fn sanitized(mut self) -> Self {
        for &param in FilterParam::all() {
            let v = self.get(param);
            self.set(param, v);
        }
        self
    }

    /// Whether any colour stage differs from its identity value.
    pub fn has_color_stage(&self) -> bool {
        self.brightness != 100.0
            || self.contrast != 100.0
            || self.saturation != 100.0
            || self.blur > 0.0
            || self.hue.rem_euclid(360.0) != 0.0
            || self.opacity != 100.0
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Run the colour stages in their fixed order: brightness, contrast,
/// saturation, blur, hue, opacity. Stages at their identity value are
/// skipped. `blur_sigma_scale` converts the blur slider into a Gaussian σ.
pub fn apply_filters(src: &PixelBuffer, state: &FilterState, blur_sigma_scale: f32) -> PixelBuffer {
    if !state.has_color_stage() {
        return src.clone();
    }

    let mut out = if state.brightness != 100.0 || state.contrast != 100.0 || state.saturation != 100.0 {
        adjustments::tone(src, state.brightness, state.contrast, state.saturation)
    } else {
        src.clone()
    };

    let sigma = state.blur * blur_sigma_scale;
    if sigma > 0.0 {
        out = gaussian_blur(&out, sigma);
    }

    let hue = state.hue.rem_euclid(360.0);
    if hue != 0.0 {
        out = adjustments::hue_rotate(&out, hue);
    }

    if state.opacity != 100.0 {
        out = adjustments::opacity(&out, state.opacity);
    }
    out
}

// ---------------------------------------------------------------------------
//  Parallel separable Gaussian blur (rayon)
// ---------------------------------------------------------------------------

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma).
pub fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (sigma * 3.0).ceil() as usize;
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *k = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel { *v *= inv; }
    kernel
}

/// Separable Gaussian blur over premultiplied RGBA with clamped edges.
/// A σ of zero returns the input unchanged.
pub fn gaussian_blur(src: &PixelBuffer, sigma: f32) -> PixelBuffer {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || !sigma.is_finite() || sigma <= 0.0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let stride = w * 4;
    // Premultiplied, so transparent pixels do not bleed black into edges.
    let buf_in: Vec<f32> = src
        .as_raw()
        .chunks_exact(4)
        .flat_map(|p| {
            let a = p[3] as f32;
            let k = a / 255.0;
            [p[0] as f32 * k, p[1] as f32 * k, p[2] as f32 * k, a]
        })
        .collect();

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; w * h * 4];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize)
                    .clamp(0, w as isize - 1) as usize;
                for ch in 0..4 {
                    acc[ch] += row_in[sx * 4 + ch] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row), back to straight u8 ---
    let mut dst = PixelBuffer::new(w as u32, h as u32);
    dst.as_raw_mut().par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize)
                    .clamp(0, h as isize - 1) as usize;
                let idx = sy * stride + x * 4;
                for ch in 0..4 {
                    acc[ch] += buf_h[idx + ch] * kv;
                }
            }
            write_unpremultiplied(&mut row_out[x * 4..x * 4 + 4], acc);
        }
    });
    dst
}
