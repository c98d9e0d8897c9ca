// ============================================================================
// RENDER — compose geometry, colour filters and sharpen
// ============================================================================

use crate::canvas::PixelBuffer;
use crate::ops::filters::{self, FilterState};
use crate::ops::{sharpen, transform};

/// Produce the displayed image for `base` under `state`.
///
/// Geometry (flip, then rotate about the centre) always precedes the colour
/// stages; sharpen runs last on the filtered result. The canvas size never
/// changes here.
pub fn render(base: &PixelBuffer, state: &FilterState, blur_sigma_scale: f32) -> PixelBuffer {
    let oriented = transform::orient(base, state.flip_horizontal, state.flip_vertical, state.rotate);
    let filtered = filters::apply_filters(&oriented, state, blur_sigma_scale);
    if state.sharpen > 0.0 {
        sharpen::sharpen(&filtered, state.sharpen)
    } else {
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> PixelBuffer {
        let mut buf = PixelBuffer::new(6, 4);
        for y in 0..4 {
            for x in 0..6 {
                buf.put_pixel(x, y, Rgba([(x * 40) as u8, (y * 60) as u8, 90, 255]));
            }
        }
        buf
    }

    #[test]
    fn default_state_renders_base() {
        let base = sample();
        assert_eq!(render(&base, &FilterState::default(), 1.0), base);
    }

    #[test]
    fn flip_happens_before_colour() {
        let base = sample();
        let state = FilterState { flip_horizontal: true, brightness: 50.0, ..Default::default() };
        let out = render(&base, &state, 1.0);
        // Source (5,0) is (200, 0, 90); mirrored to (0,0) and halved.
        assert_eq!(out.get_pixel(0, 0), Some(Rgba([100, 0, 45, 255])));
        assert_eq!(out.dimensions(), base.dimensions());
    }

    #[test]
    fn sharpen_runs_after_filters() {
        let base = PixelBuffer::new_filled(3, 3, Rgba([100, 100, 100, 255]));
        let state = FilterState { brightness: 50.0, sharpen: 10.0, ..Default::default() };
        let out = render(&base, &state, 1.0);
        // Brightness first: 50; then 50 + 0.1 * (250 - 200) = 55.
        assert_eq!(out.get_pixel(1, 1), Some(Rgba([55, 55, 55, 255])));
        assert_eq!(out.get_pixel(0, 0), Some(Rgba([50, 50, 50, 255])));
    }
}
