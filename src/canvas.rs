use image::{Rgba, RgbaImage};

use crate::error::{EditorError, Result};

/// Fully transparent black, returned for reads outside the raster.
pub const TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// Flat row-major RGBA8 raster with explicit dimensions.
///
/// `pixels.len() == width * height * 4` holds for every value of this type:
/// the constructors check it and nothing hands out a resizable reference to
/// the storage. Operations in [`crate::ops`] read one buffer and produce a
/// new one; the only in-place mutation is per-pixel writes through
/// [`PixelBuffer::put_pixel`] / [`PixelBuffer::as_raw_mut`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Create a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Create a buffer with every pixel set to `color`.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut pixels = Vec::with_capacity(Self::byte_len(width, height));
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&color.0);
        }
        Self { width, height, pixels }
    }

    /// Wrap raw row-major RGBA bytes. Fails unless `data` is exactly
    /// `width * height * 4` bytes long.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if data.len() != Self::byte_len(width, height) {
            return Err(EditorError::BufferSize {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, pixels: data })
    }

    /// Take ownership of a decoded `RgbaImage` without copying.
    pub fn from_rgba_image(src: RgbaImage) -> Self {
        let (width, height) = src.dimensions();
        Self {
            width,
            height,
            pixels: src.into_raw(),
        }
    }

    /// Copy into an `RgbaImage` for `image::imageops` interop.
    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length invariant guarantees the conversion succeeds.
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    #[inline]
    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    // ---- dimensions ---------------------------------------------------------

    #[inline]
    pub fn width(&self) -> u32 { self.width }

    #[inline]
    pub fn height(&self) -> u32 { self.height }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) { (self.width, self.height) }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize { self.width as usize * 4 }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    // ---- pixel access -------------------------------------------------------

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Read a pixel, `None` outside the raster.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = self.offset(x, y);
        Some(Rgba([
            self.pixels[o],
            self.pixels[o + 1],
            self.pixels[o + 2],
            self.pixels[o + 3],
        ]))
    }

    /// Write a pixel. Writes outside the raster are ignored.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let o = self.offset(x, y);
        self.pixels[o..o + 4].copy_from_slice(&pixel.0);
    }

    /// One row of RGBA bytes.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.pixels[start..start + self.stride()]
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable view of the bytes. The slice cannot change length, so the
    /// size invariant is preserved.
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, EditorError::BufferSize { width: 2, height: 2, actual: 15 }));
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn put_and_get_pixel() {
        let mut buf = PixelBuffer::new(3, 2);
        buf.put_pixel(2, 1, Rgba([1, 2, 3, 4]));
        assert_eq!(buf.get_pixel(2, 1), Some(Rgba([1, 2, 3, 4])));
        assert_eq!(buf.get_pixel(0, 0), Some(TRANSPARENT_PIXEL));
        assert_eq!(buf.get_pixel(3, 0), None);

        // Out-of-range writes are dropped.
        buf.put_pixel(5, 5, Rgba([9, 9, 9, 9]));
        assert_eq!(buf.as_raw().len(), 3 * 2 * 4);
    }

    #[test]
    fn rgba_image_conversion_keeps_bytes() {
        let buf = PixelBuffer::new_filled(4, 3, Rgba([10, 20, 30, 255]));
        let img = buf.to_rgba_image();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(PixelBuffer::from_rgba_image(img), buf);
    }

    #[test]
    fn row_slices_one_scanline() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.put_pixel(1, 1, Rgba([7, 7, 7, 7]));
        assert_eq!(buf.row(1), &[0, 0, 0, 0, 7, 7, 7, 7]);
    }
}
