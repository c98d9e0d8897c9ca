// ============================================================================
// IO — decode into PixelBuffer, encode out of it
// ============================================================================
//
// The codec boundary. Everything here either produces an owned PixelBuffer
// or consumes one; the editor never sees file formats.

use std::io::{BufWriter, Cursor, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat};

use crate::canvas::PixelBuffer;
use crate::error::{EditorError, Result};

/// Input formats the decoder accepts.
pub const SUPPORTED_INPUT: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tga,
    ImageFormat::Tiff,
];

/// Output formats the encoder writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png  => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp  => "bmp",
            SaveFormat::Tga  => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

// ============================================================================
// DECODE
// ============================================================================

/// Work out the format of `bytes`, from its signature first and then from
/// the file extension (TGA has no magic number). Anything outside
/// [`SUPPORTED_INPUT`] is `UnsupportedFileType`.
pub fn detect_format(bytes: &[u8], extension: Option<&str>) -> Result<ImageFormat> {
    let by_ext = extension.and_then(ImageFormat::from_extension);
    // A TGA header can look like another format's signature.
    let guessed = if by_ext == Some(ImageFormat::Tga) {
        by_ext
    } else {
        image::guess_format(bytes).ok().or(by_ext)
    };
    match guessed {
        Some(fmt) if SUPPORTED_INPUT.contains(&fmt) => Ok(fmt),
        Some(fmt) => Err(EditorError::UnsupportedFileType(
            fmt.extensions_str().first().copied().unwrap_or("unknown").to_string(),
        )),
        None => Err(EditorError::UnsupportedFileType(
            extension.unwrap_or("unknown").to_string(),
        )),
    }
}

/// Decode an in-memory file to RGBA8.
pub fn decode(bytes: &[u8], extension: Option<&str>) -> Result<PixelBuffer> {
    let format = detect_format(bytes, extension)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    Ok(PixelBuffer::from_rgba_image(img.to_rgba8()))
}

/// Read and decode a file from disk.
pub fn load_image_sync(path: &Path) -> Result<PixelBuffer> {
    let ext = path.extension().and_then(|e| e.to_str());
    let bytes = std::fs::read(path)?;
    decode(&bytes, ext)
}

// ---------------------------------------------------------------------------
//  Background decode
// ---------------------------------------------------------------------------

/// A decode running on the rayon pool. The generation lets the receiver
/// discard results that were superseded by a later load.
#[derive(Debug)]
pub struct PendingDecode {
    generation: u64,
    rx: mpsc::Receiver<Result<PixelBuffer>>,
}

impl PendingDecode {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking poll. `None` while the decode is still running.
    pub fn try_recv(&self) -> Option<Result<PixelBuffer>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// Block the calling thread until the decode finishes.
    pub fn wait(self) -> Result<PixelBuffer> {
        self.rx.recv().unwrap_or_else(|_| Err(worker_gone()))
    }
}

fn worker_gone() -> EditorError {
    EditorError::Io(std::io::Error::other("decode worker exited without a result"))
}

/// Decode `bytes` on the rayon pool. Format detection happens up front so
/// unsupported files are reported synchronously.
pub fn spawn_decode(bytes: Vec<u8>, extension: Option<String>, generation: u64) -> Result<PendingDecode> {
    let format = detect_format(&bytes, extension.as_deref())?;
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        let result = image::load_from_memory_with_format(&bytes, format)
            .map(|img| PixelBuffer::from_rgba_image(img.to_rgba8()))
            .map_err(EditorError::from);
        let _ = tx.send(result);
    });
    Ok(PendingDecode { generation, rx })
}

// ============================================================================
// ENCODE
// ============================================================================

/// Lossless RGBA PNG bytes.
pub fn encode_png(buf: &PixelBuffer) -> Result<Vec<u8>> {
    encode(buf, SaveFormat::Png, 90)
}

/// Encode into memory. `quality` only applies to JPEG.
pub fn encode(buf: &PixelBuffer, format: SaveFormat, quality: u8) -> Result<Vec<u8>> {
    let (w, h) = buf.dimensions();
    let mut out = Vec::new();
    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut out).write_image(buf.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(buf.to_rgba_image()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                .write_image(rgb.as_raw(), w, h, ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            BmpEncoder::new(&mut out).write_image(buf.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Tga => {
            TgaEncoder::new(&mut out).write_image(buf.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Tiff => {
            let mut cursor = Cursor::new(&mut out);
            TiffEncoder::new(&mut cursor).write_image(buf.as_raw(), w, h, ColorType::Rgba8)?;
        }
    }
    Ok(out)
}

/// Encode and write to `path`.
pub fn encode_and_write(buf: &PixelBuffer, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let bytes = encode(buf, format, quality)?;
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// EXPORT NAMING
// ============================================================================

/// `<prefix>-YYYY-MM-DDTHH-MM-SS.png` for `now`, in UTC.
pub fn export_file_name(prefix: &str, now: SystemTime) -> String {
    format!("{}-{}.png", prefix, file_timestamp(now))
}

/// `YYYY-MM-DDTHH-MM-SS` (UTC), safe for file names.
pub fn file_timestamp(now: SystemTime) -> String {
    let secs = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}-{:02}-{:02}",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Duration;

    fn sample() -> PixelBuffer {
        let mut buf = PixelBuffer::new(5, 4);
        for y in 0..4 {
            for x in 0..5 {
                buf.put_pixel(x, y, Rgba([x as u8 * 50, y as u8 * 60, 7, 200 + x as u8]));
            }
        }
        buf
    }

    #[test]
    fn png_is_lossless() {
        let buf = sample();
        let bytes = encode_png(&buf).unwrap();
        assert_eq!(detect_format(&bytes, None).unwrap(), ImageFormat::Png);
        assert_eq!(decode(&bytes, None).unwrap(), buf);
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let err = decode(b"definitely not an image", Some("txt")).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFileType(ext) if ext == "txt"));
    }

    #[test]
    fn gif_is_detected_but_refused() {
        let err = detect_format(b"GIF89a\x01\x00\x01\x00", None).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFileType(ext) if ext == "gif"));
    }

    #[test]
    fn jpeg_drops_alpha_but_keeps_size() {
        let bytes = encode(&sample(), SaveFormat::Jpeg, 90).unwrap();
        let back = decode(&bytes, Some("jpg")).unwrap();
        assert_eq!(back.dimensions(), (5, 4));
        assert_eq!(back.get_pixel(0, 0).unwrap().0[3], 255);
    }

    #[test]
    fn lossless_formats_round_trip() {
        let buf = sample();
        for (format, ext) in [(SaveFormat::Tga, "tga"), (SaveFormat::Tiff, "tiff")] {
            let bytes = encode(&buf, format, 90).unwrap();
            assert_eq!(decode(&bytes, Some(ext)).unwrap(), buf, "{ext}");
        }
    }

    #[test]
    fn bmp_keeps_size() {
        let bytes = encode(&sample(), SaveFormat::Bmp, 90).unwrap();
        assert_eq!(detect_format(&bytes, None).unwrap(), ImageFormat::Bmp);
        assert_eq!(decode(&bytes, None).unwrap().dimensions(), (5, 4));
    }

    #[test]
    fn save_format_from_extension() {
        assert_eq!(SaveFormat::from_extension("JPEG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_extension(".tif"), Some(SaveFormat::Tiff));
        assert_eq!(SaveFormat::from_path(Path::new("a/b.png")), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::from_extension("gif"), None);
    }

    #[test]
    fn export_name_is_utc_timestamped() {
        // 2024-02-29T13:05:09Z
        let t = UNIX_EPOCH + Duration::from_secs(1_709_211_909);
        assert_eq!(export_file_name("pixels-edited", t), "pixels-edited-2024-02-29T13-05-09.png");
        assert_eq!(file_timestamp(UNIX_EPOCH), "1970-01-01T00-00-00");
    }

    #[test]
    fn background_decode_delivers_buffer() {
        let buf = sample();
        let pending = spawn_decode(encode_png(&buf).unwrap(), None, 7).unwrap();
        assert_eq!(pending.generation(), 7);
        assert_eq!(pending.wait().unwrap(), buf);
    }

    #[test]
    fn background_decode_rejects_unsupported_up_front() {
        assert!(matches!(
            spawn_decode(b"nope".to_vec(), Some("xyz".into()), 1),
            Err(EditorError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        encode_and_write(&sample(), &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(load_image_sync(&path).unwrap(), sample());
    }
}
