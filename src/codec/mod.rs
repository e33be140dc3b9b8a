//! Raster transcoding for image formats the PDF writer cannot embed directly.
//!
//! BMP and single-frame GIF are decoded to 8-bit RGB/RGBA and re-encoded as a
//! minimal PNG. Vector metafiles are recognised only so they can be rejected.

mod bmp;
mod gif;
mod png;

use std::fmt;

pub use bmp::decode_bmp;
pub use gif::decode_gif;
pub use png::{crc32, encode_png};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Largest pixel count accepted from an image header.
const MAX_PIXELS: u64 = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Bmp,
    Gif,
    Wmf,
    Emf,
    Unknown,
}

impl RasterFormat {
    /// Detect the format from magic bytes.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(&PNG_SIGNATURE) {
            return RasterFormat::Png;
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return RasterFormat::Jpeg;
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return RasterFormat::Gif;
        }
        if data.starts_with(b"BM") && data.len() >= 26 {
            return RasterFormat::Bmp;
        }
        if data.len() >= 44 && data[40..44] == [0x20, 0x45, 0x4D, 0x46] {
            return RasterFormat::Emf;
        }
        if data.len() >= 4
            && (data[0..4] == [0xD7, 0xCD, 0xC6, 0x9A] || data[0..4] == [0x01, 0x00, 0x09, 0x00])
        {
            return RasterFormat::Wmf;
        }
        RasterFormat::Unknown
    }

    /// Guess the format from a file extension, for payloads without a known signature.
    pub fn from_extension(path: &str) -> Self {
        let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "png" => RasterFormat::Png,
            "jpg" | "jpeg" | "jpe" => RasterFormat::Jpeg,
            "bmp" | "dib" => RasterFormat::Bmp,
            "gif" => RasterFormat::Gif,
            "wmf" => RasterFormat::Wmf,
            "emf" => RasterFormat::Emf,
            _ => RasterFormat::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Unsupported(RasterFormat),
    Truncated,
    Malformed(&'static str),
    TooLarge,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Unsupported(format) => write!(f, "unsupported image format {format:?}"),
            CodecError::Truncated => write!(f, "image data is truncated"),
            CodecError::Malformed(what) => write!(f, "malformed image: {what}"),
            CodecError::TooLarge => write!(f, "image dimensions exceed the decoder limit"),
        }
    }
}

impl std::error::Error for CodecError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Rgb,
    Rgba,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Rgb => 3,
            Channels::Rgba => 4,
        }
    }
}

/// Decoded 8-bit image, rows top-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub(crate) fn new(width: u32, height: u32, channels: Channels) -> Result<Self, CodecError> {
        if width == 0 || height == 0 {
            return Err(CodecError::Malformed("zero image dimension"));
        }
        if width as u64 * height as u64 > MAX_PIXELS {
            return Err(CodecError::TooLarge);
        }
        let len = width as usize * height as usize * channels.count();
        Ok(Bitmap {
            width,
            height,
            channels,
            pixels: vec![0; len],
        })
    }

    /// Pixel at (x, y) as RGBA; opaque for RGB bitmaps.
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let n = self.channels.count();
        let i = (y as usize * self.width as usize + x as usize) * n;
        let p = &self.pixels[i..i + n];
        match self.channels {
            Channels::Rgb => [p[0], p[1], p[2], 255],
            Channels::Rgba => [p[0], p[1], p[2], p[3]],
        }
    }
}

/// Transcode BMP or GIF bytes into a PNG stream. PNG input passes through unchanged.
pub fn to_png(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match RasterFormat::detect(data) {
        RasterFormat::Png => Ok(data.to_vec()),
        RasterFormat::Bmp => Ok(encode_png(&decode_bmp(data)?)),
        RasterFormat::Gif => Ok(encode_png(&decode_gif(data)?)),
        other => Err(CodecError::Unsupported(other)),
    }
}

pub(crate) fn read_u16_le(data: &[u8], at: usize) -> Result<u16, CodecError> {
    data.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(CodecError::Truncated)
}

pub(crate) fn read_u32_le(data: &[u8], at: usize) -> Result<u32, CodecError> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(CodecError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_signatures() {
        assert_eq!(RasterFormat::detect(&PNG_SIGNATURE), RasterFormat::Png);
        assert_eq!(RasterFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), RasterFormat::Jpeg);
        assert_eq!(RasterFormat::detect(b"GIF89a\x01\x00"), RasterFormat::Gif);
        assert_eq!(RasterFormat::detect(&[0xD7, 0xCD, 0xC6, 0x9A, 0, 0]), RasterFormat::Wmf);
        let mut emf = vec![0u8; 48];
        emf[40..44].copy_from_slice(b" EMF");
        assert_eq!(RasterFormat::detect(&emf), RasterFormat::Emf);
        assert_eq!(RasterFormat::detect(b"hello"), RasterFormat::Unknown);
    }

    #[test]
    fn metafiles_are_rejected() {
        let wmf = [0x01, 0x00, 0x09, 0x00, 0x00, 0x03];
        assert_eq!(
            to_png(&wmf),
            Err(CodecError::Unsupported(RasterFormat::Wmf))
        );
    }

    #[test]
    fn extension_fallback() {
        assert_eq!(RasterFormat::from_extension("BinData/image1.BMP"), RasterFormat::Bmp);
        assert_eq!(RasterFormat::from_extension("a.jpeg"), RasterFormat::Jpeg);
        assert_eq!(RasterFormat::from_extension("noext"), RasterFormat::Unknown);
    }

    #[test]
    fn oversized_dimensions_are_refused() {
        assert_eq!(
            Bitmap::new(1 << 16, 1 << 16, Channels::Rgb),
            Err(CodecError::TooLarge)
        );
    }
}
