//! Drawing primitives shared by the overlays: decode, paste, fill, text, encode.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::error::{DecodingError, ImageFormatHint};
use image::{imageops, ImageError, ImageFormat, ImageReader, Rgb, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::error::{OverlayError, OverlayResult};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
/// Bytes at the end of a JPEG searched for the end-of-image marker; some
/// cameras pad after it.
const JPEG_TAIL_WINDOW: usize = 64;

/// Decode a camera frame.
///
/// Any failure is reported as [`OverlayError::CorruptedImage`]: the frame came
/// off the network and a fresh download may fix it. JPEGs without an
/// end-of-image marker are rejected even when the decoder would accept them.
pub fn decode_frame(bytes: &[u8]) -> OverlayResult<RgbaImage> {
    if is_truncated_jpeg(bytes) {
        return Err(OverlayError::CorruptedImage(ImageError::Decoding(
            DecodingError::new(
                ImageFormatHint::Exact(ImageFormat::Jpeg),
                "missing end-of-image marker",
            ),
        )));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| OverlayError::CorruptedImage(ImageError::IoError(e)))?;
    let img = reader.decode().map_err(OverlayError::CorruptedImage)?;

    Ok(img.to_rgba8())
}

fn is_truncated_jpeg(bytes: &[u8]) -> bool {
    if !bytes.starts_with(&JPEG_SOI) {
        return false;
    }
    let tail = &bytes[bytes.len().saturating_sub(JPEG_TAIL_WINDOW)..];
    !tail.windows(2).any(|w| w == JPEG_EOI)
}

/// Load an image asset (logo, mask) from disk.
pub fn load_asset(path: &Path) -> OverlayResult<RgbaImage> {
    let img = ImageReader::open(path)
        .map_err(|e| OverlayError::Asset {
            path: path.to_path_buf(),
            source: ImageError::IoError(e),
        })?
        .with_guessed_format()
        .map_err(|e| OverlayError::Asset {
            path: path.to_path_buf(),
            source: ImageError::IoError(e),
        })?
        .decode()
        .map_err(|source| OverlayError::Asset {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(img.to_rgba8())
}

/// Encode a frame as JPEG. Alpha is dropped; frames are opaque.
pub fn encode_jpeg(frame: &RgbaImage, quality: u8) -> OverlayResult<Vec<u8>> {
    let rgb: image::ImageBuffer<Rgb<u8>, Vec<u8>> = frame.convert();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(OverlayError::Encode)?;
    Ok(out)
}

/// Paste `top` at `(x, y)`, using its own alpha channel as the mask.
pub fn paste_masked(frame: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    imageops::overlay(frame, top, x, y);
}

/// Fill a rectangle, replacing (not blending) the pixels underneath.
pub fn fill_rect(frame: &mut RgbaImage, x: i32, y: i32, size: (u32, u32), color: Rgba<u8>) {
    if size.0 == 0 || size.1 == 0 {
        return;
    }
    draw_filled_rect_mut(frame, Rect::at(x, y).of_size(size.0, size.1), color);
}

/// Read a TrueType/OpenType font.
pub fn read_font(path: &Path) -> OverlayResult<FontArc> {
    let bytes = std::fs::read(path).map_err(|e| OverlayError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    FontArc::try_from_vec(bytes).map_err(|e| OverlayError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Like [`read_font`], but `None` (with a warning) when unusable.
pub fn load_font(path: &Path) -> Option<FontArc> {
    match read_font(path) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!(error = %e, "Font unusable, text will be skipped");
            None
        }
    }
}

/// Font, size and color of a piece of text.
///
/// Without a font nothing is drawn and text measures as zero.
#[derive(Clone)]
pub struct TextStyle {
    pub font: Option<FontArc>,
    pub size: f32,
    pub color: Rgba<u8>,
}

impl TextStyle {
    pub fn new(font: Option<FontArc>, size: f32, color: Rgba<u8>) -> Self {
        Self { font, size, color }
    }

    /// Width and height of the rendered text in pixels
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) if !text.is_empty() => text_size(PxScale::from(self.size), font, text),
            _ => (0, 0),
        }
    }

    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(font) = &self.font {
            draw_text_mut(canvas, self.color, x, y, PxScale::from(self.size), font, text);
        }
    }
}
