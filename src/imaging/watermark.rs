//! Text watermark compositing.
//!
//! A [`Watermark`] is stamped onto an RGBA copy of the (already scaled)
//! buffer before the budget loop runs, so the loop measures the watermarked
//! pixels. Text is drawn with `imageproc::drawing::draw_text_mut` from the
//! top-left corner at (`left_px`, `top_px`).

use super::backend::BackendError;
use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_text_mut;
use std::fmt;
use std::path::Path;

/// Text stamped onto an image before encoding.
#[derive(Clone)]
pub struct Watermark {
    pub text: String,
    pub text_size_px: f32,
    /// Packed `0xAARRGGBB`.
    pub color_argb: u32,
    pub left_px: i32,
    pub top_px: i32,
    pub font: FontArc,
}

impl fmt::Debug for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watermark")
            .field("text", &self.text)
            .field("text_size_px", &self.text_size_px)
            .field("color_argb", &format_args!("{:#010x}", self.color_argb))
            .field("left_px", &self.left_px)
            .field("top_px", &self.top_px)
            .finish_non_exhaustive()
    }
}

impl Watermark {
    pub fn new(text: impl Into<String>, font: FontArc) -> Self {
        Self {
            text: text.into(),
            text_size_px: 24.0,
            color_argb: 0xFFFF_FFFF,
            left_px: 0,
            top_px: 0,
            font,
        }
    }

    pub fn with_size(mut self, text_size_px: f32) -> Self {
        self.text_size_px = text_size_px;
        self
    }

    pub fn with_color(mut self, color_argb: u32) -> Self {
        self.color_argb = color_argb;
        self
    }

    pub fn with_offset(mut self, left_px: i32, top_px: i32) -> Self {
        self.left_px = left_px;
        self.top_px = top_px;
        self
    }

    /// Colour as an `image` RGBA pixel.
    pub fn rgba(&self) -> Rgba<u8> {
        argb_to_rgba(self.color_argb)
    }
}

/// Load a TrueType/OpenType font from disk.
pub fn load_font(path: &Path) -> Result<FontArc, BackendError> {
    let data = std::fs::read(path)?;
    FontArc::try_from_vec(data)
        .map_err(|e| BackendError::Font(format!("{}: {}", path.display(), e)))
}

/// Unpack `0xAARRGGBB` into an RGBA pixel.
pub fn argb_to_rgba(argb: u32) -> Rgba<u8> {
    let [a, r, g, b] = argb.to_be_bytes();
    Rgba([r, g, b, a])
}

/// Parse `#AARRGGBB` or `#RRGGBB` (alpha defaults to opaque).
pub fn parse_argb(value: &str) -> Option<u32> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        8 => u32::from_str_radix(hex, 16).ok(),
        6 => u32::from_str_radix(hex, 16).ok().map(|rgb| 0xFF00_0000 | rgb),
        _ => None,
    }
}

/// Draw the watermark onto an RGBA copy of `image`.
///
/// Empty text returns the copy untouched.
pub fn apply_watermark(image: &DynamicImage, watermark: &Watermark) -> DynamicImage {
    let mut canvas = image.to_rgba8();
    if !watermark.text.is_empty() {
        draw_text_mut(
            &mut canvas,
            watermark.rgba(),
            watermark.left_px,
            watermark.top_px,
            PxScale::from(watermark.text_size_px),
            &watermark.font,
            &watermark.text,
        );
    }
    DynamicImage::ImageRgba8(canvas)
}
