//! Parameter types for encoding.
//!
//! These describe *what* the encoder should produce, not *how*. They are the
//! interface between [`operations`](super::operations) (which decides the
//! quality and dimensions of each attempt) and the
//! [`backend`](super::backend) (which does the pixel and codec work).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, default 80). Clamped on construction.
//! - [`OutputFormat`]: Target codec: JPEG (lossy), PNG (lossless), WebP (lossy).
//! - [`PixelConfig`]: Channel/bit-depth layout applied before encoding.
//! - [`EncodingSpec`]: Format + pixel config + quality for one encode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Output codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// File extension written for this format, without the dot: the lowercase format name.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    /// Whether the quality setting affects the encoded output.
    pub fn is_lossy(self) -> bool {
        !matches!(self, OutputFormat::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(format!("unknown format '{other}' (expected jpeg, png or webp)")),
        }
    }
}

/// In-memory pixel layout the buffer is reduced to before encoding.
///
/// - `Argb8888`: 8 bits per channel with alpha (no reduction).
/// - `Argb4444`: 4 bits per channel with alpha.
/// - `Rgb565`: no alpha; 5 bits red, 6 bits green, 5 bits blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelConfig {
    #[default]
    Argb8888,
    Argb4444,
    Rgb565,
}

impl PixelConfig {
    pub fn has_alpha(self) -> bool {
        !matches!(self, PixelConfig::Rgb565)
    }
}

impl fmt::Display for PixelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelConfig::Argb8888 => "argb8888",
            PixelConfig::Argb4444 => "argb4444",
            PixelConfig::Rgb565 => "rgb565",
        };
        f.write_str(name)
    }
}

impl FromStr for PixelConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "").as_str() {
            "argb8888" => Ok(PixelConfig::Argb8888),
            "argb4444" => Ok(PixelConfig::Argb4444),
            "rgb565" => Ok(PixelConfig::Rgb565),
            other => Err(format!(
                "unknown pixel config '{other}' (expected argb8888, argb4444 or rgb565)"
            )),
        }
    }
}

/// Everything the backend needs to turn a pixel buffer into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodingSpec {
    pub format: OutputFormat,
    pub pixel_config: PixelConfig,
    pub quality: Quality,
}

impl EncodingSpec {
    /// Same spec at a different quality.
    pub fn with_quality(self, quality: Quality) -> Self {
        Self { quality, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_80() {
        assert_eq!(Quality::default().value(), 80);
    }

    #[test]
    fn format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
    }

    #[test]
    fn only_png_is_lossless() {
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(OutputFormat::Webp.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::Webp);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn pixel_config_parses_android_style_names() {
        assert_eq!(
            "ARGB_8888".parse::<PixelConfig>().unwrap(),
            PixelConfig::Argb8888
        );
        assert_eq!("rgb_565".parse::<PixelConfig>().unwrap(), PixelConfig::Rgb565);
        assert!(!PixelConfig::Rgb565.has_alpha());
    }

    #[test]
    fn with_quality_keeps_format() {
        let spec = EncodingSpec {
            format: OutputFormat::Webp,
            ..EncodingSpec::default()
        };
        let lowered = spec.with_quality(Quality::new(30));
        assert_eq!(lowered.format, OutputFormat::Webp);
        assert_eq!(lowered.quality.value(), 30);
    }
}
