//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP, GIF) | `image` crate, format sniffed from content |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the requested quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, best compression, adaptive filter |
//! | Encode → WebP | `webp` crate (libwebp), lossy VP8 at the requested quality |
//!
//! The `image` crate only ships a lossless WebP encoder, so lossy WebP goes
//! through libwebp's `WebPEncode` with `lossless = 0`.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodingSpec, OutputFormat, PixelConfig, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension we can decode (case-insensitive).
pub fn is_supported_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::InvalidImage(format!("{}: {}", path.display(), err))
}

/// Load and decode an image from disk, upright according to its EXIF orientation.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let reader = ImageReader::open(path)
        .map_err(|e| invalid(path, e))?
        .with_guessed_format()
        .map_err(|e| invalid(path, e))?;
    let mut decoder = reader.into_decoder().map_err(|e| invalid(path, e))?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| invalid(path, e))?;
    img.apply_orientation(orientation);

    if Dimensions::of(&img).is_empty() {
        return Err(invalid(path, "image has zero width or height"));
    }
    Ok(img)
}

/// Convert to the channel layout the encoder will receive, reducing bit depth
/// according to the pixel config.
///
/// JPEG has no alpha channel, so it always gets RGB.
fn prepare_pixels(img: &DynamicImage, spec: &EncodingSpec) -> DynamicImage {
    let keep_alpha = spec.pixel_config.has_alpha() && spec.format != OutputFormat::Jpeg;
    let mut prepared = if keep_alpha {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let channels = if keep_alpha { 4 } else { 3 };

    let buf: &mut [u8] = match &mut prepared {
        DynamicImage::ImageRgba8(b) => &mut **b,
        DynamicImage::ImageRgb8(b) => &mut **b,
        _ => unreachable!("prepared buffer is always 8-bit RGB or RGBA"),
    };
    reduce_bit_depth(buf, channels, spec.pixel_config);
    prepared
}

/// Replicate the top bits of an 8-bit channel into a value with `bits` of precision.
fn requantize(value: u8, bits: u32) -> u8 {
    let kept = value >> (8 - bits);
    let mut out = 0u32;
    let mut filled = 0;
    while filled < 8 {
        out = (out << bits) | kept as u32;
        filled += bits;
    }
    (out >> (filled - 8)) as u8
}

fn reduce_bit_depth(data: &mut [u8], channels: usize, config: PixelConfig) {
    match config {
        PixelConfig::Argb8888 => {}
        PixelConfig::Argb4444 => {
            for value in data.iter_mut() {
                *value = requantize(*value, 4);
            }
        }
        PixelConfig::Rgb565 => {
            for pixel in data.chunks_exact_mut(channels) {
                pixel[0] = requantize(pixel[0], 5);
                pixel[1] = requantize(pixel[1], 6);
                pixel[2] = requantize(pixel[2], 5);
            }
        }
    }
}

fn encode_failed(format: OutputFormat, err: impl std::fmt::Display) -> BackendError {
    BackendError::EncodingFailed(format!("{format} encode failed: {err}"))
}

/// Encode a prepared buffer into an in-memory file.
fn encode_image(img: &DynamicImage, spec: &EncodingSpec) -> Result<Vec<u8>, BackendError> {
    let prepared = prepare_pixels(img, spec);
    let mut buf = Vec::new();
    match spec.format {
        OutputFormat::Jpeg => {
            // The JPEG encoder's scale starts at 1.
            let quality = spec.quality.value().clamp(1, 100) as u8;
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            prepared
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(spec.format, e))?;
        }
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            prepared
                .write_with_encoder(encoder)
                .map_err(|e| encode_failed(spec.format, e))?;
        }
        OutputFormat::Webp => return encode_webp(&prepared, spec.quality),
    }
    Ok(buf)
}

/// Lossy WebP through libwebp. `prepared` is always RGB8 or RGBA8.
fn encode_webp(prepared: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let encoder =
        webp::Encoder::from_image(prepared).map_err(|e| encode_failed(OutputFormat::Webp, e))?;
    let mut config = webp::WebPConfig::new()
        .map_err(|_| encode_failed(OutputFormat::Webp, "failed to create WebPConfig"))?;
    config.lossless = 0;
    config.quality = quality.value() as f32;
    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| encode_failed(OutputFormat::Webp, format!("{e:?}")))?;
    Ok(memory.to_vec())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| invalid(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        load_image(path)
    }

    fn resize(
        &self,
        image: &DynamicImage,
        target: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        if target.is_empty() {
            return Err(BackendError::InvalidImage(format!(
                "cannot resize to {target}"
            )));
        }
        if Dimensions::of(image) == target {
            return Ok(image.clone());
        }
        Ok(image.resize_exact(target.width, target.height, FilterType::Lanczos3))
    }

    fn encode(&self, image: &DynamicImage, spec: &EncodingSpec) -> Result<Vec<u8>, BackendError> {
        encode_image(image, spec)
    }
}
