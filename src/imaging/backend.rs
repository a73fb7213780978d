//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the capability interface the rest of the
//! crate is written against: identify, decode, resize, and encode. Nothing
//! outside a backend touches a codec directly, which is what lets the budget
//! loop be tested against a mock with predictable sizes.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and built on the
//! `image` crate.

use super::params::EncodingSpec;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Font error: {0}")]
    Font(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    pub fn short_edge(self) -> u32 {
        self.width.min(self.height)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `encode` must be a pure function of (pixels, spec): the same buffer and
/// spec always produce the same bytes. The budget loop relies on that for
/// reproducible output.
pub trait ImageBackend: Sync {
    /// Read image dimensions without a full decode where the format allows.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode an image file into a pixel buffer, applying its declared orientation.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resample a buffer to exactly `target` dimensions.
    fn resize(&self, image: &DynamicImage, target: Dimensions)
    -> Result<DynamicImage, BackendError>;

    /// Encode a buffer to bytes in the given format and quality.
    fn encode(&self, image: &DynamicImage, spec: &EncodingSpec) -> Result<Vec<u8>, BackendError>;
}
