//! Image processing on the `image` crate, plus libwebp for lossy WebP.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image` header read; zero-area images rejected before decode |
//! | **Decode** | `image` (format sniffed, EXIF orientation applied) |
//! | **Scale** | `calculate_fit_dimensions` + Lanczos3 `resize_exact` |
//! | **Watermark** | `imageproc::drawing::draw_text_mut` + `ab_glyph` |
//! | **Encode** | `image` JPEG / PNG encoders, `webp` (libwebp) lossy WebP |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Watermark**: Text compositing onto a buffer copy
//! - **Operations**: Scaling and the byte-budget encode loop

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;
pub mod watermark;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_fit_dimensions, calculate_halved_dimensions};
pub use operations::{
    BudgetOutcome, BudgetPolicy, BudgetedEncoding, encode_within_budget, get_dimensions,
    scale_to_fit,
};
pub use params::{EncodingSpec, OutputFormat, PixelConfig, Quality};
pub use rust_backend::{RustBackend, is_supported_input, supported_input_extensions};
pub use watermark::{Watermark, apply_watermark, load_font, parse_argb};
