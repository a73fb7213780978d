//! # bytefit
//!
//! Shrink images until they fit a byte budget. Each input is scaled to fit a
//! pixel box, optionally stamped with a text watermark, then re-encoded with
//! decreasing quality and, if that is not enough, at halved dimensions until
//! the file is at most `max_size_kb` KiB.
//!
//! ```text
//! source ─▶ decode ─▶ scale to box ─▶ watermark? ─▶ encode ⇄ shrink ─▶ atomic write
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pure-Rust pixel work: fit math, resample, watermark, encode, the budget loop |
//! | [`config`] | `CompressionConfig`: defaults, fluent builder, `bytefit.toml` loading and validation |
//! | [`naming`] | Output file names and destination directory creation |
//! | [`compress`] | The [`Compressor`](compress::Compressor): one image in, one artifact out |
//! | [`batch`] | Many images in parallel with progress events |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Deterministic Output
//!
//! The budget loop's choices depend only on the input pixels, the
//! configuration, and the measured sizes of its own encodings. Encoders are
//! pure functions of (pixels, format, quality), so running the same image
//! through the same configuration twice produces byte-identical files.
//!
//! ## Unreachable Budgets Are Not Errors
//!
//! Some images cannot be squeezed under a tiny budget before they become
//! uselessly small. The loop gives up at a minimum edge length or an attempt
//! cap and writes the smallest encoding it produced, flagged
//! [`BudgetOutcome::Unattainable`](imaging::BudgetOutcome::Unattainable).
//! `--strict` on the CLI, or
//! [`CompressedFile::require_budget`](compress::CompressedFile::require_budget)
//! in code, turns that into a failure.
//!
//! ## No Shared State
//!
//! A [`Compressor`](compress::Compressor) is an ordinary value holding an
//! immutable configuration. Create one per configuration and share it by
//! reference; the batch runner does exactly that across rayon workers.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling, and encoding use the `image` crate; text rendering
//! uses `imageproc` with `ab_glyph`. No system libraries are required.

pub mod batch;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
