//! High-level image operations.
//!
//! These functions combine calculations with backend execution:
//! [`scale_to_fit`] sizes a buffer to the configured box, and
//! [`encode_within_budget`] runs the encode → measure → shrink loop.
//!
//! ## The budget loop
//!
//! ```text
//! encode at configured quality ──fits──▶ done
//!        │ too big
//!        ▼
//! lossy? lower quality by step (never below floor), re-encode ──fits──▶ done
//!        │ floor reached, or lossless
//!        ▼
//! halve dimensions, reset quality to min(reset, configured), loop
//!        │ attempt cap hit, or short edge would drop below minimum
//!        ▼
//! smallest encoding seen, flagged Unattainable
//! ```
//!
//! Every decision depends only on the inputs and the measured sizes, so the
//! same buffer, spec, and budget always visit the same (quality, dimensions)
//! sequence and return the same bytes.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{calculate_fit_dimensions, calculate_halved_dimensions};
use super::params::{EncodingSpec, Quality};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Tunable constants of the budget loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetPolicy {
    /// How much quality drops per attempt.
    pub quality_step: u32,
    /// Lowest quality tried before downscaling.
    pub quality_floor: u32,
    /// Quality to restart from after each halving (capped at the configured quality).
    pub reset_quality: u32,
    /// Hard cap on encode calls per image.
    pub max_attempts: u32,
    /// Halving stops once the short edge would drop below this.
    pub min_edge_px: u32,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            quality_step: 10,
            quality_floor: 5,
            reset_quality: 50,
            max_attempts: 64,
            min_edge_px: 16,
        }
    }
}

impl BudgetPolicy {
    /// Next lower quality, or `None` once the floor is reached.
    pub fn next_quality(&self, current: Quality) -> Option<Quality> {
        let q = current.value();
        if q <= self.quality_floor {
            return None;
        }
        let lowered = q.saturating_sub(self.quality_step.max(1));
        Some(Quality::new(lowered.max(self.quality_floor)))
    }

    /// Quality to restart from after halving.
    pub fn restart_quality(&self, configured: Quality) -> Quality {
        Quality::new(self.reset_quality.min(configured.value()))
    }

    /// Whether the image is still large enough to halve.
    pub fn can_halve(&self, dims: Dimensions) -> bool {
        dims.short_edge() / 2 >= self.min_edge_px.max(1)
    }
}

/// Whether the loop met the byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetOutcome {
    Met,
    /// The budget could not be reached; the smallest encoding is returned anyway.
    Unattainable,
}

/// Output of [`encode_within_budget`].
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetedEncoding {
    pub bytes: Vec<u8>,
    /// Quality of the returned encoding.
    pub quality: Quality,
    /// Dimensions of the returned encoding.
    pub dimensions: Dimensions,
    /// Total encode calls made.
    pub attempts: u32,
    pub outcome: BudgetOutcome,
}

impl BudgetedEncoding {
    pub fn budget_met(&self) -> bool {
        self.outcome == BudgetOutcome::Met
    }
}

/// Read image dimensions from the file header, rejecting zero-area images.
pub fn get_dimensions(backend: &impl ImageBackend, path: &std::path::Path) -> Result<Dimensions> {
    let dims = backend.identify(path)?;
    if dims.is_empty() {
        return Err(BackendError::InvalidImage(format!(
            "{}: image is {dims}",
            path.display()
        )));
    }
    Ok(dims)
}

/// Shrink `image` to fit inside `max_width` × `max_height`, never upscaling.
pub fn scale_to_fit(
    backend: &impl ImageBackend,
    image: DynamicImage,
    max_width: f32,
    max_height: f32,
) -> Result<DynamicImage> {
    let source = Dimensions::of(&image);
    let target = calculate_fit_dimensions(source.as_tuple(), max_width, max_height)
        .map(Dimensions::from)
        .ok_or_else(|| {
            BackendError::InvalidImage(format!(
                "cannot fit {source} into {max_width}x{max_height}"
            ))
        })?;

    if target == source {
        return Ok(image);
    }
    log::debug!("scaling {source} → {target}");
    backend.resize(&image, target)
}

/// Encode `image` so the result is at most `max_bytes` long whenever possible.
///
/// See the [module docs](self) for the loop. Encoder failures are returned
/// immediately; an unreachable budget is not an error but yields
/// [`BudgetOutcome::Unattainable`] with the smallest encoding produced.
pub fn encode_within_budget(
    backend: &impl ImageBackend,
    image: DynamicImage,
    spec: &EncodingSpec,
    max_bytes: u64,
    policy: &BudgetPolicy,
) -> Result<BudgetedEncoding> {
    let mut current = image;
    let mut dims = Dimensions::of(&current);
    if dims.is_empty() {
        return Err(BackendError::InvalidImage(format!(
            "cannot encode a {dims} image"
        )));
    }

    let mut quality = spec.quality;
    let mut attempts = 0u32;
    let mut smallest: Option<BudgetedEncoding> = None;

    loop {
        let bytes = backend.encode(&current, &spec.with_quality(quality))?;
        attempts += 1;
        log::debug!(
            "attempt {attempts}: {} q{} {dims} → {} bytes (budget {max_bytes})",
            spec.format,
            quality.value(),
            bytes.len()
        );

        if bytes.len() as u64 <= max_bytes {
            return Ok(BudgetedEncoding {
                bytes,
                quality,
                dimensions: dims,
                attempts,
                outcome: BudgetOutcome::Met,
            });
        }

        if smallest
            .as_ref()
            .is_none_or(|best| bytes.len() < best.bytes.len())
        {
            smallest = Some(BudgetedEncoding {
                bytes,
                quality,
                dimensions: dims,
                attempts,
                outcome: BudgetOutcome::Unattainable,
            });
        }

        if attempts >= policy.max_attempts {
            break;
        }

        let lower = if spec.format.is_lossy() {
            policy.next_quality(quality)
        } else {
            None
        };
        if let Some(lower) = lower {
            quality = lower;
            continue;
        }

        if !policy.can_halve(dims) {
            break;
        }
        let target = calculate_halved_dimensions(dims.as_tuple())
            .map(Dimensions::from)
            .ok_or_else(|| BackendError::InvalidImage(format!("cannot halve {dims}")))?;
        current = backend.resize(&current, target)?;
        dims = Dimensions::of(&current);
        quality = policy.restart_quality(spec.quality);
    }

    let best = smallest.map(|best| BudgetedEncoding { attempts, ..best });
    best.ok_or_else(|| BackendError::EncodingFailed("no encode attempts were made".into()))
        .inspect(|best| {
            log::warn!(
                "budget of {max_bytes} bytes unattainable; smallest was {} bytes at q{} {}",
                best.bytes.len(),
                best.quality.value(),
                best.dimensions
            );
        })
}
