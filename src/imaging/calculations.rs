//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions that fit `source` inside a `max_width` × `max_height` box.
///
/// Never upscales: a source that already fits is returned unchanged. Otherwise
/// both axes are divided by the larger of the two overflow ratios, so the
/// aspect ratio is preserved to within one pixel of rounding.
///
/// Returns `None` for a zero-area source or a box that is not positive and finite.
///
/// # Examples
/// ```
/// # use bytefit::imaging::calculate_fit_dimensions;
/// // Width-bound: 4000/720 = 5.56 beats 3000/960 = 3.13
/// assert_eq!(calculate_fit_dimensions((4000, 3000), 720.0, 960.0), Some((720, 540)));
///
/// // Already fits: no upscaling
/// assert_eq!(calculate_fit_dimensions((500, 500), 720.0, 960.0), Some((500, 500)));
/// ```
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    max_width: f32,
    max_height: f32,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return None;
    }
    if !is_positive_bound(max_width) || !is_positive_bound(max_height) {
        return None;
    }

    let width_ratio = src_w as f64 / max_width as f64;
    let height_ratio = src_h as f64 / max_height as f64;

    if width_ratio <= 1.0 && height_ratio <= 1.0 {
        return Some((src_w, src_h));
    }

    let scale = width_ratio.max(height_ratio);
    let w = fit_axis(src_w, scale, max_width);
    let h = fit_axis(src_h, scale, max_height);
    Some((w, h))
}

fn is_positive_bound(bound: f32) -> bool {
    bound.is_finite() && bound > 0.0
}

/// Divide one axis by `scale`, round, and keep it inside `[1, floor(bound)]`.
fn fit_axis(len: u32, scale: f64, bound: f32) -> u32 {
    let scaled = (len as f64 / scale).round() as u32;
    let ceiling = (bound.floor() as u32).max(1);
    scaled.clamp(1, ceiling)
}

/// Calculate the dimensions for halving an image, preserving aspect ratio.
///
/// Re-runs [`calculate_fit_dimensions`] with a box half the current size.
/// Returns `None` for a zero-area input.
pub fn calculate_halved_dimensions(current: (u32, u32)) -> Option<(u32, u32)> {
    let (w, h) = current;
    calculate_fit_dimensions(current, w as f32 / 2.0, h as f32 / 2.0)
}
