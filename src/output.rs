//! CLI output formatting.
//!
//! Every formatter is a pure function returning display lines, so the exact
//! output is unit tested without capturing stdout. The `print_*` wrappers are
//! the only functions that write.
//!
//! # Output Format
//!
//! ## Per image (printed as each worker finishes)
//!
//! ```text
//! [001/003] beach.png → Pictures/small_beach.jpeg
//!     2.4 MB → 98.7 KB, 720x540, q50, 6 attempts
//! [002/003] dunes.tif → Pictures/small_dunes.jpeg
//!     9.1 MB → 131.0 KB, 16x12, q5, 64 attempts
//!     over budget: 100.0 KB not reachable
//! [003/003] notes.png: failed
//!     Invalid image: notes.png: format could not be determined
//! ```
//!
//! ## Summary
//!
//! ```text
//! Compressed 2 of 3 images: 11.5 MB → 229.7 KB
//!     1 over budget
//!     1 failed
//! ```

use crate::batch::{BatchResult, CompressEvent};
use crate::compress::CompressedFile;
use std::path::Path;

/// Indentation string for a given depth (4 spaces per level).
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count using 1024-based units.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// `[003/120]` style position marker, padded to the width of `total`.
fn position(index: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("[{index:0width$}/{total:0width$}]")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Detail lines for one artifact, without the header.
fn artifact_details(artifact: &CompressedFile) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{} \u{2192} {}, {}, q{}, {} attempts",
        indent(1),
        format_size(artifact.source_bytes),
        format_size(artifact.bytes_written),
        artifact.dimensions,
        artifact.quality.value(),
        artifact.attempts
    )];
    if !artifact.budget_met() {
        lines.push(format!(
            "{}over budget: {} not reachable",
            indent(1),
            format_size(artifact.budget_bytes)
        ));
    }
    lines
}

// ============================================================================
// Progress events
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_compress_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Compressed {
            index,
            total,
            artifact,
        } => {
            let mut lines = vec![format!(
                "{} {} \u{2192} {}",
                position(*index, *total),
                file_name(&artifact.source),
                artifact.path.display()
            )];
            lines.extend(artifact_details(artifact));
            lines
        }
        CompressEvent::Failed {
            index,
            total,
            source,
            error,
        } => vec![
            format!("{} {}: failed", position(*index, *total), file_name(source)),
            format!("{}{}", indent(1), error),
        ],
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-run summary.
pub fn format_batch_summary(result: &BatchResult) -> Vec<String> {
    let report = result.report();
    let total = result.outcomes.len();
    let noun = if total == 1 { "image" } else { "images" };

    let mut lines = vec![format!(
        "Compressed {} of {} {}: {} \u{2192} {}",
        report.compressed.len(),
        total,
        noun,
        format_size(report.source_bytes),
        format_size(report.written_bytes)
    )];
    let over = result.over_budget();
    if over > 0 {
        lines.push(format!("{}{} over budget", indent(1), over));
    }
    if !report.failed.is_empty() {
        lines.push(format!("{}{} failed", indent(1), report.failed.len()));
    }
    lines
}

/// Print the end-of-run summary to stdout.
pub fn print_batch_summary(result: &BatchResult) {
    for line in format_batch_summary(result) {
        println!("{}", line);
    }
}
