//! Compressing many images at once.
//!
//! Each input is an independent [`Compressor`] call run on rayon's global
//! pool. Before any work starts the destinations are resolved and checked:
//! two inputs that would land on the same path (for example several inputs
//! with one fixed `file_name`) abort the batch with
//! [`CompressError::DuplicateDestination`].
//!
//! Progress is streamed as [`CompressEvent`]s over an optional channel so the
//! CLI can print while workers are still busy. Results come back in input
//! order regardless of completion order.

use crate::compress::{CompressError, CompressedFile, Compressor};
use crate::imaging::{ImageBackend, is_supported_input};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use walkdir::WalkDir;

/// Progress of one input, sent as soon as it finishes.
#[derive(Debug, Clone)]
pub enum CompressEvent {
    Compressed {
        /// 1-based position in the input list.
        index: usize,
        total: usize,
        artifact: CompressedFile,
    },
    Failed {
        index: usize,
        total: usize,
        source: PathBuf,
        error: String,
    },
}

/// Outcome of one input.
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub result: Result<CompressedFile, CompressError>,
}

/// All outcomes, in input order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchResult {
    pub fn artifacts(&self) -> impl Iterator<Item = &CompressedFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &CompressError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source.as_path(), e)))
    }

    /// Artifacts written even though the budget was not reached.
    pub fn over_budget(&self) -> usize {
        self.artifacts().filter(|a| !a.budget_met()).count()
    }

    /// No failures, and with `strict` no missed budgets either.
    pub fn is_success(&self, strict: bool) -> bool {
        self.failures().next().is_none() && !(strict && self.over_budget() > 0)
    }

    pub fn report(&self) -> BatchReport {
        let compressed: Vec<CompressedFile> = self.artifacts().cloned().collect();
        let failed = self
            .failures()
            .map(|(source, error)| FailedSource {
                source: source.to_path_buf(),
                error: error.to_string(),
            })
            .collect();
        BatchReport {
            source_bytes: compressed.iter().map(|a| a.source_bytes).sum(),
            written_bytes: compressed.iter().map(|a| a.bytes_written).sum(),
            compressed,
            failed,
        }
    }
}

/// Serializable summary written by `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub compressed: Vec<CompressedFile>,
    pub failed: Vec<FailedSource>,
    /// Total size of the successfully compressed inputs.
    pub source_bytes: u64,
    pub written_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSource {
    pub source: PathBuf,
    pub error: String,
}

/// Expand `paths` into a list of image files.
///
/// Files are taken as given. Directories are walked recursively, keeping
/// files with a supported image extension, sorted by path.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CompressError> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && is_supported_input(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        inputs.extend(found);
    }
    Ok(inputs)
}

/// Fail if two sources resolve to the same destination.
pub fn check_destinations<B: ImageBackend>(
    compressor: &Compressor<B>,
    sources: &[PathBuf],
) -> Result<(), CompressError> {
    let mut seen: HashMap<PathBuf, &Path> = HashMap::new();
    for source in sources {
        let destination = compressor.destination_for(source);
        if seen.insert(destination.clone(), source).is_some() {
            return Err(CompressError::DuplicateDestination(destination));
        }
    }
    Ok(())
}

/// Compress every source in parallel.
///
/// Individual failures are collected, not propagated; only the up-front
/// destination check can fail the whole batch.
pub fn compress_batch<B: ImageBackend>(
    compressor: &Compressor<B>,
    sources: &[PathBuf],
    events: Option<Sender<CompressEvent>>,
) -> Result<BatchResult, CompressError> {
    check_destinations(compressor, sources)?;
    let total = sources.len();

    let outcomes = sources
        .par_iter()
        .enumerate()
        .map_with(events, |events, (i, source)| {
            let result = compressor.compress_to_file(source);
            if let Err(e) = &result {
                log::debug!("{}: {e}", source.display());
            }
            if let Some(tx) = events {
                let event = match &result {
                    Ok(artifact) => CompressEvent::Compressed {
                        index: i + 1,
                        total,
                        artifact: artifact.clone(),
                    },
                    Err(e) => CompressEvent::Failed {
                        index: i + 1,
                        total,
                        source: source.clone(),
                        error: e.to_string(),
                    },
                };
                // Receiver gone means nobody is listening; keep working.
                tx.send(event).ok();
            }
            BatchOutcome {
                source: source.clone(),
                result,
            }
        })
        .collect();

    Ok(BatchResult { outcomes })
}
