//! Destination path resolution for compressed artifacts.
//!
//! Output names follow one rule:
//!
//! - an explicit file name wins verbatim: `out` → `out.jpeg`
//! - otherwise the prefix is glued to the source stem: `pre_` + `photo.png` → `pre_photo.jpeg`
//!
//! Empty strings count as unset. The extension always comes from the output
//! format, never from the source file.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The destination directory could not be created.
#[derive(Error, Debug)]
#[error("cannot create destination directory {}: {source}", path.display())]
pub struct DirectoryCreationFailed {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// File name of `path` without its last extension (`archive.tar.gz` → `archive.tar`).
pub fn source_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Build the output file name from the naming rule above.
pub fn output_file_name(
    original_stem: &str,
    prefix: Option<&str>,
    explicit_name: Option<&str>,
    extension: &str,
) -> String {
    match non_empty(explicit_name) {
        Some(name) => format!("{name}.{extension}"),
        None => {
            let prefix = non_empty(prefix).unwrap_or("");
            format!("{prefix}{original_stem}.{extension}")
        }
    }
}

/// Create `dir` (and any missing parents) and return the full output path.
pub fn resolve_output_path(
    dir: &Path,
    original_stem: &str,
    prefix: Option<&str>,
    explicit_name: Option<&str>,
    extension: &str,
) -> Result<PathBuf, DirectoryCreationFailed> {
    std::fs::create_dir_all(dir).map_err(|source| DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(dir.join(output_file_name(
        original_stem,
        prefix,
        explicit_name,
        extension,
    )))
}
