//! Single-image compression.
//!
//! A [`Compressor`] owns a backend, an immutable [`CompressionConfig`], and
//! the watermark loaded from it (if any). One call runs the whole pipeline:
//!
//! ```text
//! source ──identify──▶ ──decode──▶ buffer ──scale_to_fit──▶ ──watermark?──▶ encode_within_budget ──▶ temp file ──rename──▶ artifact
//! ```
//!
//! Artifacts are written to a temporary file inside the destination directory
//! and renamed into place only once the whole encoding succeeded, so a failed
//! call never leaves a partial file behind.
//!
//! An unattainable budget is not an error here: the smallest encoding is
//! written and [`CompressedFile::outcome`] says so. Callers that need a hard
//! guarantee use [`CompressedFile::require_budget`].

use crate::config::{CompressionConfig, ConfigError};
use crate::imaging::{
    BackendError, BudgetOutcome, Dimensions, ImageBackend, Quality, RustBackend, Watermark,
    apply_watermark, encode_within_budget, get_dimensions, scale_to_fit,
};
use crate::naming::{self, DirectoryCreationFailed};
use image::DynamicImage;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    DirectoryCreationFailed(#[from] DirectoryCreationFailed),
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("{}: smallest encoding was {smallest} bytes, budget is {budget} bytes", path.display())]
    BudgetUnattainable {
        path: PathBuf,
        smallest: u64,
        budget: u64,
    },
    #[error("Two inputs would be written to {}", .0.display())]
    DuplicateDestination(PathBuf),
    #[error("Watermark error: {0}")]
    Watermark(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<BackendError> for CompressError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Io(e) => CompressError::Io(e),
            BackendError::InvalidImage(msg) => CompressError::InvalidImage(msg),
            BackendError::EncodingFailed(msg) => CompressError::EncodingFailed(msg),
            BackendError::Font(msg) => CompressError::Watermark(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;

/// An input file, checked to exist before any decoding happens.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSource {
    pub path: PathBuf,
    /// Size of the file on disk.
    pub byte_len: u64,
    /// File name without its extension, used for output naming.
    pub stem: String,
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .map_err(|e| CompressError::InvalidImage(format!("{}: {e}", path.display())))?;
        if !meta.is_file() {
            return Err(CompressError::InvalidImage(format!(
                "{}: not a regular file",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            byte_len: meta.len(),
            stem: naming::source_stem(path),
        })
    }
}

/// A written artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressedFile {
    pub source: PathBuf,
    pub path: PathBuf,
    pub source_bytes: u64,
    pub bytes_written: u64,
    pub budget_bytes: u64,
    pub dimensions: Dimensions,
    pub quality: Quality,
    pub attempts: u32,
    pub outcome: BudgetOutcome,
}

impl CompressedFile {
    pub fn budget_met(&self) -> bool {
        self.outcome == BudgetOutcome::Met
    }

    /// Turn an unmet budget into [`CompressError::BudgetUnattainable`].
    ///
    /// The artifact stays on disk either way.
    pub fn require_budget(self) -> Result<Self> {
        if self.budget_met() {
            return Ok(self);
        }
        Err(CompressError::BudgetUnattainable {
            path: self.path,
            smallest: self.bytes_written,
            budget: self.budget_bytes,
        })
    }
}

/// Compresses images according to one configuration.
///
/// Holds no mutable state, so a single value can be shared across threads.
pub struct Compressor<B: ImageBackend = RustBackend> {
    backend: B,
    config: CompressionConfig,
    watermark: Option<Watermark>,
}

impl Compressor<RustBackend> {
    /// Compressor on the pure-Rust backend.
    pub fn new(config: CompressionConfig) -> Result<Self> {
        Self::with_backend(RustBackend::new(), config)
    }
}

impl<B: ImageBackend> Compressor<B> {
    /// Validate `config`, load its watermark font, and bind both to `backend`.
    pub fn with_backend(backend: B, config: CompressionConfig) -> Result<Self> {
        config.validate()?;
        let watermark = config
            .watermark
            .as_ref()
            .map(|mark| mark.load())
            .transpose()?;
        Ok(Self {
            backend,
            config,
            watermark,
        })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Watermark loaded from the configuration.
    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }

    /// Where the artifact for `source` would be written. Touches nothing on disk.
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        let output = &self.config.output;
        self.config.output.directory.join(naming::output_file_name(
            &naming::source_stem(source),
            output.prefix.as_deref(),
            output.file_name.as_deref(),
            self.config.encoding.format.extension(),
        ))
    }

    /// Compress `source` with the configured watermark (if any).
    pub fn compress_to_file(&self, source: &Path) -> Result<CompressedFile> {
        self.compress_to_file_with_watermark(source, self.watermark.as_ref())
    }

    /// Compress `source`, stamping `watermark` instead of the configured one.
    ///
    /// `None` disables watermarking for this call.
    pub fn compress_to_file_with_watermark(
        &self,
        source: &Path,
        watermark: Option<&Watermark>,
    ) -> Result<CompressedFile> {
        let source = ImageSource::open(source)?;
        let output = &self.config.output;
        let spec = self.config.encoding_spec();
        let destination = naming::resolve_output_path(
            &output.directory,
            &source.stem,
            output.prefix.as_deref(),
            output.file_name.as_deref(),
            spec.format.extension(),
        )?;

        let image = self.prepare(&source.path, watermark)?;
        let budget = self.config.max_size_bytes();
        let encoded = encode_within_budget(
            &self.backend,
            image,
            &spec,
            budget,
            &self.config.budget,
        )?;

        write_atomically(&destination, &encoded.bytes)?;

        let artifact = CompressedFile {
            source: source.path,
            path: destination,
            source_bytes: source.byte_len,
            bytes_written: encoded.bytes.len() as u64,
            budget_bytes: budget,
            dimensions: encoded.dimensions,
            quality: encoded.quality,
            attempts: encoded.attempts,
            outcome: encoded.outcome,
        };
        log::info!(
            "{} → {} ({} bytes, {}, q{}, {} attempts)",
            artifact.source.display(),
            artifact.path.display(),
            artifact.bytes_written,
            artifact.dimensions,
            artifact.quality.value(),
            artifact.attempts
        );
        Ok(artifact)
    }

    /// Decode and scale `source` without encoding or writing.
    ///
    /// The configured watermark is not applied: the result is the plain
    /// scaled bitmap, before any stamping or re-encoding.
    pub fn compress_to_image(&self, source: &Path) -> Result<DynamicImage> {
        let source = ImageSource::open(source)?;
        self.prepare(&source.path, None)
    }

    fn prepare(&self, path: &Path, watermark: Option<&Watermark>) -> Result<DynamicImage> {
        // Header check first so empty or unreadable images never reach the decoder.
        get_dimensions(&self.backend, path)?;
        let decoded = self.backend.decode(path)?;
        let scaled = scale_to_fit(
            &self.backend,
            decoded,
            self.config.max_width,
            self.config.max_height,
        )?;
        Ok(match watermark {
            Some(mark) => apply_watermark(&scaled, mark),
            None => scaled,
        })
    }
}

/// Write `bytes` to a temp file next to `destination`, then rename it into place.
fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<()> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{BudgetPolicy, OutputFormat};
    use tempfile::TempDir;

    /// A file on disk for `ImageSource::open`; the mock never reads it.
    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"fake image").unwrap();
        path
    }

    fn config_into(dest: &Path) -> CompressionConfig {
        CompressionConfig::builder()
            .destination_dir(dest)
            .build()
            .unwrap()
    }

    fn mock_compressor(dims: (u32, u32), config: CompressionConfig) -> Compressor<MockBackend> {
        let backend = MockBackend::with_dimensions(vec![Dimensions::from(dims)]);
        Compressor::with_backend(backend, config).unwrap()
    }

    // =========================================================================
    // Pipeline with the mock backend
    // =========================================================================

    #[test]
    fn small_image_takes_fast_path() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let dest = tmp.path().join("out");
        let compressor = mock_compressor((100, 100), config_into(&dest));

        let artifact = compressor.compress_to_file(&source).unwrap();

        assert_eq!(artifact.path, dest.join("photo.jpeg"));
        assert_eq!(artifact.bytes_written, 42_564);
        assert_eq!(artifact.quality.value(), 80);
        assert_eq!(artifact.attempts, 1);
        assert!(artifact.budget_met());
        assert_eq!(std::fs::metadata(&artifact.path).unwrap().len(), 42_564);

        let ops = compressor.backend().get_operations();
        assert!(matches!(&ops[0], RecordedOp::Identify(_)));
        assert!(matches!(&ops[1], RecordedOp::Decode(_)));
        assert!(!ops.iter().any(|op| matches!(op, RecordedOp::Resize { .. })));
    }

    #[test]
    fn large_image_is_scaled_then_halved_to_fit() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "big.jpg");
        let compressor = mock_compressor((4000, 3000), config_into(tmp.path()));

        let artifact = compressor.compress_to_file(&source).unwrap();

        let ops = compressor.backend().get_operations();
        assert!(ops.contains(&RecordedOp::Resize {
            width: 720,
            height: 540
        }));
        assert_eq!(artifact.dimensions, Dimensions::new(360, 270));
        assert_eq!(artifact.quality.value(), 10);
        assert_eq!(artifact.attempts, 14);
        assert!(artifact.bytes_written <= artifact.budget_bytes);
    }

    #[test]
    fn unattainable_budget_still_writes_smallest() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let config = CompressionConfig::builder()
            .destination_dir(tmp.path())
            .max_size_kb(1)
            .budget(BudgetPolicy {
                min_edge_px: 64,
                ..BudgetPolicy::default()
            })
            .build()
            .unwrap();
        let compressor = mock_compressor((100, 100), config);

        let artifact = compressor.compress_to_file(&source).unwrap();

        assert_eq!(artifact.outcome, BudgetOutcome::Unattainable);
        assert_eq!(artifact.quality.value(), 5);
        assert_eq!(artifact.bytes_written, 5_064);
        assert!(artifact.path.exists());

        match artifact.require_budget() {
            Err(CompressError::BudgetUnattainable {
                smallest, budget, ..
            }) => {
                assert_eq!(smallest, 5_064);
                assert_eq!(budget, 1024);
            }
            other => panic!("expected BudgetUnattainable, got {other:?}"),
        }
    }

    #[test]
    fn encoder_failure_leaves_no_artifact() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let dest = tmp.path().join("out");
        let backend = MockBackend {
            fail_encode: true,
            ..MockBackend::with_dimensions(vec![Dimensions::new(50, 50)])
        };
        let compressor = Compressor::with_backend(backend, config_into(&dest)).unwrap();

        let result = compressor.compress_to_file(&source);

        assert!(matches!(result, Err(CompressError::EncodingFailed(_))));
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn missing_source_is_invalid_image() {
        let tmp = TempDir::new().unwrap();
        let compressor = mock_compressor((10, 10), config_into(tmp.path()));
        let result = compressor.compress_to_file(&tmp.path().join("nope.jpg"));
        assert!(matches!(result, Err(CompressError::InvalidImage(_))));
        assert!(compressor.backend().get_operations().is_empty());
    }

    #[test]
    fn directory_source_is_invalid_image() {
        let tmp = TempDir::new().unwrap();
        let compressor = mock_compressor((10, 10), config_into(tmp.path()));
        let result = compressor.compress_to_file(tmp.path());
        assert!(matches!(result, Err(CompressError::InvalidImage(_))));
    }

    #[test]
    fn blocked_destination_is_directory_creation_failure() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let blocker = touch(tmp.path(), "blocker");
        let compressor = mock_compressor((10, 10), config_into(&blocker.join("sub")));

        let result = compressor.compress_to_file(&source);
        assert!(matches!(
            result,
            Err(CompressError::DirectoryCreationFailed(_))
        ));
    }

    #[test]
    fn explicit_name_wins_over_prefix() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let config = CompressionConfig::builder()
            .destination_dir(tmp.path().join("out"))
            .file_name_prefix("pre_")
            .file_name("out")
            .build()
            .unwrap();
        let compressor = mock_compressor((10, 10), config);

        let artifact = compressor.compress_to_file(&source).unwrap();
        assert_eq!(artifact.path.file_name().unwrap(), "out.jpeg");
    }

    #[test]
    fn prefix_and_format_shape_the_name() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "photo.png");
        let config = CompressionConfig::builder()
            .destination_dir(tmp.path().join("out"))
            .file_name_prefix("pre_")
            .format(OutputFormat::Webp)
            .build()
            .unwrap();
        let compressor = mock_compressor((10, 10), config);

        assert_eq!(
            compressor.destination_for(&source),
            tmp.path().join("out/pre_photo.webp")
        );
        let artifact = compressor.compress_to_file(&source).unwrap();
        assert_eq!(artifact.path, tmp.path().join("out/pre_photo.webp"));
    }

    #[test]
    fn compress_to_image_scales_without_writing() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "big.jpg");
        let dest = tmp.path().join("never-created");
        let compressor = mock_compressor((4000, 3000), config_into(&dest));

        let image = compressor.compress_to_image(&source).unwrap();

        assert_eq!(Dimensions::of(&image), Dimensions::new(720, 540));
        assert!(!dest.exists());
        assert!(
            !compressor
                .backend()
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Encode { .. }))
        );
    }

    #[test]
    fn zero_area_source_is_rejected_before_decode() {
        let tmp = TempDir::new().unwrap();
        let source = touch(tmp.path(), "empty.png");
        let dest = tmp.path().join("out");
        let compressor = mock_compressor((0, 50), config_into(&dest));

        let result = compressor.compress_to_file(&source);

        assert!(matches!(result, Err(CompressError::InvalidImage(_))));
        let ops = compressor.backend().get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(_)));
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
        assert!(matches!(
            compressor.compress_to_image(&source),
            Err(CompressError::InvalidImage(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = CompressionConfig::default();
        config.max_size_kb = 0;
        let result = Compressor::with_backend(MockBackend::new(), config);
        assert!(matches!(
            result,
            Err(CompressError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn unloadable_watermark_font_is_reported() {
        let tmp = TempDir::new().unwrap();
        let bogus = touch(tmp.path(), "bogus.ttf");
        let mut config = config_into(tmp.path());
        config.watermark = Some(crate::config::WatermarkConfig::new("hi", bogus));
        let result = Compressor::with_backend(MockBackend::new(), config);
        assert!(matches!(result, Err(CompressError::Watermark(_))));
    }

    #[test]
    fn write_atomically_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let dest = touch(tmp.path(), "out.jpeg");
        write_atomically(&dest, b"new bytes").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new bytes");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    // =========================================================================
    // Real backend
    // =========================================================================

    fn write_noisy_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503));
            image::Rgb([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn real_backend_meets_budget_and_box() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("noise.png");
        write_noisy_png(&source, 1200, 900);
        let config = CompressionConfig::builder()
            .destination_dir(tmp.path().join("out"))
            .max_size_kb(60)
            .build()
            .unwrap();
        let compressor = Compressor::new(config).unwrap();

        let artifact = compressor.compress_to_file(&source).unwrap();

        assert!(artifact.budget_met());
        assert!(artifact.bytes_written <= 60 * 1024);
        let written = image::open(&artifact.path).unwrap();
        assert!(written.width() <= 720 && written.height() <= 960);
        assert_eq!(Dimensions::of(&written), artifact.dimensions);
    }

    #[test]
    fn real_backend_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("noise.png");
        write_noisy_png(&source, 300, 200);

        let run = |name: &str| {
            let config = CompressionConfig::builder()
                .destination_dir(tmp.path())
                .file_name(name)
                .max_size_kb(8)
                .build()
                .unwrap();
            let artifact = Compressor::new(config)
                .unwrap()
                .compress_to_file(&source)
                .unwrap();
            std::fs::read(artifact.path).unwrap()
        };
        assert_eq!(run("a"), run("b"));
    }

    #[test]
    fn real_backend_watermark_changes_pixels() {
        let Some(font) = crate::imaging::watermark::tests::system_font() else {
            eprintln!("skipping: no system font found");
            return;
        };
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("plain.png");
        image::RgbImage::from_pixel(200, 100, image::Rgb([0, 0, 0]))
            .save(&source)
            .unwrap();
        let compressor = Compressor::new(config_into(tmp.path())).unwrap();
        let mark = Watermark::new("MARK", font)
            .with_size(40.0)
            .with_color(0xFFFF_FFFF)
            .with_offset(5, 5);

        let plain = compressor.compress_to_image(&source).unwrap().to_rgb8();
        let artifact = compressor
            .compress_to_file_with_watermark(&source, Some(&mark))
            .unwrap();
        let stamped = image::open(&artifact.path).unwrap().to_rgb8();

        assert!(plain.pixels().all(|p| p.0 == [0, 0, 0]));
        assert!(stamped.pixels().any(|p| p.0[0] > 128));
    }

    #[test]
    fn compress_to_image_ignores_configured_watermark() {
        let Some(font_path) = crate::imaging::watermark::tests::system_font_path() else {
            eprintln!("skipping: no system font found");
            return;
        };
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("plain.png");
        image::RgbImage::from_pixel(200, 100, image::Rgb([0, 0, 0]))
            .save(&source)
            .unwrap();
        let mut mark = crate::config::WatermarkConfig::new("MARK", font_path);
        mark.size = 40.0;
        let config = CompressionConfig::builder()
            .destination_dir(tmp.path().join("out"))
            .format(OutputFormat::Png)
            .watermark(mark)
            .build()
            .unwrap();
        let compressor = Compressor::new(config).unwrap();
        assert!(compressor.watermark().is_some());

        let preview = compressor.compress_to_image(&source).unwrap().to_rgb8();
        let artifact = compressor.compress_to_file(&source).unwrap();
        let stamped = image::open(&artifact.path).unwrap().to_rgb8();

        assert!(preview.pixels().all(|p| p.0 == [0, 0, 0]));
        assert!(stamped.pixels().any(|p| p.0[0] > 128));
    }
}
