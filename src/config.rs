//! Compression configuration.
//!
//! Handles defaults, validation, the fluent builder, and loading
//! `bytefit.toml` files. A config file is sparse: stock defaults are
//! serialized to TOML, the user's file is merged on top, and the result is
//! deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! max_width = 720.0         # Output must fit inside max_width x max_height
//! max_height = 960.0
//! max_size_kb = 100         # Byte budget, in KiB (1 KB = 1024 bytes)
//!
//! [encoding]
//! format = "jpeg"           # jpeg | png | webp
//! pixel_config = "argb8888" # argb8888 | argb4444 | rgb565
//! quality = 80              # Starting quality (0-100), lossy formats only
//!
//! [output]
//! directory = "..."         # Defaults to the user's Pictures directory
//! prefix = "small_"         # Prepended to the source file stem
//! file_name = "cover"       # Fixed output name (wins over prefix)
//!
//! [watermark]               # Omit the whole table for no watermark
//! text = "© me"
//! font = "/path/to/font.ttf"
//! size = 24.0
//! color = "#FFFFFFFF"       # #AARRGGBB or #RRGGBB
//! left = 0
//! top = 0
//!
//! [budget]
//! quality_step = 10
//! quality_floor = 5
//! reset_quality = 50
//! max_attempts = 64
//! min_edge_px = 16
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    BackendError, BudgetPolicy, EncodingSpec, OutputFormat, PixelConfig, Quality, Watermark,
    load_font, parse_argb,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything one compression call needs to know.
///
/// Immutable once built; share it by reference across calls and threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Maximum output width in pixels.
    pub max_width: f32,
    /// Maximum output height in pixels.
    pub max_height: f32,
    /// Byte budget in KiB.
    pub max_size_kb: u64,
    /// Codec, pixel layout, and starting quality.
    pub encoding: EncodingConfig,
    /// Where artifacts go and what they are called.
    pub output: OutputConfig,
    /// Optional text watermark.
    pub watermark: Option<WatermarkConfig>,
    /// Budget loop tuning.
    pub budget: BudgetPolicy,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_width: 720.0,
            max_height: 960.0,
            max_size_kb: 100,
            encoding: EncodingConfig::default(),
            output: OutputConfig::default(),
            watermark: None,
            budget: BudgetPolicy::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl CompressionConfig {
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder::default()
    }

    /// Byte budget: `max_size_kb * 1024`.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_kb.saturating_mul(1024)
    }

    pub fn encoding_spec(&self) -> EncodingSpec {
        EncodingSpec {
            format: self.encoding.format,
            pixel_config: self.encoding.pixel_config,
            quality: Quality::new(self.encoding.quality),
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_width.is_finite() && self.max_width > 0.0) {
            return Err(ConfigError::Validation(
                "max_width must be greater than 0".into(),
            ));
        }
        if !(self.max_height.is_finite() && self.max_height > 0.0) {
            return Err(ConfigError::Validation(
                "max_height must be greater than 0".into(),
            ));
        }
        if self.max_size_kb == 0 {
            return Err(ConfigError::Validation(
                "max_size_kb must be greater than 0".into(),
            ));
        }
        if self.encoding.quality > 100 {
            return Err(ConfigError::Validation(
                "encoding.quality must be 0-100".into(),
            ));
        }
        if self.budget.quality_step == 0 {
            return Err(ConfigError::Validation(
                "budget.quality_step must be greater than 0".into(),
            ));
        }
        if self.budget.quality_floor > 100 || self.budget.reset_quality > 100 {
            return Err(ConfigError::Validation(
                "budget.quality_floor and budget.reset_quality must be 0-100".into(),
            ));
        }
        if self.budget.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "budget.max_attempts must be greater than 0".into(),
            ));
        }
        if let Some(watermark) = &self.watermark {
            watermark.validate()?;
        }
        Ok(())
    }
}

/// Codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    pub format: OutputFormat,
    pub pixel_config: PixelConfig,
    /// Starting quality (0 = worst, 100 = best). Ignored by PNG.
    pub quality: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pixel_config: PixelConfig::default(),
            quality: Quality::default().value(),
        }
    }
}

/// Destination directory and naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory artifacts are written to; created if missing.
    pub directory: PathBuf,
    /// Prepended to the source file stem when `file_name` is unset.
    pub prefix: Option<String>,
    /// Fixed output name without extension.
    pub file_name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_destination_dir(),
            prefix: None,
            file_name: None,
        }
    }
}

/// The user's Pictures directory, or `./compressed` where the platform has none.
pub fn default_destination_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.picture_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("compressed"))
}

/// Watermark settings as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatermarkConfig {
    pub text: String,
    /// TrueType/OpenType font file used to render `text`.
    pub font: PathBuf,
    #[serde(default = "default_watermark_size")]
    pub size: f32,
    /// `#AARRGGBB` or `#RRGGBB`.
    #[serde(default = "default_watermark_color")]
    pub color: String,
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub top: i32,
}

fn default_watermark_size() -> f32 {
    24.0
}

fn default_watermark_color() -> String {
    "#FFFFFFFF".to_string()
}

impl WatermarkConfig {
    pub fn new(text: impl Into<String>, font: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            font: font.into(),
            size: default_watermark_size(),
            color: default_watermark_color(),
            left: 0,
            top: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(ConfigError::Validation(
                "watermark.size must be greater than 0".into(),
            ));
        }
        if parse_argb(&self.color).is_none() {
            return Err(ConfigError::Validation(format!(
                "watermark.color '{}' is not #AARRGGBB or #RRGGBB",
                self.color
            )));
        }
        Ok(())
    }

    /// Load the font and build a ready-to-draw [`Watermark`].
    pub fn load(&self) -> Result<Watermark, BackendError> {
        let font = load_font(&self.font)?;
        let color = parse_argb(&self.color).ok_or_else(|| {
            BackendError::Font(format!("invalid watermark color '{}'", self.color))
        })?;
        Ok(Watermark::new(self.text.clone(), font)
            .with_size(self.size)
            .with_color(color)
            .with_offset(self.left, self.top))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent construction of a [`CompressionConfig`], validated on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct CompressionConfigBuilder {
    config: CompressionConfig,
}

impl CompressionConfigBuilder {
    pub fn max_width(mut self, max_width: f32) -> Self {
        self.config.max_width = max_width;
        self
    }

    pub fn max_height(mut self, max_height: f32) -> Self {
        self.config.max_height = max_height;
        self
    }

    pub fn max_size_kb(mut self, max_size_kb: u64) -> Self {
        self.config.max_size_kb = max_size_kb;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.encoding.format = format;
        self
    }

    pub fn pixel_config(mut self, pixel_config: PixelConfig) -> Self {
        self.config.encoding.pixel_config = pixel_config;
        self
    }

    pub fn quality(mut self, quality: u32) -> Self {
        self.config.encoding.quality = quality;
        self
    }

    pub fn destination_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output.directory = dir.into();
        self
    }

    pub fn file_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output.prefix = Some(prefix.into());
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.output.file_name = Some(name.into());
        self
    }

    pub fn watermark(mut self, watermark: WatermarkConfig) -> Self {
        self.config.watermark = Some(watermark);
        self
    }

    pub fn budget(mut self, budget: BudgetPolicy) -> Self {
        self.config.budget = budget;
        self
    }

    pub fn max_processes(mut self, max_processes: usize) -> Self {
        self.config.processing.max_processes = Some(max_processes);
        self
    }

    pub fn build(self) -> Result<CompressionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top. Fails when the platform's
/// default destination is not valid UTF-8.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    config_value(&CompressionConfig::default())
}

fn config_value(config: &CompressionConfig) -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(config)?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CompressionConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CompressionConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the TOML file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<CompressionConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `bytefit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# bytefit Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# The output must fit inside max_width x max_height pixels. Images that
# already fit are never upscaled.
max_width = 720.0
max_height = 960.0

# Byte budget for each output file, in KiB (1 KB = 1024 bytes).
# Quality is lowered, then the image is halved, until the file fits.
max_size_kb = 100

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Output codec: "jpeg", "png" (lossless) or "webp".
format = "jpeg"

# Pixel layout before encoding: "argb8888", "argb4444" or "rgb565".
pixel_config = "argb8888"

# Starting quality (0 = worst, 100 = best). PNG ignores it.
quality = 80

# ---------------------------------------------------------------------------
# Output naming
# ---------------------------------------------------------------------------
[output]
# Destination directory, created if missing.
# Omit to use your Pictures directory.
# directory = "compressed"

# Prepended to the source file name: photo.png -> small_photo.jpeg
# prefix = "small_"

# Fixed output name without extension (wins over prefix).
# file_name = "cover"

# ---------------------------------------------------------------------------
# Watermark (uncomment the table to enable)
# ---------------------------------------------------------------------------
# [watermark]
# text = "example.com"
# font = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
# size = 24.0
# color = "#FFFFFFFF"    # #AARRGGBB or #RRGGBB
# left = 0
# top = 0

# ---------------------------------------------------------------------------
# Budget loop tuning
# ---------------------------------------------------------------------------
[budget]
# Quality drop per attempt, and the lowest quality tried before downscaling.
quality_step = 10
quality_floor = 5

# Quality to restart from after each halving (never above encoding.quality).
reset_quality = 50

# Hard cap on encode attempts per image.
max_attempts = 64

# Stop halving once the short edge would drop below this many pixels.
min_edge_px = 16

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
