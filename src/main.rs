use bytefit::batch;
use bytefit::compress::Compressor;
use bytefit::config::{self, CompressionConfig, WatermarkConfig};
use bytefit::imaging::{OutputFormat, PixelConfig};
use bytefit::output;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bytefit")]
#[command(version)]
#[command(about = "Shrink images until they fit a byte budget")]
#[command(long_about = "\
Shrink images until they fit a byte budget

Each image is scaled to fit inside max-width x max-height (never upscaled),
optionally watermarked, then re-encoded. If the file is still too big the
quality is lowered step by step, then the image is halved and the search
starts again, until the file fits or it cannot get any smaller.

Settings come from stock defaults, then the config file, then flags.
Run 'bytefit gen-config' to generate a documented bytefit.toml.

Set RUST_LOG=debug to see every encode attempt.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress image files or directories of images
    Compress(CompressArgs),
    /// Print a stock bytefit.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct CompressArgs {
    /// Image files or directories (searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Config file
    #[arg(long, default_value = "bytefit.toml")]
    config: PathBuf,

    /// Maximum output width in pixels
    #[arg(long)]
    max_width: Option<f32>,

    /// Maximum output height in pixels
    #[arg(long)]
    max_height: Option<f32>,

    /// Byte budget per file, in KiB
    #[arg(long)]
    max_size_kb: Option<u64>,

    /// Output format: jpeg, png, webp
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Pixel layout: argb8888, argb4444, rgb565
    #[arg(long)]
    pixel_config: Option<PixelConfig>,

    /// Starting quality (0-100)
    #[arg(long)]
    quality: Option<u32>,

    /// Destination directory
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Prefix for output file names
    #[arg(long)]
    prefix: Option<String>,

    /// Fixed output file name, without extension (single input only)
    #[arg(long)]
    name: Option<String>,

    #[command(flatten)]
    watermark: WatermarkArgs,

    /// Exit with an error if any file could not reach the budget
    #[arg(long)]
    strict: bool,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Maximum parallel workers (default: all cores)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(clap::Args)]
struct WatermarkArgs {
    /// Watermark text
    #[arg(long = "watermark-text")]
    text: Option<String>,

    /// TrueType/OpenType font for the watermark
    #[arg(long = "watermark-font")]
    font: Option<PathBuf>,

    /// Watermark text size in pixels
    #[arg(long = "watermark-size")]
    size: Option<f32>,

    /// Watermark colour, #AARRGGBB or #RRGGBB
    #[arg(long = "watermark-color")]
    color: Option<String>,

    /// Watermark offset from the left edge
    #[arg(long = "watermark-left", allow_hyphen_values = true)]
    left: Option<i32>,

    /// Watermark offset from the top edge
    #[arg(long = "watermark-top", allow_hyphen_values = true)]
    top: Option<i32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Compress(args) => {
            let config = resolve_compress_config(&args)?;
            init_thread_pool(&config.processing);

            let inputs = batch::collect_inputs(&args.inputs)?;
            if inputs.is_empty() {
                return Err("no images found in the given inputs".into());
            }

            let compressor = Compressor::new(config)?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_compress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = batch::compress_batch(&compressor, &inputs, Some(tx));
            printer.join().ok();
            let result = result?;

            output::print_batch_summary(&result);
            if let Some(report_path) = &args.report {
                let json = serde_json::to_string_pretty(&result.report())?;
                std::fs::write(report_path, json)?;
            }
            if !result.is_success(args.strict) {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Config file (if present) with command-line flags applied on top.
fn resolve_compress_config(
    args: &CompressArgs,
) -> Result<CompressionConfig, config::ConfigError> {
    let mut config = config::load_config(&args.config)?;

    if let Some(v) = args.max_width {
        config.max_width = v;
    }
    if let Some(v) = args.max_height {
        config.max_height = v;
    }
    if let Some(v) = args.max_size_kb {
        config.max_size_kb = v;
    }
    if let Some(v) = args.format {
        config.encoding.format = v;
    }
    if let Some(v) = args.pixel_config {
        config.encoding.pixel_config = v;
    }
    if let Some(v) = args.quality {
        config.encoding.quality = v;
    }
    if let Some(v) = &args.dest {
        config.output.directory = v.clone();
    }
    if let Some(v) = &args.prefix {
        config.output.prefix = Some(v.clone());
    }
    if let Some(v) = &args.name {
        config.output.file_name = Some(v.clone());
    }
    if let Some(v) = args.threads {
        config.processing.max_processes = Some(v);
    }

    let mark = &args.watermark;
    if let Some(text) = &mark.text {
        match config.watermark.as_mut() {
            Some(watermark) => watermark.text = text.clone(),
            None => {
                let font = mark.font.clone().ok_or_else(|| {
                    config::ConfigError::Validation(
                        "--watermark-text needs --watermark-font".into(),
                    )
                })?;
                config.watermark = Some(WatermarkConfig::new(text.clone(), font));
            }
        }
    }
    if let Some(watermark) = config.watermark.as_mut() {
        if let Some(v) = &mark.font {
            watermark.font = v.clone();
        }
        if let Some(v) = mark.size {
            watermark.size = v;
        }
        if let Some(v) = &mark.color {
            watermark.color = v.clone();
        }
        if let Some(v) = mark.left {
            watermark.left = v;
        }
        if let Some(v) = mark.top {
            watermark.top = v;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
