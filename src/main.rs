use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use adaptive_pdf_compressor::backend::{GhostscriptRasterizer, LopdfEngine, LopdfSource};
use adaptive_pdf_compressor::{
    AdaptiveConfig, CompressRequest, CompressionLevel, CompressionResult, Compressor, Policy,
    SafetyVerdict, Tuning,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Level {
    Extreme,
    Recommended,
    Less,
}

impl From<Level> for CompressionLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Extreme => CompressionLevel::Extreme,
            Level::Recommended => CompressionLevel::Recommended,
            Level::Less => CompressionLevel::Less,
        }
    }
}

/// Adaptive PDF compressor: re-renders every page as a JPEG at a
/// content-aware resolution and never returns a larger file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input PDF file
    input: PathBuf,

    /// Output PDF file (not needed with --estimate)
    output: Option<PathBuf>,

    /// Compression preset
    #[arg(long, value_enum, default_value_t = Level::Recommended)]
    level: Level,

    /// Fine-grained setting from 0 (smallest) to 100 (sharpest); used as a
    /// custom config that is never escalated
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    slider: Option<u8>,

    /// Allow settings below the legibility floor
    #[arg(long)]
    override_safety: bool,

    /// Only print size estimates, do not compress
    #[arg(long)]
    estimate: bool,

    /// Write a page 1 before/after preview pair into this directory
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Ghostscript executable used for rasterizing pages
    #[arg(long)]
    gs: Option<String>,

    /// Minimum projected DPI allowed without --override-safety
    #[arg(long)]
    dpi_floor: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut policy = Policy::default();
    if let Some(floor) = args.dpi_floor {
        policy.dpi_floor = floor;
    }
    let rasterizer = match &args.gs {
        Some(program) => GhostscriptRasterizer::new(program.clone()),
        None => GhostscriptRasterizer::default(),
    };

    println!("Loading PDF: {:?}", args.input);
    let start = Instant::now();
    let bytes = std::fs::read(&args.input).context("Failed to read input")?;
    let doc = LopdfSource::load(bytes)?.with_rasterizer(rasterizer);
    println!("Loaded in {:.2?}", start.elapsed());

    let compressor = Compressor::new(LopdfEngine).with_policy(policy);
    let level = CompressionLevel::from(args.level);
    let profile = compressor.analyze_content(&doc);
    println!(
        "Content: {} pages, {}",
        profile.page_count,
        if profile.is_text_heavy {
            "text-heavy"
        } else {
            "image-heavy"
        }
    );

    let custom = args.slider.map(|value| {
        compressor.resolve_config(Tuning::Slider(value as f64), profile.is_text_heavy)
    });
    let config =
        custom.unwrap_or_else(|| compressor.resolve_config(Tuning::Level(level), profile.is_text_heavy));
    print_config(&config);

    if args.estimate || args.preview_dir.is_some() {
        estimate(&compressor, &doc, &args, level, profile.is_text_heavy, &config)?;
        if args.estimate {
            return Ok(());
        }
    }

    let output = match &args.output {
        Some(path) => path,
        None => bail!("An output path is required unless --estimate is given"),
    };

    let mut request = CompressRequest::new(level)
        .override_safety(args.override_safety)
        .content_profile(profile);
    if let Some(config) = custom {
        request = request.custom_config(config);
    }

    let start = Instant::now();
    let result = compressor.compress(&doc, &request, |progress| {
        print!("\rProgress: {:>3.0}%", progress * 100.0);
        let _ = std::io::stdout().flush();
    });
    println!();

    match result {
        CompressionResult::Success { data, meta } => {
            std::fs::write(output, &data).context("Failed to save PDF")?;
            println!("Finished in {:.2?} ({} passes)", start.elapsed(), meta.iterations);
            println!("Strategy:      {}", meta.strategy);
            println!(
                "Original size: {:.2} MB",
                meta.original_size as f64 / 1_048_576.0
            );
            println!(
                "New size:      {:.2} MB ({:.1}% reduction)",
                meta.compressed_size as f64 / 1_048_576.0,
                meta.reduction_percent()
            );
            Ok(())
        }
        CompressionResult::Blocked {
            projected_dpi,
            floor_dpi,
            ..
        } => bail!(
            "Refusing to compress: {} DPI is below the {} DPI legibility floor (use --override-safety)",
            projected_dpi,
            floor_dpi
        ),
        CompressionResult::Error { error, .. } => Err(error).context("Compression failed"),
    }
}

fn print_config(config: &AdaptiveConfig) {
    println!(
        "Config: scale {:.3}, quality {}, {} DPI",
        config.scale(),
        config.jpeg_quality(),
        config.projected_dpi()
    );
}

fn estimate(
    compressor: &Compressor<LopdfEngine>,
    doc: &LopdfSource,
    args: &Args,
    level: CompressionLevel,
    is_text_heavy: bool,
    config: &AdaptiveConfig,
) -> Result<()> {
    use adaptive_pdf_compressor::SourceDocument;

    if let SafetyVerdict::Blocked {
        projected_dpi,
        floor_dpi,
    } = compressor.check_safety(config, args.override_safety)
    {
        println!(
            "Warning: {} DPI is below the {} DPI floor; compression would be blocked",
            projected_dpi, floor_dpi
        );
    }

    let original = doc.original_size();
    let table = compressor.estimate_target_size(original, level, is_text_heavy);
    println!(
        "Table estimate ({}): {:.2} MB of {:.2} MB",
        level,
        table as f64 / 1_048_576.0,
        original as f64 / 1_048_576.0
    );

    let preview = compressor.preview_pair(doc, config)?;
    println!(
        "Preview estimate: {:.2} MB ({} bytes/page, {:.1}% reduction)",
        preview.metrics.estimated_total_size as f64 / 1_048_576.0,
        preview.metrics.per_page_bytes,
        preview.metrics.estimated_reduction
    );

    if let Some(dir) = &args.preview_dir {
        std::fs::create_dir_all(dir).context("Failed to create preview directory")?;
        let original_path = dir.join("preview-original.png");
        let compressed_path = dir.join("preview-compressed.jpg");
        preview
            .original
            .save(&original_path)
            .with_context(|| format!("Failed to save {:?}", original_path))?;
        preview
            .compressed
            .to_rgb8()
            .save(&compressed_path)
            .with_context(|| format!("Failed to save {:?}", compressed_path))?;
        println!("Preview written to {:?}", dir);
    }
    Ok(())
}
