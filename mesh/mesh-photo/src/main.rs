//! photo2mesh: reconstruct a textured mesh from a single photograph.
//!
//! Depth inference runs outside this tool; pass its output with `--depth`
//! as an 8-bit or 16-bit grayscale image.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mesh_depth::{DepthFileLoader, Device, FallbackEstimator};
use mesh_photo::{PipelineConfig, run_single_image_cancellable, run_with_timeout};

/// Single image to textured 3D mesh
#[derive(Parser)]
#[command(name = "photo2mesh")]
#[command(about = "Reconstruct a textured mesh (OBJ + MTL + PNG, GLB) from one photograph", long_about = None)]
#[command(version)]
struct Cli {
    /// Input image (png, jpg, jpeg or webp)
    #[arg(long)]
    input: PathBuf,

    /// Output directory, created if missing
    #[arg(long)]
    output: PathBuf,

    /// Precomputed depth image (8-bit or 16-bit grayscale)
    #[arg(long)]
    depth: PathBuf,

    /// Reconstruction mode
    #[arg(long, value_enum, default_value_t = Mode::SingleImage)]
    mode: Mode,

    /// Focal length in pixels (default: 1.2 x the longer image side)
    #[arg(long)]
    focal: Option<f64>,

    /// Inference device: cpu, gpu or gpu:N
    #[arg(long)]
    device: Option<Device>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// JSON configuration; command-line flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Finest Poisson depth
    #[arg(long)]
    poisson_depth: Option<u32>,

    /// Triangle budget for decimation
    #[arg(long)]
    max_triangles: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// One photograph, monocular depth
    #[value(alias = "single_image")]
    SingleImage,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let Mode::SingleImage = cli.mode;

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(focal) = cli.focal {
        config = config.with_focal(focal);
    }
    if let Some(device) = cli.device {
        config = config.with_device(device);
    }
    if let Some(depth) = cli.poisson_depth {
        config = config.with_poisson_depth(depth);
    }
    if let Some(max_triangles) = cli.max_triangles {
        config = config.with_max_triangles(max_triangles);
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    config.validate().context("invalid configuration")?;

    let timeout = Duration::from_secs(config.timeout_secs);
    let estimator = FallbackEstimator::new(DepthFileLoader::new(&cli.depth), config.device);
    let (input, output) = (cli.input, cli.output);
    let result = run_with_timeout(timeout, move |cancel| {
        run_single_image_cancellable(&input, &output, &config, &estimator, cancel)
    })
    .context("reconstruction failed")?;

    println!("{}", result.stats);
    println!("  obj:     {}", result.paths.obj.display());
    println!("  glb:     {}", result.paths.glb.display());
    println!("  texture: {}", result.paths.texture.display());
    println!("  stats:   {}", result.paths.stats.display());
    Ok(())
}
