mod video;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::debug;
use msssim::{ms_ssim_with_config, Arithmetic, MsssimConfig, PlaneRef, WeightMode};

/// Multi-scale structural similarity between a source and a distorted input
#[derive(Parser, Debug)]
#[command(name = "msssim_rs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the luma of two still images
    Image {
        /// Source image
        source: PathBuf,
        /// Distorted image
        distorted: PathBuf,
        #[command(flatten)]
        metric: MetricArgs,
    },
    /// Compare two raw YUV 4:2:0 (I420) files frame by frame
    Video(video::VideoArgs),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct MetricArgs {
    /// Number of pyramid scales; values outside 1-5 mean 5
    #[arg(long, default_value_t = 5)]
    scales: usize,

    /// Rescale the weights of the evaluated scales to sum to one
    #[arg(long)]
    normalize_weights: bool,

    /// Use double precision instead of 32-bit integer window arithmetic
    #[arg(long)]
    float: bool,
}

impl MetricArgs {
    pub fn config(self) -> MsssimConfig {
        MsssimConfig {
            scales: self.scales,
            weights: if self.normalize_weights {
                WeightMode::Normalized
            } else {
                WeightMode::Fixed
            },
            arithmetic: if self.float {
                Arithmetic::Float
            } else {
                Arithmetic::Fixed
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Image {
            source,
            distorted,
            metric,
        } => compare_images(&source, &distorted, metric),
        Commands::Video(args) => video::compare_videos(&args),
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn compare_images(source: &Path, distorted: &Path, metric: MetricArgs) -> Result<()> {
    let source = image::open(source)
        .with_context(|| format!("Failed to open source image {}", source.display()))?
        .to_luma8();
    let distorted = image::open(distorted)
        .with_context(|| format!("Failed to open distorted image {}", distorted.display()))?
        .to_luma8();

    if source.dimensions() != distorted.dimensions() {
        bail!(
            "Source and distorted image width and height must be equal, got {:?} and {:?}",
            source.dimensions(),
            distorted.dimensions()
        );
    }

    let (width, height) = (source.width() as usize, source.height() as usize);
    debug!("comparing {}x{} luma planes", width, height);
    let score = ms_ssim_with_config(
        &PlaneRef::packed(source.as_raw(), width, height)?,
        &PlaneRef::packed(distorted.as_raw(), width, height)?,
        &metric.config(),
    )?;
    println!("{:.8}", score);

    Ok(())
}
