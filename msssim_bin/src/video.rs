use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use msssim::{compute_frame_msssim, Frame, FrameScore, MsssimConfig, StreamSummary};
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};

use crate::MetricArgs;

#[derive(Args, Debug)]
pub struct VideoArgs {
    /// Source I420 file
    source: PathBuf,

    /// Distorted I420 file
    distorted: PathBuf,

    /// Frame size, e.g. 1920x1080
    #[arg(value_parser = parse_size)]
    size: (usize, usize),

    /// Bytes to skip before the first frame; positive values skip into the
    /// source, negative values into the distorted file
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    seek: i64,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<usize>,

    /// Number of frames evaluated in parallel
    #[arg(long, default_value_t = 1)]
    frame_threads: usize,

    /// Only print the totals
    #[arg(short, long)]
    quiet: bool,

    #[command(flatten)]
    metric: MetricArgs,
}

fn parse_size(s: &str) -> Result<(usize, usize), String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected <width>x<height>, got '{s}'"))?;
    let width = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width '{width}': {err}"))?;
    let height = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height '{height}': {err}"))?;
    Ok((width, height))
}

/// Reads consecutive fixed-size frames from a raw file.
struct FrameReader {
    reader: BufReader<File>,
    frame_size: usize,
}

impl FrameReader {
    fn open(path: &Path, frame_size: usize, skip: u64) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        if skip > 0 {
            file.seek(SeekFrom::Start(skip))
                .with_context(|| format!("Failed to seek in {}", path.display()))?;
        }
        Ok(Self {
            reader: BufReader::new(file),
            frame_size,
        })
    }

    /// Frames left in the file, if its size is known.
    fn remaining_frames(&mut self) -> Option<u64> {
        let len = self.reader.get_ref().metadata().ok()?.len();
        let pos = self.reader.stream_position().ok()?;
        Some(len.saturating_sub(pos) / self.frame_size as u64)
    }

    /// Fills `buf` with the next frame; `Ok(false)` at the end of the file.
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.resize(self.frame_size, 0);
        match self.reader.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err).context("Failed to read frame"),
        }
    }
}

pub fn compare_videos(args: &VideoArgs) -> Result<()> {
    let (width, height) = args.size;
    if width == 0 || height == 0 || width.saturating_mul(height) >= i32::MAX as usize / 3 {
        bail!("Dimensions are too large, or invalid: {}x{}", width, height);
    }

    let frame_size = Frame::i420_size(width, height);
    let (source_skip, distorted_skip) = if args.seek < 0 {
        (0, args.seek.unsigned_abs())
    } else {
        (args.seek.unsigned_abs(), 0)
    };
    let mut source = FrameReader::open(&args.source, frame_size, source_skip)?;
    let mut distorted = FrameReader::open(&args.distorted, frame_size, distorted_skip)?;

    let config = args.metric.config();
    let batch = args.frame_threads.max(1);
    info!(
        "comparing {}x{} frames of {} bytes, {} at a time",
        width, height, frame_size, batch
    );

    let total = match (source.remaining_frames(), distorted.remaining_frames()) {
        (Some(a), Some(b)) => Some(a.min(b)),
        _ => None,
    };
    let total = match (total, args.frames) {
        (Some(total), Some(limit)) => Some(total.min(limit as u64)),
        (total, limit) => total.or(limit.map(|l| l as u64)),
    };
    let progress = total.map_or_else(ProgressBar::new_spinner, ProgressBar::new);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})")
            .context("Invalid progress bar template")?,
    );

    let mut summary = StreamSummary::new();
    let mut scores = Vec::new();
    let mut buffers = vec![(Vec::new(), Vec::new()); batch];

    'frames: loop {
        let mut filled = 0;
        for (a, b) in &mut buffers {
            if args.frames.map_or(false, |limit| summary.frames() + filled >= limit) {
                break;
            }
            if !source.read_frame(a)? || !distorted.read_frame(b)? {
                break;
            }
            filled += 1;
        }
        if filled == 0 {
            break 'frames;
        }

        let batch_scores = score_batch(&buffers[..filled], width, height, &config)?;
        for score in batch_scores {
            if !args.quiet {
                let line = format!("Frame {} | {}", summary.frames(), format_score(&score));
                if progress.is_hidden() {
                    println!("{}", line);
                } else {
                    progress.println(line);
                }
            }
            summary.push(score);
            let combined = score.combined();
            if combined.is_nan() {
                warn!("frame {} has an undefined score", summary.frames() - 1);
            } else {
                scores.push(combined);
            }
            progress.inc(1);
        }

        if filled < batch {
            break 'frames;
        }
    }
    progress.finish_and_clear();

    let Some(mean) = summary.mean() else {
        debug!("no complete frames to compare");
        return Ok(());
    };
    println!(
        "Total {} frames | {}",
        summary.frames(),
        format_score(&mean)
    );
    if let Some((index, worst)) = summary.worst() {
        println!("Worst frame {} | {}", index, format_score(&worst));
    }
    print_stats(scores);

    Ok(())
}

fn score_batch(
    frames: &[(Vec<u8>, Vec<u8>)],
    width: usize,
    height: usize,
    config: &MsssimConfig,
) -> Result<Vec<FrameScore>> {
    let score = |(a, b): &(Vec<u8>, Vec<u8>)| -> Result<FrameScore> {
        let source = Frame::from_i420(a, width, height)?;
        let distorted = Frame::from_i420(b, width, height)?;
        Ok(compute_frame_msssim(&source, &distorted, config)?)
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        frames.par_iter().map(score).collect()
    }

    #[cfg(not(feature = "rayon"))]
    {
        frames.iter().map(score).collect()
    }
}

fn format_score(score: &FrameScore) -> String {
    format!(
        "MS-SSIM Y:{:.5} U:{:.5} V:{:.5} All:{:.5}",
        score.y,
        score.u,
        score.v,
        score.combined()
    )
}

fn print_stats(scores: Vec<f64>) {
    if scores.len() < 2 {
        return;
    }

    let mut data = Data::new(scores);
    println!("Mean:            {:.8}", data.mean().unwrap_or(f64::NAN));
    println!("Std dev:         {:.8}", data.std_dev().unwrap_or(f64::NAN));
    println!("Min:             {:.8}", data.min());
    println!("Max:             {:.8}", data.max());
    println!("Median:          {:.8}", data.percentile(50));
    println!("5th percentile:  {:.8}", data.percentile(5));
    println!("95th percentile: {:.8}", data.percentile(95));
}
