#![deny(clippy::all)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::inconsistent_struct_constructor)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::similar_names)]
#![allow(clippy::use_self)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::default_numeric_fallback)]
#![warn(clippy::exit)]
#![warn(clippy::float_cmp_const)]
#![warn(clippy::if_then_some_else_none)]
#![warn(clippy::lossy_float_literal)]
#![warn(clippy::map_err_ignore)]
#![warn(clippy::mem_forget)]
#![warn(clippy::mod_module_files)]
#![warn(clippy::multiple_inherent_impl)]
#![warn(clippy::rc_buffer)]
#![warn(clippy::rc_mutex)]
#![warn(clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::same_name_method)]
#![warn(clippy::str_to_string)]
#![warn(clippy::string_to_string)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::unneeded_field_pattern)]
#![warn(clippy::use_debug)]
#![warn(clippy::verbose_file_reads)]

mod block;
mod downscale;
mod frame;
mod plane;
mod report;
mod ssim;
mod window;

use std::collections::TryReserveError;

use log::debug;
use thiserror::Error;

pub use block::{block_sums_4x4, block_sums_4x4x2, BlockSums};
pub use downscale::{downsample, half_size};
pub use frame::{compute_frame_msssim, Frame, FrameScore};
pub use plane::{OwnedPlane, PlaneRef};
pub use report::StreamSummary;
pub use ssim::{evaluate_plane, evaluate_plane_with, MIN_PLANE_SIZE};
pub use window::{
    Arithmetic, FixedPoint, FloatingPoint, SsimValue, Stabilizers, WindowArithmetic,
    MAX_FIXED_POINT_BIT_DEPTH, SAMPLE_BIT_DEPTH,
};

/// Highest number of pyramid levels.
pub const NUM_SCALES: usize = 5;

/// Contrast sensitivity weight of each scale, finest first, from Wang,
/// Simoncelli and Bovik, "Multi-scale structural similarity for image quality
/// assessment" (2003).
pub const WEIGHTS: [f64; NUM_SCALES] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MsssimError {
    #[error("Plane of {width}x{height} samples is too small")]
    InvalidDimensions { width: usize, height: usize },
    #[error(
        "Source and distorted planes must have the same size, got {}x{} and {}x{}",
        .reference.0,
        .reference.1,
        .distorted.0,
        .distorted.1
    )]
    DimensionMismatch {
        reference: (usize, usize),
        distorted: (usize, usize),
    },
    #[error("Row stride {stride} is smaller than the plane width {width}")]
    InvalidStride { width: usize, stride: usize },
    #[error("Plane buffer holds {actual} bytes but {expected} are required")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("Failed to allocate {bytes} bytes of working memory")]
    AllocationFailure {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("{bit_depth}-bit samples overflow 32-bit window arithmetic")]
    NumericOverflow { bit_depth: u32 },
}

/// How the scale weights are applied when fewer than [`NUM_SCALES`] scales
/// are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeightMode {
    /// Use the table as is. The exponents then sum to less than one, which
    /// pulls scores towards 1.0. This matches the reference tool.
    #[default]
    Fixed,
    /// Rescale the weights of the evaluated scales to sum to one.
    Normalized,
}

/// Parameters of an MS-SSIM computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsssimConfig {
    /// Requested number of scales. Values outside `1..=5` mean 5.
    pub scales: usize,
    /// How the scale weights are applied when fewer than 5 scales are used.
    pub weights: WeightMode,
    /// Numeric policy of the window formula.
    pub arithmetic: Arithmetic,
}

impl Default for MsssimConfig {
    fn default() -> Self {
        Self {
            scales: NUM_SCALES,
            weights: WeightMode::Fixed,
            arithmetic: Arithmetic::for_bit_depth(SAMPLE_BIT_DEPTH),
        }
    }
}

impl MsssimConfig {
    #[must_use]
    pub fn with_scales(scales: usize) -> Self {
        Self {
            scales,
            ..Self::default()
        }
    }

    /// The requested number of scales, with out of range values replaced by
    /// [`NUM_SCALES`].
    #[must_use]
    pub const fn clamped_scales(&self) -> usize {
        if self.scales < 1 || self.scales > NUM_SCALES {
            NUM_SCALES
        } else {
            self.scales
        }
    }
}

/// Computes the MS-SSIM score of a distorted plane against its source, using
/// up to `scales` pyramid levels.
///
/// # Errors
/// - If the source and distorted plane width and height do not match
/// - If the planes are smaller than 8x8 samples
/// - If the working buffers cannot be allocated
pub fn ms_ssim(
    reference: &PlaneRef,
    distorted: &PlaneRef,
    scales: usize,
) -> Result<f64, MsssimError> {
    ms_ssim_with_config(reference, distorted, &MsssimConfig::with_scales(scales))
}

/// Computes the MS-SSIM score with explicit weighting and arithmetic.
///
/// Levels are halved until the requested number of scales is reached or the
/// next level would be smaller than 8x8; the last evaluated level supplies
/// the luminance term.
///
/// # Errors
/// See [`ms_ssim`].
pub fn ms_ssim_with_config(
    reference: &PlaneRef,
    distorted: &PlaneRef,
    config: &MsssimConfig,
) -> Result<f64, MsssimError> {
    ssim::check_same_size(reference, distorted)?;
    if reference.width() < MIN_PLANE_SIZE || reference.height() < MIN_PLANE_SIZE {
        return Err(MsssimError::InvalidDimensions {
            width: reference.width(),
            height: reference.height(),
        });
    }

    let scales = config.clamped_scales();
    let mut pyramid = Pyramid::new(reference, distorted)?;
    let mut msssim = Msssim::default();

    for scale in 0..scales {
        if scale > 0 {
            let (width, height) = pyramid.next_size();
            if width < MIN_PLANE_SIZE || height < MIN_PLANE_SIZE {
                debug!(
                    "stopping at {} of {} scales, next level would be {}x{}",
                    scale, scales, width, height
                );
                break;
            }
            pyramid.downsample();
        }

        let (source, distorted) = pyramid.planes();
        let value = match config.arithmetic {
            Arithmetic::Fixed => evaluate_plane_with::<FixedPoint>(&source, &distorted)?,
            Arithmetic::Float => evaluate_plane_with::<FloatingPoint>(&source, &distorted)?,
        };
        debug!(
            "scale {} ({}x{}): L={:.6} CS={:.6}",
            scale + 1,
            source.width(),
            source.height(),
            value.l,
            value.cs
        );
        msssim.scales.push(value);
    }

    Ok(msssim.score(config.weights))
}

/// Working copies of both inputs at the current pyramid level, plus the
/// buffers the next level is written into.
struct Pyramid {
    source: OwnedPlane,
    distorted: OwnedPlane,
    next_source: OwnedPlane,
    next_distorted: OwnedPlane,
}

impl Pyramid {
    fn new(source: &PlaneRef, distorted: &PlaneRef) -> Result<Self, MsssimError> {
        let (half_width, half_height) = (source.width() / 2, source.height() / 2);
        Ok(Self {
            source: OwnedPlane::copy_from(source)?,
            distorted: OwnedPlane::copy_from(distorted)?,
            next_source: OwnedPlane::zeroed(half_width, half_height)?,
            next_distorted: OwnedPlane::zeroed(half_width, half_height)?,
        })
    }

    fn next_size(&self) -> (usize, usize) {
        (self.source.width() / 2, self.source.height() / 2)
    }

    fn downsample(&mut self) {
        let (width, height) = self.next_size();
        downscale::downsample_into(&self.source.as_plane_ref(), self.next_source.data_mut());
        downscale::downsample_into(
            &self.distorted.as_plane_ref(),
            self.next_distorted.data_mut(),
        );
        self.next_source.shrink_to(width, height);
        self.next_distorted.shrink_to(width, height);
        std::mem::swap(&mut self.source, &mut self.next_source);
        std::mem::swap(&mut self.distorted, &mut self.next_distorted);
    }

    fn planes(&self) -> (PlaneRef<'_>, PlaneRef<'_>) {
        (self.source.as_plane_ref(), self.distorted.as_plane_ref())
    }
}

#[derive(Debug, Clone, Default)]
struct Msssim {
    pub scales: Vec<SsimValue>,
}

impl Msssim {
    /// Weighted geometric mean of the contrast-structure terms of every scale
    /// and the luminance term of the coarsest one.
    pub fn score(&self, mode: WeightMode) -> f64 {
        let Some(coarsest) = self.scales.last() else {
            return 1.0;
        };

        let weights = &WEIGHTS[..self.scales.len()];
        let norm = match mode {
            WeightMode::Fixed => 1.0,
            WeightMode::Normalized => weights.iter().sum(),
        };

        let mut score = self
            .scales
            .iter()
            .zip(weights)
            .map(|(value, &weight)| value.cs.powf(weight / norm))
            .product::<f64>();
        score *= coarsest.l.powf(weights[weights.len() - 1] / norm);
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(width: usize, height: usize, seed: u64) -> Vec<u8> {
        let mut state = seed;
        (0..width * height)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 56) as u8
            })
            .collect()
    }

    fn distort(source: &[u8], amplitude: u8, seed: u64) -> Vec<u8> {
        source
            .iter()
            .zip(noise(source.len(), 1, seed))
            .map(|(&pix, n)| {
                let offset = i16::from(n % (2 * amplitude + 1)) - i16::from(amplitude);
                (i16::from(pix) + offset).clamp(0, 255) as u8
            })
            .collect()
    }

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3, "sum = {}", sum);
    }

    #[test]
    fn scales_clamp_to_five() {
        assert_eq!(MsssimConfig::with_scales(0).clamped_scales(), 5);
        assert_eq!(MsssimConfig::with_scales(6).clamped_scales(), 5);
        assert_eq!(MsssimConfig::with_scales(3).clamped_scales(), 3);
        assert_eq!(MsssimConfig::default().arithmetic, Arithmetic::Fixed);
    }

    #[test]
    fn flat_identical_16x16() {
        let data = vec![128u8; 16 * 16];
        let plane = PlaneRef::packed(&data, 16, 16).unwrap();
        let score = ms_ssim(&plane, &plane, 5).unwrap();
        assert!((score - 1.0).abs() < 1e-9, "score = {}", score);
    }

    #[test]
    fn identity_for_every_scale_count() {
        let data = noise(160, 128, 3);
        let plane = PlaneRef::packed(&data, 160, 128).unwrap();
        for scales in 0..=6 {
            let score = ms_ssim(&plane, &plane, scales).unwrap();
            assert!((score - 1.0).abs() < 1e-9, "scales {}: {}", scales, score);
        }
    }

    #[test]
    fn single_scale_matches_plane_evaluation() {
        let a = noise(64, 48, 1);
        let b = distort(&a, 30, 2);
        let a = PlaneRef::packed(&a, 64, 48).unwrap();
        let b = PlaneRef::packed(&b, 64, 48).unwrap();
        let value = evaluate_plane(&a, &b).unwrap();
        let expected = value.cs.powf(WEIGHTS[0]) * value.l.powf(WEIGHTS[0]);
        let score = ms_ssim(&a, &b, 1).unwrap();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn luminance_only_from_the_coarsest_scale() {
        let a = vec![128u8; 64 * 64];
        let b = vec![100u8; 64 * 64];
        let a = PlaneRef::packed(&a, 64, 64).unwrap();
        let b = PlaneRef::packed(&b, 64, 64).unwrap();
        // Flat planes keep CS at exactly 1 on every scale.
        let l = evaluate_plane(&a, &b).unwrap().l;
        for scales in 1..=3 {
            let score = ms_ssim(&a, &b, scales).unwrap();
            let expected = l.powf(WEIGHTS[scales - 1]);
            assert!((score - expected).abs() < 1e-12, "scales {}", scales);
        }
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let a = vec![128u8; 64 * 64];
        let b = vec![100u8; 64 * 64];
        let a = PlaneRef::packed(&a, 64, 64).unwrap();
        let b = PlaneRef::packed(&b, 64, 64).unwrap();
        let l = evaluate_plane(&a, &b).unwrap().l;

        let config = MsssimConfig {
            scales: 2,
            weights: WeightMode::Normalized,
            ..MsssimConfig::default()
        };
        let score = ms_ssim_with_config(&a, &b, &config).unwrap();
        let expected = l.powf(WEIGHTS[1] / (WEIGHTS[0] + WEIGHTS[1]));
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn pyramid_stops_below_eight_samples() {
        // 16x16 only supports two levels, so five scales behave like two.
        let a = noise(16, 16, 5);
        let b = distort(&a, 20, 6);
        let a = PlaneRef::packed(&a, 16, 16).unwrap();
        let b = PlaneRef::packed(&b, 16, 16).unwrap();
        assert_eq!(ms_ssim(&a, &b, 5).unwrap(), ms_ssim(&a, &b, 2).unwrap());
    }

    #[test]
    fn rejects_invalid_inputs() {
        let data = vec![0u8; 16 * 16];
        let small = PlaneRef::packed(&data, 4, 4).unwrap();
        assert!(matches!(
            ms_ssim(&small, &small, 5),
            Err(MsssimError::InvalidDimensions { width: 4, height: 4 })
        ));

        let a = PlaneRef::packed(&data, 16, 16).unwrap();
        let b = PlaneRef::packed(&data, 8, 16).unwrap();
        assert!(matches!(
            ms_ssim(&a, &b, 5),
            Err(MsssimError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn float_arithmetic_is_close_to_fixed() {
        let a = noise(96, 96, 8);
        let b = distort(&a, 40, 9);
        let a = PlaneRef::packed(&a, 96, 96).unwrap();
        let b = PlaneRef::packed(&b, 96, 96).unwrap();
        let mut config = MsssimConfig::default();
        let fixed = ms_ssim_with_config(&a, &b, &config).unwrap();
        config.arithmetic = Arithmetic::Float;
        let float = ms_ssim_with_config(&a, &b, &config).unwrap();
        assert!((fixed - float).abs() < 1e-4, "{} vs {}", fixed, float);
    }
}
