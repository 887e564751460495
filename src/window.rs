use num_traits::{AsPrimitive, Num, One};

use crate::block::BlockSums;
use crate::MsssimError;

/// Bit depth of the samples the core operates on.
pub const SAMPLE_BIT_DEPTH: u32 = 8;

/// Number of samples in one window.
const WINDOW_SAMPLES: u32 = 64;

/// Highest bit depth whose window products still fit in 32-bit integers.
///
/// At 10 bits `ss * 64` reaches `(2^10-1)^2 * 64 * 64 = 4286582784`.
pub const MAX_FIXED_POINT_BIT_DEPTH: u32 = 9;

/// Luminance and contrast-structure similarity of a window or a whole plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SsimValue {
    /// Luminance term.
    pub l: f64,
    /// Contrast-structure term.
    pub cs: f64,
}

/// The stabilizing constants of the SSIM formula, scaled for sums over a
/// 64-sample window.
///
/// The window policies use the 8-bit constants. [`Stabilizers::fixed`] and
/// [`Stabilizers::float`] derive them for other sample depths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stabilizers<T> {
    pub c1: T,
    pub c2: T,
}

fn peak(bit_depth: u32) -> f64 {
    f64::from(bit_depth).exp2() - 1.0
}

fn c1_for(bit_depth: u32) -> f64 {
    let peak = peak(bit_depth);
    0.01 * 0.01 * peak * peak * 64.0 * 64.0
}

fn c2_for(bit_depth: u32) -> f64 {
    let peak = peak(bit_depth);
    0.03 * 0.03 * peak * peak * 64.0 * 63.0
}

impl Stabilizers<i32> {
    /// Fixed-point constants for 8-bit samples.
    pub const EIGHT_BIT: Self = Self {
        c1: (0.01 * 0.01 * 255.0 * 255.0 * 64.0 * 64.0 + 0.5) as i32,
        c2: (0.03 * 0.03 * 255.0 * 255.0 * 64.0 * 63.0 + 0.5) as i32,
    };

    /// Fixed-point constants for the given bit depth, rounded to nearest.
    ///
    /// # Errors
    /// - If the bit depth is too high for the window products to fit in 32 bits
    pub fn fixed(bit_depth: u32) -> Result<Self, MsssimError> {
        if bit_depth == 0 || bit_depth > MAX_FIXED_POINT_BIT_DEPTH {
            return Err(MsssimError::NumericOverflow { bit_depth });
        }

        Ok(Self {
            c1: (c1_for(bit_depth) + 0.5) as i32,
            c2: (c2_for(bit_depth) + 0.5) as i32,
        })
    }
}

impl Stabilizers<f64> {
    /// Floating-point constants for 8-bit samples.
    pub const EIGHT_BIT: Self = Self {
        c1: 0.01 * 0.01 * 255.0 * 255.0 * 64.0 * 64.0,
        c2: 0.03 * 0.03 * 255.0 * 255.0 * 64.0 * 63.0,
    };

    /// Floating-point constants for the given bit depth. Depths past the
    /// range of `f64` give infinite constants.
    #[must_use]
    pub fn float(bit_depth: u32) -> Self {
        Self {
            c1: c1_for(bit_depth),
            c2: c2_for(bit_depth),
        }
    }
}

/// Numeric policy for the single-window formula.
///
/// The raw sums are widened into `Acc` before the products are formed; the
/// final ratio is always taken in `f64`.
pub trait WindowArithmetic {
    type Acc: Num + Copy + AsPrimitive<f64>;

    const STABILIZERS: Stabilizers<Self::Acc>;

    fn widen(sum: u32) -> Self::Acc;

    #[inline]
    fn window_ssim(sums: &BlockSums) -> SsimValue {
        let Stabilizers { c1, c2 } = Self::STABILIZERS;
        let n = Self::widen(WINDOW_SAMPLES);
        let two = Self::Acc::one() + Self::Acc::one();

        let s1 = Self::widen(sums[0]);
        let s2 = Self::widen(sums[1]);
        let ss = Self::widen(sums[2]);
        let s12 = Self::widen(sums[3]);

        let vars = ss * n - s1 * s1 - s2 * s2;
        let covar = s12 * n - s1 * s2;

        let l_num: f64 = (two * s1 * s2 + c1).as_();
        let l_den: f64 = (s1 * s1 + s2 * s2 + c1).as_();
        let cs_num: f64 = (two * covar + c2).as_();
        let cs_den: f64 = (vars + c2).as_();

        SsimValue {
            l: l_num / l_den,
            cs: cs_num / cs_den,
        }
    }
}

/// 32-bit integer products. Exact for 8-bit samples.
#[derive(Debug, Clone, Copy)]
pub struct FixedPoint;

impl WindowArithmetic for FixedPoint {
    type Acc = i32;

    const STABILIZERS: Stabilizers<i32> = Stabilizers::<i32>::EIGHT_BIT;

    #[inline(always)]
    fn widen(sum: u32) -> i32 {
        // 8-bit window sums stay below 2^31.
        sum as i32
    }
}

/// `f64` products, needed once the sample depth exceeds 9 bits.
#[derive(Debug, Clone, Copy)]
pub struct FloatingPoint;

impl WindowArithmetic for FloatingPoint {
    type Acc = f64;

    const STABILIZERS: Stabilizers<f64> = Stabilizers::<f64>::EIGHT_BIT;

    #[inline(always)]
    fn widen(sum: u32) -> f64 {
        f64::from(sum)
    }
}

/// Runtime selection of the numeric policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Arithmetic {
    /// 32-bit integer products, matching the reference tool bit for bit.
    #[default]
    Fixed,
    /// Double precision products.
    Float,
}

impl Arithmetic {
    /// Picks the narrowest policy that cannot overflow at the given depth.
    #[must_use]
    pub const fn for_bit_depth(bit_depth: u32) -> Self {
        if bit_depth > MAX_FIXED_POINT_BIT_DEPTH {
            Self::Float
        } else {
            Self::Fixed
        }
    }
}
