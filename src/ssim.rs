use log::trace;

use crate::block::{block_sums_4x4, block_sums_4x4x2, window_sums, BlockSums, BLOCK_SIZE};
use crate::plane::{try_alloc, PlaneRef};
use crate::window::{FixedPoint, SsimValue, WindowArithmetic};
use crate::MsssimError;

/// Smallest plane side that holds one 8x8 window.
pub const MIN_PLANE_SIZE: usize = 2 * BLOCK_SIZE;

/// Computes the average luminance and contrast-structure similarity of two
/// planes using overlapping 8x8 windows with a step of 4 samples.
///
/// # Errors
/// - If the planes differ in width or height
/// - If either side is smaller than 8 samples
/// - If the row buffers cannot be allocated
pub fn evaluate_plane(
    reference: &PlaneRef,
    distorted: &PlaneRef,
) -> Result<SsimValue, MsssimError> {
    evaluate_plane_with::<FixedPoint>(reference, distorted)
}

/// [`evaluate_plane`] with an explicit numeric policy for the window formula.
///
/// # Errors
/// See [`evaluate_plane`].
pub fn evaluate_plane_with<A: WindowArithmetic>(
    reference: &PlaneRef,
    distorted: &PlaneRef,
) -> Result<SsimValue, MsssimError> {
    check_same_size(reference, distorted)?;

    let width = reference.width();
    let height = reference.height();
    if width < MIN_PLANE_SIZE || height < MIN_PLANE_SIZE {
        return Err(MsssimError::InvalidDimensions { width, height });
    }

    let mut rows = BlockRows::new(width / BLOCK_SIZE)?;
    let block_height = height / BLOCK_SIZE;
    let windows_per_row = rows.blocks - 1;

    let mut total = SsimValue::default();
    rows.fill_current(reference, distorted, 0);
    for by in 1..block_height {
        rows.advance(reference, distorted, by);
        let row = rows.window_row::<A>(windows_per_row);
        total.l += row.l;
        total.cs += row.cs;
    }

    let windows = ((block_height - 1) * windows_per_row) as f64;
    Ok(SsimValue {
        l: total.l / windows,
        cs: total.cs / windows,
    })
}

pub(crate) fn check_same_size(a: &PlaneRef, b: &PlaneRef) -> Result<(), MsssimError> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(MsssimError::DimensionMismatch {
            reference: (a.width(), a.height()),
            distorted: (b.width(), b.height()),
        });
    }
    Ok(())
}

/// Block sums of the current and the previous row of 4x4 blocks.
///
/// Each new block row overwrites the older of the two buffers, so memory
/// stays proportional to the plane width.
struct BlockRows {
    current: Vec<BlockSums>,
    previous: Vec<BlockSums>,
    blocks: usize,
}

impl BlockRows {
    fn new(blocks: usize) -> Result<Self, MsssimError> {
        trace!("allocating 2 block rows of {blocks} entries");
        Ok(Self {
            current: try_alloc(blocks)?,
            previous: try_alloc(blocks)?,
            blocks,
        })
    }

    fn advance(&mut self, reference: &PlaneRef, distorted: &PlaneRef, by: usize) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.fill_current(reference, distorted, by);
    }

    fn fill_current(&mut self, reference: &PlaneRef, distorted: &PlaneRef, by: usize) {
        let y = by * BLOCK_SIZE;
        let (s1, s2) = (reference.stride(), distorted.stride());

        let mut bx = 0;
        while bx + 1 < self.blocks {
            let x = bx * BLOCK_SIZE;
            let [left, right] =
                block_sums_4x4x2(reference.tail(x, y), s1, distorted.tail(x, y), s2);
            self.current[bx] = left;
            self.current[bx + 1] = right;
            bx += 2;
        }
        if bx < self.blocks {
            // An odd block count leaves one block without a right neighbour.
            let x = bx * BLOCK_SIZE;
            self.current[bx] = block_sums_4x4(reference.tail(x, y), s1, distorted.tail(x, y), s2);
        }
    }

    /// Sums the similarity of every window whose lower half lies in the
    /// current block row.
    fn window_row<A: WindowArithmetic>(&self, windows: usize) -> SsimValue {
        let mut sum = SsimValue::default();
        for x in 0..windows {
            let sums = window_sums(
                &self.current[x],
                &self.current[x + 1],
                &self.previous[x],
                &self.previous[x + 1],
            );
            let value = A::window_ssim(&sums);
            sum.l += value.l;
            sum.cs += value.cs;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::FloatingPoint;

    fn flat(value: u8, width: usize, height: usize) -> Vec<u8> {
        vec![value; width * height]
    }

    fn pattern(width: usize, height: usize, seed: u32) -> Vec<u8> {
        (0..width * height)
            .map(|i| {
                let i = i as u32;
                (i.wrapping_mul(2_654_435_761).wrapping_add(seed) >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn identical_flat_planes() {
        let data = flat(128, 16, 16);
        let plane = PlaneRef::packed(&data, 16, 16).unwrap();
        let value = evaluate_plane(&plane, &plane).unwrap();
        assert!((value.l - 1.0).abs() < 1e-9);
        assert!((value.cs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_planes_decouple_luminance_and_structure() {
        let a = flat(128, 16, 16);
        let b = flat(0, 16, 16);
        let a = PlaneRef::packed(&a, 16, 16).unwrap();
        let b = PlaneRef::packed(&b, 16, 16).unwrap();
        let value = evaluate_plane(&a, &b).unwrap();
        assert!(value.l < 0.5, "L = {}", value.l);
        assert!((value.cs - 1.0).abs() < 1e-9, "CS = {}", value.cs);
    }

    #[test]
    fn symmetric_in_its_arguments() {
        let a = pattern(40, 24, 1);
        let b = pattern(40, 24, 77);
        let a = PlaneRef::packed(&a, 40, 24).unwrap();
        let b = PlaneRef::packed(&b, 40, 24).unwrap();
        let ab = evaluate_plane(&a, &b).unwrap();
        let ba = evaluate_plane(&b, &a).unwrap();
        assert!((ab.l - ba.l).abs() < 1e-12);
        assert!((ab.cs - ba.cs).abs() < 1e-12);
    }

    #[test]
    fn eight_by_eight_is_a_single_window() {
        let a = pattern(8, 8, 3);
        let b = pattern(8, 8, 9);
        let pa = PlaneRef::packed(&a, 8, 8).unwrap();
        let pb = PlaneRef::packed(&b, 8, 8).unwrap();
        let value = evaluate_plane(&pa, &pb).unwrap();

        let mut sums = [0u32; 4];
        for (&x, &y) in a.iter().zip(&b) {
            let (x, y) = (u32::from(x), u32::from(y));
            sums[0] += x;
            sums[1] += y;
            sums[2] += x * x + y * y;
            sums[3] += x * y;
        }
        let expected = FixedPoint::window_ssim(&sums);
        assert!((value.l - expected.l).abs() < 1e-12);
        assert!((value.cs - expected.cs).abs() < 1e-12);
    }

    #[test]
    fn too_small_planes_fail() {
        let data = flat(10, 8, 8);
        let small = PlaneRef::packed(&data, 4, 4).unwrap();
        assert!(matches!(
            evaluate_plane(&small, &small),
            Err(MsssimError::InvalidDimensions { width: 4, height: 4 })
        ));
        let narrow = PlaneRef::packed(&data, 7, 8).unwrap();
        assert!(evaluate_plane(&narrow, &narrow).is_err());
    }

    #[test]
    fn size_mismatch_fails() {
        let data = flat(10, 16, 16);
        let a = PlaneRef::packed(&data, 16, 16).unwrap();
        let b = PlaneRef::packed(&data, 16, 8).unwrap();
        assert!(matches!(
            evaluate_plane(&a, &b),
            Err(MsssimError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn odd_block_count_stays_in_bounds() {
        // 12 wide gives three blocks per row, the last one unpaired.
        let a = pattern(12, 12, 5);
        let b = pattern(12, 12, 6);
        let a = PlaneRef::packed(&a, 12, 12).unwrap();
        let b = PlaneRef::packed(&b, 12, 12).unwrap();
        let value = evaluate_plane(&a, &b).unwrap();
        assert!(value.l.is_finite() && value.cs.is_finite());
    }

    #[test]
    fn stride_padding_is_ignored() {
        let packed = pattern(16, 16, 11);
        let mut padded = vec![255u8; 24 * 16];
        for y in 0..16 {
            padded[y * 24..y * 24 + 16].copy_from_slice(&packed[y * 16..y * 16 + 16]);
        }
        let other = pattern(16, 16, 12);
        let other = PlaneRef::packed(&other, 16, 16).unwrap();

        let a = PlaneRef::packed(&packed, 16, 16).unwrap();
        let b = PlaneRef::new(&padded, 16, 16, 24).unwrap();
        assert_eq!(
            evaluate_plane(&a, &other).unwrap(),
            evaluate_plane(&b, &other).unwrap()
        );
    }

    #[test]
    fn float_policy_matches_fixed() {
        let a = pattern(32, 32, 21);
        let b = pattern(32, 32, 22);
        let a = PlaneRef::packed(&a, 32, 32).unwrap();
        let b = PlaneRef::packed(&b, 32, 32).unwrap();
        let fixed = evaluate_plane_with::<FixedPoint>(&a, &b).unwrap();
        let float = evaluate_plane_with::<FloatingPoint>(&a, &b).unwrap();
        assert!((fixed.l - float.l).abs() < 1e-4);
        assert!((fixed.cs - float.cs).abs() < 1e-4);
    }
}
