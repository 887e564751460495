/// Raw sums over one 4x4 block pair: `[s1, s2, ss, s12]`.
///
/// `ss` accumulates the squares of both images, so a window's variance term can
/// be formed without keeping the two sums of squares apart.
pub type BlockSums = [u32; 4];

pub const BLOCK_SIZE: usize = 4;

/// Computes the sums of two horizontally adjacent 4x4 blocks in one pass.
///
/// `pix1` and `pix2` start at the top left sample of the first block and must
/// span at least 4 rows and 8 columns with the given strides.
#[inline]
pub fn block_sums_4x4x2(
    pix1: &[u8],
    stride1: usize,
    pix2: &[u8],
    stride2: usize,
) -> [BlockSums; 2] {
    [
        block_sums_4x4(pix1, stride1, pix2, stride2),
        block_sums_4x4(&pix1[BLOCK_SIZE..], stride1, &pix2[BLOCK_SIZE..], stride2),
    ]
}

/// Computes the sums of a single 4x4 block.
#[inline]
pub fn block_sums_4x4(pix1: &[u8], stride1: usize, pix2: &[u8], stride2: usize) -> BlockSums {
    let mut s1 = 0u32;
    let mut s2 = 0u32;
    let mut ss = 0u32;
    let mut s12 = 0u32;

    for y in 0..BLOCK_SIZE {
        let row1 = &pix1[y * stride1..y * stride1 + BLOCK_SIZE];
        let row2 = &pix2[y * stride2..y * stride2 + BLOCK_SIZE];
        for (&a, &b) in row1.iter().zip(row2) {
            let a = u32::from(a);
            let b = u32::from(b);
            s1 += a;
            s2 += b;
            ss += a * a;
            ss += b * b;
            s12 += a * b;
        }
    }

    [s1, s2, ss, s12]
}

/// Adds the sums of the four blocks making up one 8x8 window.
#[inline]
pub fn window_sums(a: &BlockSums, b: &BlockSums, c: &BlockSums, d: &BlockSums) -> BlockSums {
    [
        a[0] + b[0] + c[0] + d[0],
        a[1] + b[1] + c[1] + d[1],
        a[2] + b[2] + c[2] + d[2],
        a[3] + b[3] + c[3] + d[3],
    ]
}
