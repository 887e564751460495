use crate::plane::PlaneRef;
use crate::{ms_ssim_with_config, MsssimConfig, MsssimError};

/// The Y, U and V planes of one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub planes: [PlaneRef<'a>; 3],
}

impl<'a> Frame<'a> {
    /// Splits a packed I420 buffer: the luma plane followed by the two chroma
    /// planes at half resolution, rounded up.
    ///
    /// # Errors
    /// - If `data` is shorter than [`Frame::i420_size`]
    pub fn from_i420(data: &'a [u8], width: usize, height: usize) -> Result<Self, MsssimError> {
        let expected = Self::i420_size(width, height);
        if data.len() < expected {
            return Err(MsssimError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }

        let (chroma_width, chroma_height) = chroma_size(width, height);
        let luma_len = width * height;
        let chroma_len = chroma_width * chroma_height;
        let (y, rest) = data.split_at(luma_len);
        let (u, rest) = rest.split_at(chroma_len);
        let v = &rest[..chroma_len];

        Ok(Self {
            planes: [
                PlaneRef::packed(y, width, height)?,
                PlaneRef::packed(u, chroma_width, chroma_height)?,
                PlaneRef::packed(v, chroma_width, chroma_height)?,
            ],
        })
    }

    /// Size in bytes of one packed I420 frame, saturating at `usize::MAX`.
    #[must_use]
    pub const fn i420_size(width: usize, height: usize) -> usize {
        let (chroma_width, chroma_height) = chroma_size(width, height);
        let chroma_len = chroma_width.saturating_mul(chroma_height);
        width
            .saturating_mul(height)
            .saturating_add(chroma_len.saturating_mul(2))
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.planes[0].width()
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.planes[0].height()
    }
}

const fn chroma_size(width: usize, height: usize) -> (usize, usize) {
    (width / 2 + width % 2, height / 2 + height % 2)
}

/// MS-SSIM of each plane of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameScore {
    pub y: f64,
    pub u: f64,
    pub v: f64,
}

impl FrameScore {
    /// Single score for the frame, weighting luma four times as much as each
    /// chroma plane.
    #[must_use]
    pub fn combined(&self) -> f64 {
        (4.0 * self.y + self.u + self.v) / 6.0
    }
}

/// Computes the MS-SSIM score of every plane of a distorted frame.
///
/// With the `rayon` feature the three planes are evaluated concurrently.
///
/// # Errors
/// - If any pair of planes cannot be compared, see [`crate::ms_ssim`]
pub fn compute_frame_msssim(
    source: &Frame,
    distorted: &Frame,
    config: &MsssimConfig,
) -> Result<FrameScore, MsssimError> {
    let score = |i: usize| ms_ssim_with_config(&source.planes[i], &distorted.planes[i], config);

    #[cfg(feature = "rayon")]
    let (y, (u, v)) = rayon::join(|| score(0), || rayon::join(|| score(1), || score(2)));

    #[cfg(not(feature = "rayon"))]
    let (y, u, v) = (score(0), score(1), score(2));

    Ok(FrameScore {
        y: y?,
        u: u?,
        v: v?,
    })
}
