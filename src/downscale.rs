use crate::plane::{OwnedPlane, PlaneRef};
use crate::MsssimError;

/// Halves a plane in both directions by averaging each 2x2 block.
///
/// The output is `width / 2` x `height / 2`; an odd last row or column is
/// dropped and each average is truncated.
///
/// # Errors
/// - If the plane is narrower or shorter than 2 samples
/// - If the output cannot be allocated
pub fn downsample(plane: &PlaneRef) -> Result<OwnedPlane, MsssimError> {
    let (out_width, out_height) = half_size(plane)?;
    let mut out = OwnedPlane::zeroed(out_width, out_height)?;
    downsample_into(plane, out.data_mut());
    Ok(out)
}

/// Output dimensions of [`downsample`].
///
/// # Errors
/// - If either side is smaller than 2
pub fn half_size(plane: &PlaneRef) -> Result<(usize, usize), MsssimError> {
    if plane.width() < 2 || plane.height() < 2 {
        return Err(MsssimError::InvalidDimensions {
            width: plane.width(),
            height: plane.height(),
        });
    }
    Ok((plane.width() / 2, plane.height() / 2))
}

/// Writes the downsampled plane into the front of `out`, packed.
///
/// `out` must hold at least `(width / 2) * (height / 2)` samples.
pub(crate) fn downsample_into(plane: &PlaneRef, out: &mut [u8]) {
    let out_width = plane.width() / 2;
    let out_height = plane.height() / 2;
    if out_width == 0 {
        return;
    }

    for (y, out_row) in out[..out_width * out_height]
        .chunks_exact_mut(out_width)
        .enumerate()
    {
        let top = plane.row(2 * y);
        let bottom = plane.row(2 * y + 1);
        for (x, pix) in out_row.iter_mut().enumerate() {
            let sum = u16::from(top[2 * x])
                + u16::from(top[2 * x + 1])
                + u16::from(bottom[2 * x])
                + u16::from(bottom[2 * x + 1]);
            *pix = (sum / 4) as u8;
        }
    }
}
