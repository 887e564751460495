use crate::MsssimError;

/// A borrowed 8-bit plane with an arbitrary row stride.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneRef<'a> {
    /// Wraps `data` as a `width` x `height` plane whose rows start `stride`
    /// bytes apart.
    ///
    /// # Errors
    /// - If `stride` is smaller than `width`
    /// - If `data` is too short to hold the last row
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, MsssimError> {
        if stride < width {
            return Err(MsssimError::InvalidStride { width, stride });
        }

        let expected = if height == 0 {
            0
        } else {
            // Saturating so an unrepresentable extent fails the length check.
            stride
                .checked_mul(height - 1)
                .and_then(|n| n.checked_add(width))
                .unwrap_or(usize::MAX)
        };
        if data.len() < expected {
            return Err(MsssimError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Wraps a tightly packed plane (`stride == width`).
    ///
    /// # Errors
    /// - If `data` holds fewer than `width * height` bytes
    pub fn packed(data: &'a [u8], width: usize, height: usize) -> Result<Self, MsssimError> {
        Self::new(data, width, height, width)
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Row `y` without the stride padding.
    #[must_use]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Samples starting at (`x`, `y`) through the end of the buffer.
    pub(crate) fn tail(&self, x: usize, y: usize) -> &'a [u8] {
        &self.data[y * self.stride + x..]
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &'a [u8]> {
        let plane = *self;
        (0..self.height).map(move |y| plane.row(y))
    }
}

/// A tightly packed plane owned by the metric, e.g. one pyramid level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPlane {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedPlane {
    /// Allocates a zeroed plane.
    ///
    /// # Errors
    /// - If `width * height` does not fit in `usize`
    /// - If the allocation fails
    pub fn zeroed(width: usize, height: usize) -> Result<Self, MsssimError> {
        let len = width
            .checked_mul(height)
            .ok_or(MsssimError::InvalidDimensions { width, height })?;
        let data = try_alloc(len)?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Copies `plane` into an owned, packed buffer.
    ///
    /// # Errors
    /// - If the allocation fails
    pub fn copy_from(plane: &PlaneRef) -> Result<Self, MsssimError> {
        let mut owned = Self::zeroed(plane.width(), plane.height())?;
        owned.copy_rows_from(plane);
        Ok(owned)
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn as_plane_ref(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: &self.data[..self.width * self.height],
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Shrinks the tracked dimensions without releasing memory.
    pub(crate) fn shrink_to(&mut self, width: usize, height: usize) {
        debug_assert!(width * height <= self.data.len());
        self.width = width;
        self.height = height;
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn copy_rows_from(&mut self, plane: &PlaneRef) {
        for (dst, src) in self
            .data
            .chunks_exact_mut(self.width.max(1))
            .zip(plane.rows())
        {
            dst.copy_from_slice(src);
        }
    }
}

/// Allocates a zeroed buffer, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone + Default>(len: usize) -> Result<Vec<T>, MsssimError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| MsssimError::AllocationFailure {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
            source,
        })?;
    buf.resize(len, T::default());
    Ok(buf)
}
