use crate::shape::Shape;

// Layout — Memory layout of a tensor (shape + strides + offset)
//
// The Layout decouples the *logical* shape of a tensor from where its
// elements sit in a Storage. Slicing is free: a slice keeps the parent's
// strides and only moves the offset, so it keeps addressing the parent's
// buffer.
//
// Strides are caller supplied and need not be the packed C-order strides.
// A tensor allocated with padded strides, or a slice of a larger tensor,
// addresses a non-contiguous region.
//
//   element index = offset + sum(coord[i] * stride[i])

/// Layout describes how a tensor's logical shape maps to flat storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<usize>,
    /// Element offset into the storage buffer where this tensor starts.
    offset: usize,
}

impl Layout {
    /// Create a new contiguous layout for the given shape.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a layout with explicit strides and offset (for views).
    pub fn new(shape: Shape, strides: Vec<usize>, offset: usize) -> Self {
        Layout {
            shape,
            strides,
            offset,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// A layout is contiguous when its strides are the packed C-order
    /// strides of its shape and it starts at offset 0.
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && self.strides == self.shape.stride_contiguous()
    }

    /// Sub-region starting at `start` (per axis, missing axes are 0) with
    /// the given dimensions. Strides are inherited unchanged.
    pub fn slice(&self, start: &[usize], dims: Shape) -> Layout {
        let offset = offset_for(self.offset, &self.strides, start);
        Layout::new(dims, self.strides.clone(), offset)
    }

    /// Number of elements a buffer must hold for every coordinate of this
    /// layout to be addressable, or `None` when that does not fit in `usize`.
    pub fn required_elems(&self) -> Option<usize> {
        if self.shape.checked_elem_count()? == 0 {
            return Some(self.offset);
        }
        self.dims()
            .iter()
            .zip(&self.strides)
            .try_fold(self.offset, |acc, (&d, &s)| acc.checked_add((d - 1).checked_mul(s)?))?
            .checked_add(1)
    }
}

pub(crate) fn offset_for(base: usize, strides: &[usize], index: &[usize]) -> usize {
    base + index
        .iter()
        .zip(strides)
        .map(|(&i, &s)| i * s)
        .sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_layout() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        assert!(layout.is_contiguous());
        assert_eq!(layout.strides(), &[3, 1]);
        assert_eq!(layout.required_elems(), Some(6));
    }

    #[test]
    fn test_slice_keeps_strides() {
        // [4, 6] slice at (1, 2) with dims [2, 3] → offset 1*6 + 2 = 8
        let layout = Layout::contiguous(Shape::from((4, 6)));
        let sliced = layout.slice(&[1, 2], Shape::from((2, 3)));
        assert_eq!(sliced.dims(), &[2, 3]);
        assert_eq!(sliced.offset(), 8);
        assert_eq!(sliced.strides(), &[6, 1]);
        assert!(!sliced.is_contiguous());
        // last element at 8 + 1*6 + 2
        assert_eq!(sliced.required_elems(), Some(17));
    }

    #[test]
    fn test_padded_strides_required_elems() {
        // rows padded to 8 elements
        let layout = Layout::new(Shape::from((3, 5)), vec![8, 1], 0);
        assert_eq!(layout.required_elems(), Some(2 * 8 + 4 + 1));
    }

    #[test]
    fn test_short_coordinate_addresses_sub_block() {
        let strides = Shape::from((2, 3, 4)).stride_contiguous();
        assert_eq!(offset_for(0, &strides, &[1, 2, 3]), 23);
        assert_eq!(offset_for(5, &strides, &[1]), 17);
    }

    #[test]
    fn test_required_elems_overflow() {
        let big = usize::MAX / 2 + 1;
        assert_eq!(Layout::new(Shape::from((3, 1)), vec![big, 1], 0).required_elems(), None);
        assert_eq!(Layout::contiguous(Shape::from((big, 4))).required_elems(), None);
        // empty layouts need only their offset
        assert_eq!(Layout::new(Shape::from((0, 4)), vec![big, big], 3).required_elems(), Some(3));
    }
}
