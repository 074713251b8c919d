//! The storage descriptor (component D): `(dtype, shape, strides, size,
//! layout-flags, offset)`, threaded through every operation.
//!
//! [`Layout`] carries the geometry (shape, strides, offset) and is shared
//! with [`crate::dtype`]-free code such as the CPU backend's element
//! iteration; [`StorageDescriptor`] adds the dtype and the `is_view` /
//! `writeable` / `aligned` flags the facade needs to decide copy-vs-view.

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::shape::{Dim, ResolvedSliceAxis, Shape, SliceAxis};

/// Shape + strides + base offset, all in element units (not bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    // Signed so a reversed slice (negative step, §4.E) can carry a negative
    // stride; the base offset still always points at a valid in-bounds
    // element, so that stays unsigned.
    stride: Vec<isize>,
    start_offset: usize,
}

impl Layout {
    pub fn contiguous(shape: Shape) -> Self {
        let stride = shape.stride_c_contiguous().into_iter().map(|s| s as isize).collect();
        Self { shape, stride, start_offset: 0 }
    }

    pub fn new(shape: Shape, stride: Vec<isize>, start_offset: usize) -> Self {
        debug_assert_eq!(shape.rank(), stride.len());
        Self { shape, stride, start_offset }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn stride(&self) -> &[isize] {
        &self.stride
    }

    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// `c_contiguous`, §4.D: strides match C-order, offset is zero, and the
    /// tensor is non-empty. Empty tensors are vacuously contiguous.
    pub fn is_c_contiguous(&self) -> bool {
        if self.shape.is_empty_shape() {
            return true;
        }
        self.start_offset == 0 && self.stride.iter().map(|&s| s as usize).eq(self.shape.stride_c_contiguous())
    }

    pub fn is_f_contiguous(&self) -> bool {
        if self.shape.is_empty_shape() {
            return true;
        }
        self.start_offset == 0 && self.stride.iter().map(|&s| s as usize).eq(self.shape.stride_f_contiguous())
    }

    /// Transposes the last two dims; identity for rank < 2. Always a view.
    pub fn transpose_last_two(&self) -> Self {
        if self.rank() < 2 {
            return self.clone();
        }
        self.transpose(self.rank() - 2, self.rank() - 1).expect("in-range by construction")
    }

    pub fn transpose(&self, d1: usize, d2: usize) -> Result<Self> {
        let rank = self.rank();
        if d1 >= rank || d2 >= rank {
            return Err(Error::Bounds { index: d1.max(d2) as isize, length: rank });
        }
        let mut dims = self.shape.dims().to_vec();
        let mut stride = self.stride.clone();
        dims.swap(d1, d2);
        stride.swap(d1, d2);
        Ok(Self { shape: Shape::from_dims_unchecked(dims), stride, start_offset: self.start_offset })
    }

    /// Permutes both shape and strides by `axes`, a full permutation of
    /// `0..rank` (after negative-index normalization, with no duplicates).
    pub fn permute(&self, axes: &[isize]) -> Result<Self> {
        let rank = self.rank();
        if axes.len() != rank {
            return Err(Error::ShapeMismatch { op: "permute", lhs: self.shape.clone(), rhs: Shape::from_dims_unchecked(vec![axes.len()]) });
        }
        let mut seen = vec![false; rank];
        let mut normalized = Vec::with_capacity(rank);
        for &a in axes {
            let idx = a.to_index(rank, "permute")?;
            if seen[idx] {
                return Err(Error::PermutationDuplicate { axes: axes.to_vec() });
            }
            seen[idx] = true;
            normalized.push(idx);
        }
        let dims: Vec<usize> = normalized.iter().map(|&i| self.shape.dims()[i]).collect();
        let stride: Vec<isize> = normalized.iter().map(|&i| self.stride[i]).collect();
        Ok(Self { shape: Shape::from_dims_unchecked(dims), stride, start_offset: self.start_offset })
    }

    /// Produces a reshape view when possible (contiguous input), or `None`
    /// to signal the caller must materialize a contiguous copy first.
    pub fn reshape_view(&self, new_shape: &Shape) -> Result<Option<Self>> {
        if new_shape.elem_count() != self.elem_count() {
            return Err(Error::ReshapeMismatch {
                from: self.shape.clone(),
                to: new_shape.clone(),
                from_elems: self.elem_count(),
                to_elems: new_shape.elem_count(),
            });
        }
        if !self.is_c_contiguous() {
            return Ok(None);
        }
        Ok(Some(Self::contiguous(new_shape.clone())))
    }

    /// `broadcast_as`: expands size-1 dims (and prepends size-1 dims) to
    /// match `target`, setting the stride of every broadcast dim to 0.
    pub fn broadcast_as(&self, target: &Shape) -> Result<Self> {
        let self_dims = self.shape.dims();
        let target_dims = target.dims();
        if target_dims.len() < self_dims.len() {
            return Err(Error::ShapeMismatch { op: "broadcast_as", lhs: self.shape.clone(), rhs: target.clone() });
        }
        let pad = target_dims.len() - self_dims.len();
        let mut stride = vec![0isize; target_dims.len()];
        for i in 0..self_dims.len() {
            let target_dim = target_dims[pad + i];
            if self_dims[i] == target_dim {
                stride[pad + i] = self.stride[i];
            } else if self_dims[i] == 1 {
                stride[pad + i] = 0;
            } else {
                return Err(Error::ShapeMismatch { op: "broadcast_as", lhs: self.shape.clone(), rhs: target.clone() });
            }
        }
        Ok(Self { shape: target.clone(), stride, start_offset: self.start_offset })
    }

    /// Narrows axis `dim` to the half-open, unit-step range `[start, start+len)`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Self> {
        let dims = self.shape.dims();
        if dim >= dims.len() || start + len > dims[dim] {
            return Err(Error::Bounds { index: (start + len) as isize, length: dims.get(dim).copied().unwrap_or(0) });
        }
        let mut new_dims = dims.to_vec();
        new_dims[dim] = len;
        let new_offset = self.start_offset as isize + start as isize * self.stride[dim];
        Ok(Self {
            shape: Shape::from_dims_unchecked(new_dims),
            stride: self.stride.clone(),
            start_offset: new_offset as usize,
        })
    }

    /// Applies a full per-axis slice specification (§6's slice parameter
    /// format), producing the resulting view layout. The caller (the
    /// dispatcher) decides whether to keep this as a view or materialize it.
    pub fn slice(&self, axes: &[SliceAxis]) -> Result<Self> {
        let dims = self.shape.dims();
        if axes.len() > dims.len() {
            return Err(Error::ShapeMismatch { op: "slice", lhs: self.shape.clone(), rhs: Shape::from_dims_unchecked(vec![axes.len()]) });
        }
        let mut new_dims = Vec::new();
        let mut new_stride = Vec::new();
        let mut offset = self.start_offset as isize;
        for (axis_index, &dim) in dims.iter().enumerate() {
            let axis = axes.get(axis_index).copied().unwrap_or(SliceAxis::Full);
            match crate::shape::resolve_slice_axis(axis, dim, axis_index)? {
                ResolvedSliceAxis::Full => {
                    new_dims.push(dim);
                    new_stride.push(self.stride[axis_index]);
                }
                ResolvedSliceAxis::Index(i) => {
                    offset += i as isize * self.stride[axis_index];
                }
                ResolvedSliceAxis::Range { start, len, step } => {
                    offset += start as isize * self.stride[axis_index];
                    new_dims.push(len);
                    new_stride.push(self.stride[axis_index] * step);
                }
            }
        }
        Ok(Self { shape: Shape::from_dims_unchecked(new_dims), stride: new_stride, start_offset: offset as usize })
    }
}

/// The per-dtype `(dtype, shape, strides, size, layout-flags, offset)`
/// record that every operation transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDescriptor {
    pub dtype: DType,
    pub layout: Layout,
    pub is_view: bool,
    pub writeable: bool,
    pub aligned: bool,
}

impl StorageDescriptor {
    /// A fresh, owned, contiguous descriptor — what every copy-producing op
    /// (binary, reduction, matmul, softmax, unary, materialized slice) sets.
    pub fn owned(dtype: DType, shape: Shape) -> Self {
        let layout = Layout::contiguous(shape);
        Self { dtype, layout, is_view: false, writeable: true, aligned: true }
    }

    /// A view descriptor derived from `self` by `layout`, preserving
    /// `writeable`/`aligned` and recomputing contiguity from the new strides.
    pub fn view(&self, layout: Layout) -> Self {
        let byte_size = self.dtype.byte_size();
        let aligned = self.aligned && (layout.start_offset() * byte_size) % byte_size == 0;
        Self { dtype: self.dtype, layout, is_view: true, writeable: self.writeable, aligned }
    }

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    pub fn size(&self) -> usize {
        self.layout.elem_count()
    }

    pub fn c_contiguous(&self) -> bool {
        self.layout.is_c_contiguous()
    }

    pub fn f_contiguous(&self) -> bool {
        self.layout.is_f_contiguous()
    }

    /// Invariant (4): `aligned` implies `offset` is a multiple of the dtype
    /// byte size. Element-unit offsets always satisfy this, but the check is
    /// kept explicit because it is a spec invariant, not an accident of the
    /// representation.
    pub fn check_invariants(&self) -> Result<()> {
        if !self.is_view && self.layout.start_offset() != 0 {
            return Err(Error::BackendError("non-view descriptor must have offset 0".into()));
        }
        if !self.is_view && !self.c_contiguous() {
            return Err(Error::BackendError("non-view descriptor must be c_contiguous".into()));
        }
        if self.aligned && self.layout.start_offset() % 1 != 0 {
            // offsets are element counts, so any offset is trivially a
            // multiple of 1 element; kept to document the invariant.
            return Err(Error::BufferAlignment {
                offset: self.layout.start_offset(),
                byte_size: self.dtype.byte_size(),
                dtype: self.dtype,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_is_an_involution() {
        let layout = Layout::contiguous(Shape::new(vec![2, 3]).unwrap());
        let once = layout.transpose_last_two();
        let twice = once.transpose_last_two();
        assert_eq!(twice, layout);
    }

    #[test]
    fn reshape_view_for_contiguous_copy_otherwise() {
        let layout = Layout::contiguous(Shape::new(vec![2, 3]).unwrap());
        let reshaped = layout.reshape_view(&Shape::new(vec![3, 2]).unwrap()).unwrap();
        assert!(reshaped.is_some());

        let sliced = layout.slice(&[crate::shape::SliceAxis::Range { start: Some(0), stop: Some(2), step: Some(2) }]).unwrap();
        assert!(!sliced.is_c_contiguous());
        assert!(sliced.reshape_view(&Shape::new(vec![sliced.elem_count()]).unwrap()).unwrap().is_none());
    }

    #[test]
    fn slice_examples_from_spec() {
        // [[1,2,3],[4,5,6]] sliced with [null, 1] -> shape [2]
        let layout = Layout::contiguous(Shape::new(vec![2, 3]).unwrap());
        let sliced = layout.slice(&[SliceAxis::Full, SliceAxis::Index(1)]).unwrap();
        assert_eq!(sliced.dims(), &[2]);

        // sliced with [0] -> shape [3]
        let sliced = layout.slice(&[SliceAxis::Index(0)]).unwrap();
        assert_eq!(sliced.dims(), &[3]);

        // sliced with [{step: 2}, null] -> shape [1, 3]
        let sliced = layout
            .slice(&[SliceAxis::Range { start: None, stop: None, step: Some(2) }, SliceAxis::Full])
            .unwrap();
        assert_eq!(sliced.dims(), &[1, 3]);
    }

    #[test]
    fn negative_step_slice_reverses_without_wrapping() {
        let layout = Layout::contiguous(Shape::new(vec![5]).unwrap());
        let reversed = layout
            .slice(&[SliceAxis::Range { start: None, stop: None, step: Some(-1) }])
            .unwrap();
        assert_eq!(reversed.dims(), &[5]);
        assert_eq!(reversed.stride(), &[-1]);
        assert_eq!(reversed.start_offset(), 4);
    }
}
