//! The shape algebra (component E): broadcasting, matmul shape, reduction
//! shape, and the pure index/stride arithmetic behind slicing, permuting,
//! transposing, reshaping and viewing. [`crate::layout`] wraps these
//! functions into the stateful [`crate::layout::Layout`] the rest of the
//! crate threads around.

use crate::error::{Error, Result};
use std::fmt;

pub const MAX_RANK: usize = 8;

/// A finite, ordered sequence of non-negative dimension sizes. Rank 0 is a
/// scalar; rank is capped at [`MAX_RANK`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();
        if dims.len() > MAX_RANK {
            return Err(Error::RankExceeded { rank: dims.len(), max: MAX_RANK });
        }
        Ok(Self(dims))
    }

    /// Builds a shape without the rank check; used internally where the
    /// rank is already known to be in range (e.g. derived from another
    /// validated shape).
    pub(crate) fn from_dims_unchecked(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.0[axis]
    }

    /// Canonical row-major (C-order) strides: `stride[i] = prod(dims[i+1..])`.
    pub fn stride_c_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.0.len()];
        for i in (0..self.0.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        strides
    }

    /// Canonical column-major (F-order) strides: the reverse product.
    pub fn stride_f_contiguous(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.0.len()];
        for i in 1..self.0.len() {
            strides[i] = strides[i - 1] * self.0[i - 1];
        }
        strides
    }

    pub fn is_empty_shape(&self) -> bool {
        self.0.iter().any(|&d| d == 0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        // Callers that construct from a `Vec` directly are expected to have
        // validated rank already (e.g. literals in tests); `Shape::new` is
        // the checked entry point for untrusted input.
        Self(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(v: &[usize]) -> Self {
        Self(v.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(v: [usize; N]) -> Self {
        Self(v.to_vec())
    }
}

/// An axis reference that may be negative (`-1` means the last axis).
/// Mirrors the teacher's `Dim` trait for normalizing user-supplied indices.
pub trait Dim {
    fn to_index(&self, rank: usize, op: &'static str) -> Result<usize>;
}

impl Dim for usize {
    fn to_index(&self, rank: usize, op: &'static str) -> Result<usize> {
        if *self >= rank {
            return Err(Error::Bounds { index: *self as isize, length: rank });
        }
        let _ = op;
        Ok(*self)
    }
}

impl Dim for isize {
    fn to_index(&self, rank: usize, op: &'static str) -> Result<usize> {
        let rank_i = rank as isize;
        let normalized = if *self < 0 { *self + rank_i } else { *self };
        if normalized < 0 || normalized >= rank_i {
            return Err(Error::Bounds { index: *self, length: rank });
        }
        let _ = op;
        Ok(normalized as usize)
    }
}

impl Dim for i32 {
    fn to_index(&self, rank: usize, op: &'static str) -> Result<usize> {
        (*self as isize).to_index(rank, op)
    }
}

/// `broadcast(a, b)`, §4.E: right-aligned shape broadcasting.
pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Result<Shape> {
    let rank = a.rank().max(b.rank());
    let mut out = vec![0usize; rank];
    for i in 0..rank {
        let da = *a.dims().iter().rev().nth(i).unwrap_or(&1);
        let db = *b.dims().iter().rev().nth(i).unwrap_or(&1);
        let d = if da == db {
            da
        } else if da == 1 {
            db
        } else if db == 1 {
            da
        } else {
            return Err(Error::ShapeMismatch { op: "broadcast", lhs: a.clone(), rhs: b.clone() });
        };
        out[rank - 1 - i] = d;
    }
    Ok(Shape::from_dims_unchecked(out))
}

/// `matmul shape`, §4.E.
pub fn matmul_shape(a: &Shape, b: &Shape) -> Result<Shape> {
    if a.rank() == 0 || b.rank() == 0 {
        return Err(Error::ShapeMismatch { op: "matmul", lhs: a.clone(), rhs: b.clone() });
    }
    let k_a = *a.dims().last().unwrap();
    let k_b = if b.rank() == 1 { b.dims()[0] } else { b.dims()[b.rank() - 2] };
    if k_a != k_b {
        return Err(Error::ShapeMismatch { op: "matmul", lhs: a.clone(), rhs: b.clone() });
    }

    let batch_a = if a.rank() >= 2 { &a.dims()[..a.rank() - 2] } else { &[] };
    let batch_b = if b.rank() >= 2 { &b.dims()[..b.rank() - 2] } else { &[] };
    if !batch_a.is_empty() && !batch_b.is_empty() && batch_a != batch_b {
        return Err(Error::ShapeMismatch { op: "matmul", lhs: a.clone(), rhs: b.clone() });
    }
    let batch = if batch_a.len() >= batch_b.len() { batch_a } else { batch_b };

    let mut out = batch.to_vec();
    match (a.rank(), b.rank()) {
        (1, 1) => {}
        (1, _) => out.push(b.dims()[b.rank() - 1]),
        (_, 1) => out.push(a.dims()[a.rank() - 2]),
        _ => {
            out.push(a.dims()[a.rank() - 2]);
            out.push(b.dims()[b.rank() - 1]);
        }
    }
    Shape::new(out)
}

/// `reshape`/`view` target resolution: expands at most one `-1` wildcard
/// against `total`, erroring if it does not divide evenly or more than one
/// wildcard is present.
pub fn resolve_view_dims(dims: &[isize], total: usize) -> Result<Vec<usize>> {
    let wildcard_count = dims.iter().filter(|&&d| d == -1).count();
    if wildcard_count > 1 {
        return Err(Error::ViewAmbiguous { dims: dims.to_vec(), reason: "more than one -1 wildcard" });
    }
    let known_product: usize = dims.iter().filter(|&&d| d != -1).map(|&d| d as usize).product();
    let mut out = Vec::with_capacity(dims.len());
    for &d in dims {
        if d == -1 {
            if known_product == 0 || total % known_product != 0 {
                return Err(Error::ViewAmbiguous { dims: dims.to_vec(), reason: "size does not divide evenly" });
            }
            out.push(total / known_product);
        } else {
            out.push(d as usize);
        }
    }
    Ok(out)
}

/// `reduction shape`, §4.E.
pub fn reduce_shape(shape: &Shape, axes: Option<&[isize]>, keep_dims: bool) -> Result<(Shape, Vec<usize>)> {
    let rank = shape.rank();
    let normalized: Vec<usize> = match axes {
        None => (0..rank).collect(),
        Some(axes) => {
            let mut seen = vec![false; rank];
            let mut out = Vec::with_capacity(axes.len());
            for &axis in axes {
                let idx = axis.to_index(rank, "reduce")?;
                if seen[idx] {
                    return Err(Error::PermutationDuplicate { axes: axes.to_vec() });
                }
                seen[idx] = true;
                out.push(idx);
            }
            out.sort_unstable();
            out
        }
    };

    let mut out_dims = Vec::new();
    for (axis, &d) in shape.dims().iter().enumerate() {
        if normalized.contains(&axis) {
            if keep_dims {
                out_dims.push(1);
            }
        } else {
            out_dims.push(d);
        }
    }
    Ok((Shape::from_dims_unchecked(out_dims), normalized))
}

/// One resolved axis of a slice operation, already normalized against a
/// concrete dimension size (negative indices resolved, defaults filled in).
#[derive(Debug, Clone, Copy)]
pub enum ResolvedSliceAxis {
    /// Integer index: removes this axis from the output.
    Index(usize),
    /// Keeps the axis as-is.
    Full,
    /// A stepped range: `(start, len, step)` in the source's element units.
    Range { start: usize, len: usize, step: isize },
}

/// One unresolved per-axis slice request, §6's slice parameter format.
#[derive(Debug, Clone, Copy)]
pub enum SliceAxis {
    Index(isize),
    Full,
    Range { start: Option<isize>, stop: Option<isize>, step: Option<isize> },
}

fn normalize_bound(v: isize, dim: usize) -> isize {
    let dim = dim as isize;
    let v = if v < 0 { v + dim } else { v };
    v.clamp(0, dim)
}

/// Resolves one [`SliceAxis`] against a concrete dimension size, per §4.E.
pub fn resolve_slice_axis(axis: SliceAxis, dim: usize, axis_index: usize) -> Result<ResolvedSliceAxis> {
    match axis {
        SliceAxis::Full => Ok(ResolvedSliceAxis::Full),
        SliceAxis::Index(i) => {
            let dim_i = dim as isize;
            let normalized = if i < 0 { i + dim_i } else { i };
            if normalized < 0 || normalized >= dim_i {
                return Err(Error::Bounds { index: i, length: dim });
            }
            Ok(ResolvedSliceAxis::Index(normalized as usize))
        }
        SliceAxis::Range { start, stop, step } => {
            let step = step.unwrap_or(1);
            if step == 0 {
                return Err(Error::SliceStepZero { axis: axis_index });
            }
            let dim_i = dim as isize;
            let (start, stop) = if step > 0 {
                let start = normalize_bound(start.unwrap_or(0), dim);
                let stop = normalize_bound(stop.unwrap_or(dim_i), dim);
                (start, stop)
            } else {
                // A negative step walks backward; an absent/`-1` stop means
                // "down to the beginning", which normalize_bound cannot
                // express with clamping to `[0, dim]`, so handle it directly.
                let start = normalize_bound(start.unwrap_or(dim_i - 1), dim).min(dim_i - 1).max(-1);
                let stop = match stop {
                    None => -1,
                    Some(s) if s == -1 => -1,
                    Some(s) => normalize_bound(s, dim),
                };
                (start, stop)
            };
            let len = if step > 0 {
                let span = stop - start;
                if span <= 0 {
                    0
                } else {
                    ((span - 1) / step + 1) as usize
                }
            } else {
                let span = start - stop;
                if span <= 0 {
                    0
                } else {
                    ((span - 1) / (-step) + 1) as usize
                }
            };
            Ok(ResolvedSliceAxis::Range { start: start.max(0) as usize, len, step })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_is_commutative_and_expands_ones() {
        let a = Shape::new(vec![2, 3]).unwrap();
        let b = Shape::new(vec![1, 3]).unwrap();
        let ab = broadcast_shapes(&a, &b).unwrap();
        let ba = broadcast_shapes(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.dims(), &[2, 3]);
    }

    #[test]
    fn matmul_shape_examples_from_spec() {
        let a = Shape::new(vec![2, 3]).unwrap();
        let b = Shape::new(vec![3]).unwrap();
        assert_eq!(matmul_shape(&a, &b).unwrap().dims(), &[2]);

        let a = Shape::new(vec![2, 2, 3]).unwrap();
        let b = Shape::new(vec![2, 3, 4]).unwrap();
        assert_eq!(matmul_shape(&a, &b).unwrap().dims(), &[2, 2, 4]);

        let a = Shape::new(vec![2, 3]).unwrap();
        let b = Shape::new(vec![2, 4]).unwrap();
        assert!(matmul_shape(&a, &b).is_err());
    }

    #[test]
    fn view_wildcard_resolution() {
        assert_eq!(resolve_view_dims(&[-1, 2], 6).unwrap(), vec![3, 2]);
        assert!(resolve_view_dims(&[-1, 4], 6).is_err());
        assert!(resolve_view_dims(&[-1, -1], 6).is_err());
    }

    #[test]
    fn reduce_shape_none_vs_all_axes() {
        let shape = Shape::new(vec![2, 3]).unwrap();
        let (none_shape, none_axes) = reduce_shape(&shape, None, false).unwrap();
        let (all_shape, all_axes) = reduce_shape(&shape, Some(&[0, 1]), false).unwrap();
        assert_eq!(none_shape, all_shape);
        assert_eq!(none_axes, all_axes);
        assert!(none_shape.dims().is_empty());

        let (kept, _) = reduce_shape(&shape, Some(&[1]), true).unwrap();
        assert_eq!(kept.dims(), &[2, 1]);
    }

    #[test]
    fn slice_identity_matches_full_range() {
        let resolved = resolve_slice_axis(
            SliceAxis::Range { start: Some(0), stop: Some(3), step: Some(1) },
            3,
            0,
        )
        .unwrap();
        match resolved {
            ResolvedSliceAxis::Range { start, len, step } => {
                assert_eq!((start, len, step), (0, 3, 1));
            }
            _ => panic!("expected a range"),
        }
    }
}
