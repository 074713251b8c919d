//! The tensor facade (component G): the single user-facing type. Creation,
//! the op methods the dispatcher backs, data round-trips, device move,
//! clone and dispose all live here; everything below this module only ever
//! sees shapes, dtypes and descriptors, never a `Tensor`.

use crate::backend::{Backend, Handle};
use crate::convert::{self, ConvertPolicy};
use crate::cpu_backend;
use crate::device::DeviceLocation;
use crate::dtype::{DType, Scalar, ValueKind};
use crate::dispatch;
use crate::error::{Error, Result};
use crate::layout::{Layout, StorageDescriptor};
use crate::op::{OpParams, OpTag};
use crate::promotion;
use crate::shape::{self, Dim, Shape, SliceAxis};
use std::cell::Cell;
use std::sync::Arc;

/// Nested literal data, as passed to [`Tensor::from_nested`]: either a leaf
/// value or a list of further-nested values. Ragged lists are rejected at
/// shape-inference time with [`Error::InconsistentDimensions`].
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Scalar(Scalar),
    List(Vec<Nested>),
}

impl From<Scalar> for Nested {
    fn from(value: Scalar) -> Self {
        Nested::Scalar(value)
    }
}

fn infer_shape(node: &Nested, axis: usize, dims: &mut Vec<usize>) -> Result<()> {
    match node {
        Nested::Scalar(_) => Ok(()),
        Nested::List(items) => {
            if axis == dims.len() {
                dims.push(items.len());
            } else if dims[axis] != items.len() {
                return Err(Error::InconsistentDimensions { axis, expected: dims[axis], got: items.len() });
            }
            for item in items {
                infer_shape(item, axis + 1, dims)?;
            }
            Ok(())
        }
    }
}

fn flatten(node: &Nested, out: &mut Vec<Scalar>) {
    match node {
        Nested::Scalar(v) => out.push(*v),
        Nested::List(items) => {
            for item in items {
                flatten(item, out);
            }
        }
    }
}

/// Options accepted by [`Tensor::from_nested`]: an explicit dtype (else
/// inferred via [`promotion::common_type_of_values`]) and an explicit shape
/// override (§4.G: "reshapes if element counts match").
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub dtype: Option<DType>,
    pub shape: Option<Vec<usize>>,
}

fn one_scalar(dtype: DType) -> Scalar {
    match dtype.meta().value_kind {
        ValueKind::Boolean => Scalar::Bool(true),
        ValueKind::Integer => Scalar::BigInt(1),
        ValueKind::Float => Scalar::Number(1.0),
    }
}

fn fill_bytes(n: usize, dtype: DType, value: &Scalar) -> Vec<u8> {
    let sz = dtype.byte_size();
    let element = cpu_backend::encode_scalar(dtype, value);
    let mut out = vec![0u8; n * sz];
    for i in 0..n {
        out[i * sz..(i + 1) * sz].copy_from_slice(&element);
    }
    out
}

/// The single user-facing tensor type: a backend handle plus the descriptor
/// describing how to read it. `disposed` is per-instance, not shared with
/// views derived from the same handle — disposing a view never disturbs its
/// producer (§5: "each Tensor owns exactly one backend handle").
pub struct Tensor {
    backend: Arc<dyn Backend>,
    handle: Handle,
    descriptor: StorageDescriptor,
    disposed: Cell<bool>,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.descriptor.dtype)
            .field("shape", &self.descriptor.shape())
            .field("is_view", &self.descriptor.is_view)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

impl Tensor {
    fn with(backend: Arc<dyn Backend>, handle: Handle, descriptor: StorageDescriptor) -> Tensor {
        Tensor { backend, handle, descriptor, disposed: Cell::new(false) }
    }

    /// A cheap new `Tensor` value sharing this one's handle and backend.
    /// Used internally wherever an op's input dtype already matches what
    /// the kernel needs, so no conversion copy is warranted.
    fn share(&self) -> Tensor {
        Tensor::with(self.backend.clone(), self.handle.clone(), self.descriptor.clone())
    }

    fn check_alive(&self) -> Result<()> {
        if self.disposed.get() {
            return Err(Error::UseAfterDispose);
        }
        Ok(())
    }

    fn check_same_backend(&self, other: &Tensor) -> Result<()> {
        if self.backend.id() != other.backend.id() {
            return Err(Error::DeviceMismatch { lhs: DeviceLocation::Cpu, rhs: DeviceLocation::Cpu });
        }
        Ok(())
    }

    // ---- accessors --------------------------------------------------

    pub fn dtype(&self) -> DType {
        self.descriptor.dtype
    }

    pub fn shape(&self) -> &Shape {
        self.descriptor.shape()
    }

    pub fn size(&self) -> usize {
        self.descriptor.size()
    }

    pub fn is_view(&self) -> bool {
        self.descriptor.is_view
    }

    pub fn writeable(&self) -> bool {
        self.descriptor.writeable
    }

    pub fn aligned(&self) -> bool {
        self.descriptor.aligned
    }

    pub fn c_contiguous(&self) -> bool {
        self.descriptor.c_contiguous()
    }

    pub fn f_contiguous(&self) -> bool {
        self.descriptor.f_contiguous()
    }

    pub fn backend_id(&self) -> u64 {
        self.backend.id()
    }

    // ---- creation -----------------------------------------------------

    pub fn from_nested(data: &Nested, options: CreateOptions, backend: Arc<dyn Backend>) -> Result<Tensor> {
        let mut dims = Vec::new();
        infer_shape(data, 0, &mut dims)?;
        let mut values = Vec::new();
        flatten(data, &mut values);

        let dtype = match options.dtype {
            Some(d) => d,
            None => promotion::common_type_of_values(&values)?,
        };
        for value in &values {
            if !dtype.is_valid_value(value) {
                return Err(Error::DTypeValidation { value: format!("{value:?}"), dtype });
            }
        }

        let sz = dtype.byte_size();
        let mut bytes = vec![0u8; values.len() * sz];
        for (i, value) in values.iter().enumerate() {
            let encoded = cpu_backend::encode_scalar(dtype, value);
            bytes[i * sz..(i + 1) * sz].copy_from_slice(&encoded);
        }

        let handle = backend.allocate_with_buffer(&bytes)?;
        let shape = Shape::new(dims)?;
        let tensor = Tensor::with(backend, handle, StorageDescriptor::owned(dtype, shape));
        match options.shape {
            Some(dims) => {
                let target = Shape::new(dims)?;
                if target.elem_count() != tensor.size() {
                    return Err(Error::ReshapeMismatch {
                        from: tensor.shape().clone(),
                        to: target.clone(),
                        from_elems: tensor.size(),
                        to_elems: target.elem_count(),
                    });
                }
                tensor.reshape(&target.dims().iter().map(|&d| d as isize).collect::<Vec<_>>())
            }
            None => Ok(tensor),
        }
    }

    pub fn zeros(shape: impl Into<Shape>, dtype: DType, backend: Arc<dyn Backend>) -> Result<Tensor> {
        let shape = shape.into();
        let bytes = vec![0u8; shape.elem_count() * dtype.byte_size()];
        let handle = backend.allocate_with_buffer(&bytes)?;
        Ok(Tensor::with(backend, handle, StorageDescriptor::owned(dtype, shape)))
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType, backend: Arc<dyn Backend>) -> Result<Tensor> {
        let shape = shape.into();
        let bytes = fill_bytes(shape.elem_count(), dtype, &one_scalar(dtype));
        let handle = backend.allocate_with_buffer(&bytes)?;
        Ok(Tensor::with(backend, handle, StorageDescriptor::owned(dtype, shape)))
    }

    pub fn identity(n: usize, dtype: DType, backend: Arc<dyn Backend>) -> Result<Tensor> {
        let shape = Shape::new(vec![n, n])?;
        let sz = dtype.byte_size();
        let mut bytes = vec![0u8; n * n * sz];
        let one = cpu_backend::encode_scalar(dtype, &one_scalar(dtype));
        for i in 0..n {
            let idx = i * n + i;
            bytes[idx * sz..(idx + 1) * sz].copy_from_slice(&one);
        }
        let handle = backend.allocate_with_buffer(&bytes)?;
        Ok(Tensor::with(backend, handle, StorageDescriptor::owned(dtype, shape)))
    }

    // ---- dtype conversion ----------------------------------------------

    /// Converts to `dtype` under `policy`, materializing a contiguous copy
    /// first if needed. This is the facade-level step that happens *before*
    /// an op-descriptor is built: kernels never see mismatched input dtypes
    /// (§4.F assigns promotion and dtype work to the facade, contiguity
    /// coercion alone to the dispatcher).
    pub fn cast(&self, dtype: DType, policy: &ConvertPolicy) -> Result<Tensor> {
        self.check_alive()?;
        if self.descriptor.dtype == dtype {
            return Ok(self.share());
        }
        let (handle, layout) = if self.descriptor.c_contiguous() {
            (self.handle.clone(), self.descriptor.layout.clone())
        } else {
            dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?
        };
        let raw = self.backend.read(&handle)?;
        let in_size = self.descriptor.dtype.byte_size();
        let n = layout.elem_count();
        let values: Vec<Scalar> = (0..n).map(|i| cpu_backend::decode_scalar(self.descriptor.dtype, &raw[i * in_size..(i + 1) * in_size])).collect();
        let (converted, _warnings) = convert::convert_array(&values, self.descriptor.dtype, dtype, policy)?;

        let out_size = dtype.byte_size();
        let mut out = vec![0u8; n * out_size];
        for (i, value) in converted.iter().enumerate() {
            let encoded = cpu_backend::encode_scalar(dtype, value);
            out[i * out_size..(i + 1) * out_size].copy_from_slice(&encoded);
        }
        let out_handle = self.backend.allocate_with_buffer(&out)?;
        Ok(Tensor::with(self.backend.clone(), out_handle, StorageDescriptor::owned(dtype, layout.shape().clone())))
    }

    // ---- unary ops ------------------------------------------------------

    fn unary_same_dtype(&self, op: OpTag) -> Result<Tensor> {
        self.check_alive()?;
        let output = StorageDescriptor::owned(self.descriptor.dtype, self.descriptor.shape().clone());
        let (out_descriptor, out_handle) =
            dispatch::dispatch(self.backend.as_ref(), op, output, &[(self.descriptor.clone(), self.handle.clone())], OpParams::None)?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    fn unary_float(&self, op: OpTag) -> Result<Tensor> {
        self.check_alive()?;
        let out_dtype = self.descriptor.dtype.to_float();
        let src = self.cast(out_dtype, &ConvertPolicy::permissive())?;
        let output = StorageDescriptor::owned(out_dtype, src.descriptor.shape().clone());
        let (out_descriptor, out_handle) =
            dispatch::dispatch(self.backend.as_ref(), op, output, &[(src.descriptor.clone(), src.handle.clone())], OpParams::None)?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    pub fn neg(&self) -> Result<Tensor> {
        self.unary_same_dtype(OpTag::Neg)
    }

    pub fn abs(&self) -> Result<Tensor> {
        self.unary_same_dtype(OpTag::Abs)
    }

    pub fn square(&self) -> Result<Tensor> {
        self.unary_same_dtype(OpTag::Square)
    }

    pub fn sin(&self) -> Result<Tensor> {
        self.unary_float(OpTag::Sin)
    }

    pub fn cos(&self) -> Result<Tensor> {
        self.unary_float(OpTag::Cos)
    }

    pub fn exp(&self) -> Result<Tensor> {
        self.unary_float(OpTag::Exp)
    }

    pub fn log(&self) -> Result<Tensor> {
        self.unary_float(OpTag::Log)
    }

    pub fn sqrt(&self) -> Result<Tensor> {
        self.unary_float(OpTag::Sqrt)
    }

    // ---- binary ops -------------------------------------------------

    fn broadcast_as(&self, target: &Shape) -> Result<Tensor> {
        if self.descriptor.shape() == target {
            return Ok(self.share());
        }
        let layout = self.descriptor.layout.broadcast_as(target)?;
        Ok(Tensor::with(self.backend.clone(), self.handle.clone(), self.descriptor.view(layout)))
    }

    fn binary_op(&self, op: OpTag, other: &Tensor) -> Result<Tensor> {
        self.check_alive()?;
        other.check_alive()?;
        self.check_same_backend(other)?;
        let out_shape = shape::broadcast_shapes(self.descriptor.shape(), other.descriptor.shape())?;
        let out_dtype = promotion::promote(self.descriptor.dtype, other.descriptor.dtype);

        let lhs = self.cast(out_dtype, &ConvertPolicy::permissive())?.broadcast_as(&out_shape)?;
        let rhs = other.cast(out_dtype, &ConvertPolicy::permissive())?.broadcast_as(&out_shape)?;

        let output = StorageDescriptor::owned(out_dtype, out_shape);
        let (out_descriptor, out_handle) = dispatch::dispatch(
            self.backend.as_ref(),
            op,
            output,
            &[(lhs.descriptor.clone(), lhs.handle.clone()), (rhs.descriptor.clone(), rhs.handle.clone())],
            OpParams::None,
        )?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(OpTag::Add, other)
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(OpTag::Sub, other)
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(OpTag::Mul, other)
    }

    pub fn div(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(OpTag::Div, other)
    }

    // ---- matmul -----------------------------------------------------

    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        self.check_alive()?;
        other.check_alive()?;
        self.check_same_backend(other)?;
        let out_shape = shape::matmul_shape(self.descriptor.shape(), other.descriptor.shape())?;
        let out_dtype = promotion::promote(self.descriptor.dtype, other.descriptor.dtype);

        let lhs = self.cast(out_dtype, &ConvertPolicy::permissive())?;
        let rhs = other.cast(out_dtype, &ConvertPolicy::permissive())?;

        let output = StorageDescriptor::owned(out_dtype, out_shape);
        let (out_descriptor, out_handle) = dispatch::dispatch(
            self.backend.as_ref(),
            OpTag::Matmul,
            output,
            &[(lhs.descriptor.clone(), lhs.handle.clone()), (rhs.descriptor.clone(), rhs.handle.clone())],
            OpParams::None,
        )?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    // ---- softmax ------------------------------------------------------

    fn softmax_like(&self, op: OpTag, axis: isize) -> Result<Tensor> {
        self.check_alive()?;
        let out_dtype = self.descriptor.dtype.to_float();
        let src = self.cast(out_dtype, &ConvertPolicy::permissive())?;
        let normalized_axis = axis.to_index(src.descriptor.shape().rank(), "softmax")?;
        let output = StorageDescriptor::owned(out_dtype, src.descriptor.shape().clone());
        let (out_descriptor, out_handle) = dispatch::dispatch(
            self.backend.as_ref(),
            op,
            output,
            &[(src.descriptor.clone(), src.handle.clone())],
            OpParams::Axis(normalized_axis),
        )?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    pub fn softmax(&self, axis: isize) -> Result<Tensor> {
        self.softmax_like(OpTag::Softmax, axis)
    }

    pub fn log_softmax(&self, axis: isize) -> Result<Tensor> {
        self.softmax_like(OpTag::LogSoftmax, axis)
    }

    // ---- reductions -----------------------------------------------------

    fn reduce(&self, op: OpTag, axes: Option<&[isize]>, keep_dims: bool, out_dtype: DType) -> Result<Tensor> {
        self.check_alive()?;
        let (out_shape, normalized_axes) = shape::reduce_shape(self.descriptor.shape(), axes, keep_dims)?;
        let src = self.cast(out_dtype, &ConvertPolicy::permissive())?;
        let output = StorageDescriptor::owned(out_dtype, out_shape);
        let params = OpParams::Reduce { axes: Some(normalized_axes), keep_dims };
        let (out_descriptor, out_handle) =
            dispatch::dispatch(self.backend.as_ref(), op, output, &[(src.descriptor.clone(), src.handle.clone())], params)?;
        Ok(Tensor::with(self.backend.clone(), out_handle, out_descriptor))
    }

    pub fn sum(&self, axes: Option<&[isize]>, keep_dims: bool) -> Result<Tensor> {
        self.reduce(OpTag::Sum, axes, keep_dims, self.descriptor.dtype)
    }

    pub fn mean(&self, axes: Option<&[isize]>, keep_dims: bool) -> Result<Tensor> {
        self.reduce(OpTag::Mean, axes, keep_dims, self.descriptor.dtype.to_float())
    }

    pub fn max(&self, axes: Option<&[isize]>, keep_dims: bool) -> Result<Tensor> {
        self.reduce(OpTag::Max, axes, keep_dims, self.descriptor.dtype)
    }

    pub fn min(&self, axes: Option<&[isize]>, keep_dims: bool) -> Result<Tensor> {
        self.reduce(OpTag::Min, axes, keep_dims, self.descriptor.dtype)
    }

    // ---- view ops -----------------------------------------------------

    fn with_layout_view(&self, layout: Layout) -> Tensor {
        Tensor::with(self.backend.clone(), self.handle.clone(), self.descriptor.view(layout))
    }

    fn materialize_into(&self, new_shape: Shape) -> Result<Tensor> {
        let (handle, _layout) =
            dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?;
        let descriptor = self.descriptor.view(Layout::contiguous(new_shape));
        Ok(Tensor::with(self.backend.clone(), handle, descriptor))
    }

    pub fn reshape(&self, dims: &[isize]) -> Result<Tensor> {
        self.check_alive()?;
        let resolved = shape::resolve_view_dims(dims, self.descriptor.size())?;
        let new_shape = Shape::new(resolved)?;
        match self.descriptor.layout.reshape_view(&new_shape)? {
            Some(layout) => Ok(self.with_layout_view(layout)),
            None => self.materialize_into(new_shape),
        }
    }

    /// Like [`Tensor::reshape`], but always ensures a contiguous buffer
    /// first rather than leaving that decision to `reshape_view`: the two
    /// converge on the same result, `view` just names the intent that the
    /// input is expected to already be contiguous (§4.G).
    pub fn view(&self, dims: &[isize]) -> Result<Tensor> {
        self.check_alive()?;
        let resolved = shape::resolve_view_dims(dims, self.descriptor.size())?;
        let new_shape = Shape::new(resolved)?;
        let (handle, layout) = if self.descriptor.c_contiguous() {
            (self.handle.clone(), self.descriptor.layout.clone())
        } else {
            dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?
        };
        let view_layout = layout.reshape_view(&new_shape)?.expect("freshly materialized layout is contiguous");
        Ok(Tensor::with(self.backend.clone(), handle, self.descriptor.view(view_layout)))
    }

    pub fn transpose(&self, d1: usize, d2: usize) -> Result<Tensor> {
        self.check_alive()?;
        let layout = self.descriptor.layout.transpose(d1, d2)?;
        Ok(self.with_layout_view(layout))
    }

    pub fn transpose_last_two(&self) -> Result<Tensor> {
        self.check_alive()?;
        Ok(self.with_layout_view(self.descriptor.layout.transpose_last_two()))
    }

    pub fn permute(&self, axes: &[isize]) -> Result<Tensor> {
        self.check_alive()?;
        let layout = self.descriptor.layout.permute(axes)?;
        Ok(self.with_layout_view(layout))
    }

    /// Always materializes (§4.E): unlike the other view ops, slicing
    /// produces an owned, contiguous copy rather than a strided view.
    pub fn slice(&self, axes: &[SliceAxis]) -> Result<Tensor> {
        self.check_alive()?;
        let sliced = self.descriptor.layout.slice(axes)?;
        let (handle, layout) = dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &sliced, self.descriptor.dtype)?;
        let descriptor = StorageDescriptor::owned(self.descriptor.dtype, layout.shape().clone());
        Ok(Tensor::with(self.backend.clone(), handle, descriptor))
    }

    // ---- read-back ------------------------------------------------------

    fn read_logical_scalars(&self) -> Result<Vec<Scalar>> {
        let (handle, layout) = if self.descriptor.c_contiguous() {
            (self.handle.clone(), self.descriptor.layout.clone())
        } else {
            dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?
        };
        let raw = self.backend.read(&handle)?;
        let sz = self.descriptor.dtype.byte_size();
        Ok((0..layout.elem_count()).map(|i| cpu_backend::decode_scalar(self.descriptor.dtype, &raw[i * sz..(i + 1) * sz])).collect())
    }

    /// Reconstructs the nested array structure, honoring strides and
    /// offset by first reading the tensor in logical (row-major) order.
    pub fn to_nested(&self) -> Result<Nested> {
        self.check_alive()?;
        let values = self.read_logical_scalars()?;
        Ok(build_nested(self.descriptor.shape().dims(), &mut values.into_iter()))
    }

    /// Succeeds iff `size() == 1`, returning the sole element regardless of
    /// rank (a `[1,1,1]` tensor and a scalar both return their one value).
    pub fn item(&self) -> Result<Scalar> {
        self.check_alive()?;
        if self.descriptor.size() != 1 {
            return Err(Error::ShapeMismatch {
                op: "item",
                lhs: self.descriptor.shape().clone(),
                rhs: Shape::scalar(),
            });
        }
        Ok(self.read_logical_scalars()?[0])
    }

    /// A human-readable multi-line rendering with truncation beyond 1000
    /// elements (edge items = 3 per truncated axis).
    pub fn format(&self) -> Result<String> {
        self.check_alive()?;
        let values = self.read_logical_scalars()?;
        Ok(crate::display::format_nested(self.descriptor.shape().dims(), &values))
    }

    // ---- device / lifecycle ------------------------------------------

    /// Round-trips through host bytes when `backend` differs from the
    /// current one; a no-op move returns a cheap shared-handle copy.
    pub fn move_to(&self, backend: Arc<dyn Backend>) -> Result<Tensor> {
        self.check_alive()?;
        if backend.id() == self.backend.id() {
            return Ok(self.share());
        }
        let (handle, layout) = if self.descriptor.c_contiguous() {
            (self.handle.clone(), self.descriptor.layout.clone())
        } else {
            dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?
        };
        let bytes = self.backend.read(&handle)?;
        let new_handle = backend.allocate_with_buffer(&bytes)?;
        Ok(Tensor::with(backend, new_handle, StorageDescriptor::owned(self.descriptor.dtype, layout.shape().clone())))
    }

    /// Always a deep copy through backend read/allocate/write (§4.G):
    /// decouples the result from the source's `Arc`-shared buffer even
    /// when the source is a view.
    pub fn clone(&self) -> Result<Tensor> {
        self.check_alive()?;
        let (handle, layout) = dispatch::materialize_contiguous(self.backend.as_ref(), &self.handle, &self.descriptor.layout, self.descriptor.dtype)?;
        Ok(Tensor::with(self.backend.clone(), handle, StorageDescriptor::owned(self.descriptor.dtype, layout.shape().clone())))
    }

    /// Idempotent: a second `dispose` call is a no-op, never an error.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        self.backend.dispose(&self.handle)?;
        self.disposed.set(true);
        Ok(())
    }
}

fn build_nested(dims: &[usize], values: &mut impl Iterator<Item = Scalar>) -> Nested {
    match dims.split_first() {
        None => Nested::Scalar(values.next().expect("element count matches shape")),
        Some((&len, rest)) => Nested::List((0..len).map(|_| build_nested(rest, values)).collect()),
    }
}
