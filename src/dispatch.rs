//! The pre-dispatch contiguity-coercion rewriter (§4.F, §5). Kept separate
//! from the op executor so a backend author only ever has to think about
//! contiguous buffers, as the design notes ask.

use crate::backend::{Backend, Handle};
use crate::dtype::DType;
use crate::error::Result;
use crate::layout::{Layout, StorageDescriptor};
use crate::op::{OpParams, OpTag, OperationDescriptor};
use crate::shape::Shape;

/// Reads a handle's bytes straight into a fresh, contiguous copy laid out in
/// logical (row-major) order. Plain `read` + `allocate_with_buffer`, not an
/// `execute` call: no op math happens here. Used both by contiguity
/// coercion and by slice materialization (§4.E mandates materializing
/// slices rather than returning a strided view).
pub(crate) fn materialize_contiguous(backend: &dyn Backend, handle: &Handle, layout: &Layout, dtype: DType) -> Result<(Handle, Layout)> {
    let elem_size = dtype.byte_size();
    let src = backend.read(handle)?;
    let dims = layout.dims();
    let stride = layout.stride();
    let n = layout.elem_count();
    let mut out = vec![0u8; n * elem_size];
    if n == 0 {
        let h = backend.allocate_with_buffer(&out)?;
        return Ok((h, Layout::contiguous(Shape::from_dims_unchecked(dims.to_vec()))));
    }
    let mut index = vec![0usize; dims.len()];
    for out_pos in 0..n {
        let mut src_offset = layout.start_offset() as isize;
        for (axis, &idx) in index.iter().enumerate() {
            src_offset += idx as isize * stride[axis];
        }
        let src_byte = src_offset as usize * elem_size;
        let dst_byte = out_pos * elem_size;
        out[dst_byte..dst_byte + elem_size].copy_from_slice(&src[src_byte..src_byte + elem_size]);
        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            if index[axis] < dims[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    let handle = backend.allocate_with_buffer(&out)?;
    Ok((handle, Layout::contiguous(Shape::from_dims_unchecked(dims.to_vec()))))
}

fn ensure_contiguous(backend: &dyn Backend, op: OpTag, descriptor: &StorageDescriptor, handle: &Handle) -> Result<(StorageDescriptor, Handle)> {
    if backend.supports_non_contiguous(op) || descriptor.c_contiguous() {
        return Ok((descriptor.clone(), handle.clone()));
    }
    let (new_handle, new_layout) = materialize_contiguous(backend, handle, &descriptor.layout, descriptor.dtype)?;
    Ok((StorageDescriptor::owned(descriptor.dtype, new_layout.shape().clone()), new_handle))
}

/// Builds the `OperationDescriptor` for `op`, coercing any non-contiguous
/// input first, then hands it to the backend. Returns the output descriptor
/// paired with the handle the backend produced.
pub(crate) fn dispatch(
    backend: &dyn Backend,
    op: OpTag,
    output: StorageDescriptor,
    inputs: &[(StorageDescriptor, Handle)],
    params: OpParams,
) -> Result<(StorageDescriptor, Handle)> {
    let mut coerced_descriptors = Vec::with_capacity(inputs.len());
    let mut coerced_handles = Vec::with_capacity(inputs.len());
    for (descriptor, handle) in inputs {
        let (d, h) = ensure_contiguous(backend, op, descriptor, handle)?;
        coerced_descriptors.push(d);
        coerced_handles.push(h);
    }
    let descriptor = OperationDescriptor::new(op, output.clone(), coerced_descriptors, params);
    let out_handle = backend.execute(&descriptor, &coerced_handles)?;
    Ok((output, out_handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_backend::CpuBackend;
    use crate::shape::SliceAxis;

    #[test]
    fn materialize_reversed_slice_walks_backward_without_overflow() {
        let backend = CpuBackend::new();
        let bytes: Vec<u8> = (0..5i32).flat_map(|v| v.to_le_bytes()).collect();
        let handle = backend.allocate_with_buffer(&bytes).unwrap();
        let layout = Layout::contiguous(Shape::from(vec![5]));
        let reversed = layout.slice(&[SliceAxis::Range { start: None, stop: None, step: Some(-1) }]).unwrap();

        let (out_handle, out_layout) = materialize_contiguous(&backend, &handle, &reversed, DType::I32).unwrap();
        assert_eq!(out_layout.dims(), &[5]);
        let out_bytes = backend.read(&out_handle).unwrap();
        let values: Vec<i32> = out_bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(values, vec![4, 3, 2, 1, 0]);
    }
}
