//! Per-op numeric kernels. Every kernel here assumes its inputs are already
//! contiguous and already share the op's output dtype — both guaranteed by
//! the dispatcher (promotion/conversion happens in the facade, contiguity
//! coercion happens before `execute` is ever called, see
//! [`crate::dispatch`]).

use super::elem::CpuElement;
use super::{params_axis, params_reduce, unsupported};
use crate::backend::{Backend, Handle};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::op::{OpTag, OperationDescriptor};

macro_rules! with_element {
    ($dtype:expr, $T:ident, $body:block) => {
        match $dtype {
            DType::Bool => {
                type $T = bool;
                $body
            }
            DType::I8 => {
                type $T = i8;
                $body
            }
            DType::U8 => {
                type $T = u8;
                $body
            }
            DType::I16 => {
                type $T = i16;
                $body
            }
            DType::U16 => {
                type $T = u16;
                $body
            }
            DType::I32 => {
                type $T = i32;
                $body
            }
            DType::U32 => {
                type $T = u32;
                $body
            }
            DType::I64 => {
                type $T = i64;
                $body
            }
            DType::U64 => {
                type $T = u64;
                $body
            }
            DType::F32 => {
                type $T = f32;
                $body
            }
            DType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

fn elem_count(bytes: &[u8], dtype: DType) -> usize {
    bytes.len() / dtype.byte_size()
}

fn read_at<T: CpuElement>(bytes: &[u8], i: usize) -> T {
    let sz = std::mem::size_of::<T>();
    T::read(&bytes[i * sz..(i + 1) * sz])
}

fn write_at<T: CpuElement>(bytes: &mut [u8], i: usize, v: T) {
    let sz = std::mem::size_of::<T>();
    v.write(&mut bytes[i * sz..(i + 1) * sz]);
}

fn map_unary<T: CpuElement>(input: &[u8], int_f: impl Fn(i128) -> i128, float_f: impl Fn(f64) -> f64) -> Vec<u8> {
    let n = elem_count(input, T::DTYPE);
    let mut out = vec![0u8; input.len()];
    for i in 0..n {
        let v: T = read_at(input, i);
        let r = if T::DTYPE.is_float() {
            T::from_f64(float_f(v.to_f64()))
        } else {
            T::from_i128(int_f(v.to_i128()))
        };
        write_at(&mut out, i, r);
    }
    out
}

fn map_binary<T: CpuElement>(lhs: &[u8], rhs: &[u8], int_f: impl Fn(i128, i128) -> i128, float_f: impl Fn(f64, f64) -> f64) -> Vec<u8> {
    let n = elem_count(lhs, T::DTYPE);
    let mut out = vec![0u8; lhs.len()];
    for i in 0..n {
        let a: T = read_at(lhs, i);
        let b: T = read_at(rhs, i);
        let r = if T::DTYPE.is_float() {
            T::from_f64(float_f(a.to_f64(), b.to_f64()))
        } else {
            T::from_i128(int_f(a.to_i128(), b.to_i128()))
        };
        write_at(&mut out, i, r);
    }
    out
}

pub(super) fn execute(descriptor: &OperationDescriptor, inputs: &[Handle], backend: &dyn Backend) -> Result<Handle> {
    use OpTag::*;
    let out_dtype = descriptor.output.dtype;
    let bytes: Vec<Vec<u8>> = inputs.iter().map(|h| backend.read(h)).collect::<Result<_>>()?;

    let out_bytes = match descriptor.op {
        Create | Reshape | View | Slice | Transpose | Permute => {
            return Err(Error::BackendError(format!("{} never reaches the backend", descriptor.op.name())));
        }
        Neg => with_element!(out_dtype, T, { map_unary::<T>(&bytes[0], |v| -v, |v| -v) }),
        Abs => with_element!(out_dtype, T, { map_unary::<T>(&bytes[0], |v| v.abs(), |v| v.abs()) }),
        Square => with_element!(out_dtype, T, { map_unary::<T>(&bytes[0], |v| v.saturating_mul(v), |v| v * v) }),
        Sin => float_unary(out_dtype, &bytes[0], f64::sin, f32::sin, Sin)?,
        Cos => float_unary(out_dtype, &bytes[0], f64::cos, f32::cos, Cos)?,
        Exp => float_unary(out_dtype, &bytes[0], f64::exp, f32::exp, Exp)?,
        Log => float_unary(out_dtype, &bytes[0], f64::ln, f32::ln, Log)?,
        Sqrt => float_unary(out_dtype, &bytes[0], f64::sqrt, f32::sqrt, Sqrt)?,
        Add => with_element!(out_dtype, T, { map_binary::<T>(&bytes[0], &bytes[1], |a, b| a.wrapping_add(b), |a, b| a + b) }),
        Sub => with_element!(out_dtype, T, { map_binary::<T>(&bytes[0], &bytes[1], |a, b| a.wrapping_sub(b), |a, b| a - b) }),
        Mul => with_element!(out_dtype, T, { map_binary::<T>(&bytes[0], &bytes[1], |a, b| a.wrapping_mul(b), |a, b| a * b) }),
        Div => with_element!(out_dtype, T, {
            map_binary::<T>(&bytes[0], &bytes[1], |a, b| if b == 0 { 0 } else { a.wrapping_div(b) }, |a, b| a / b)
        }),
        Matmul => matmul(descriptor, &bytes)?,
        Softmax => softmax(descriptor, &bytes[0], false)?,
        LogSoftmax => softmax(descriptor, &bytes[0], true)?,
        Sum | Mean | Max | Min => reduce(descriptor, &bytes[0])?,
    };
    backend.allocate_with_buffer(&out_bytes)
}

fn float_unary(dtype: DType, input: &[u8], f64_fn: fn(f64) -> f64, f32_fn: fn(f32) -> f32, op: OpTag) -> Result<Vec<u8>> {
    match dtype {
        DType::F32 => {
            let n = elem_count(input, dtype);
            let mut out = vec![0u8; input.len()];
            for i in 0..n {
                let v: f32 = read_at(input, i);
                write_at(&mut out, i, f32_fn(v));
            }
            Ok(out)
        }
        DType::F64 => {
            let n = elem_count(input, dtype);
            let mut out = vec![0u8; input.len()];
            for i in 0..n {
                let v: f64 = read_at(input, i);
                write_at(&mut out, i, f64_fn(v));
            }
            Ok(out)
        }
        other => Err(unsupported(other, op)),
    }
}

fn c_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn reduce(descriptor: &OperationDescriptor, input: &[u8]) -> Result<Vec<u8>> {
    let in_shape = descriptor.inputs[0].shape();
    let dims = in_shape.dims();
    let (axes, _keep_dims) = params_reduce(&descriptor.params)?;
    let reduced: Vec<usize> = match axes {
        Some(a) => a.to_vec(),
        None => (0..dims.len()).collect(),
    };
    let out_dims: Vec<usize> = dims.iter().enumerate().filter(|(a, _)| !reduced.contains(a)).map(|(_, &d)| d).collect();
    let out_strides = c_strides(&out_dims);
    let out_count: usize = out_dims.iter().product::<usize>().max(1);
    let reduced_count: usize = reduced.iter().map(|&a| dims[a]).product::<usize>().max(1);

    let in_dtype = descriptor.inputs[0].dtype;
    let out_dtype = descriptor.output.dtype;
    let n = in_shape.elem_count();

    let mut sums = vec![0f64; out_count];
    let mut extrema: Vec<Option<f64>> = vec![None; out_count];
    let mut index = vec![0usize; dims.len()];
    for flat in 0..n {
        let mut out_flat = 0usize;
        let mut kept = 0usize;
        for (axis, &idx) in index.iter().enumerate() {
            if !reduced.contains(&axis) {
                out_flat += idx * out_strides[kept];
                kept += 1;
            }
        }
        let v = with_element!(in_dtype, T, {
            let bytes_v: T = read_at(input, flat);
            bytes_v.to_f64()
        });
        sums[out_flat] += v;
        extrema[out_flat] = Some(match extrema[out_flat] {
            None => v,
            Some(cur) => match descriptor.op {
                OpTag::Max => cur.max(v),
                _ => cur.min(v),
            },
        });
        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            if index[axis] < dims[axis] {
                break;
            }
            index[axis] = 0;
        }
    }

    let mut out = vec![0u8; out_count * out_dtype.byte_size()];
    with_element!(out_dtype, T, {
        for i in 0..out_count {
            let v = match descriptor.op {
                OpTag::Sum => sums[i],
                OpTag::Mean => sums[i] / reduced_count as f64,
                OpTag::Max | OpTag::Min => extrema[i].unwrap_or(0.0),
                _ => unreachable!("reduce only handles Sum/Mean/Max/Min"),
            };
            write_at::<T>(&mut out, i, T::from_f64(v));
        }
    });
    Ok(out)
}

fn softmax(descriptor: &OperationDescriptor, input: &[u8], log: bool) -> Result<Vec<u8>> {
    let dtype = descriptor.output.dtype;
    let dims = descriptor.inputs[0].shape().dims().to_vec();
    let axis = params_axis(&descriptor.params)?;
    let strides = c_strides(&dims);
    let axis_len = dims[axis];
    let axis_stride = strides[axis];
    let n = dims.iter().product::<usize>();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut out = vec![0u8; input.len()];
    // Iterate over every index with `axis` fixed at 0, then walk the axis.
    let mut index = vec![0usize; dims.len()];
    let row_count: usize = n / axis_len.max(1);
    for _ in 0..row_count {
        let base: usize = index.iter().enumerate().map(|(a, &i)| if a == axis { 0 } else { i * strides[a] }).sum();
        let row_values: Vec<f64> =
            with_element!(dtype, T, { (0..axis_len).map(|k| read_at::<T>(input, base + k * axis_stride).to_f64()).collect() });
        let max = row_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = row_values.iter().map(|&v| (v - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        with_element!(dtype, T, {
            for (k, &e) in exps.iter().enumerate() {
                let v = if log { row_values[k] - max - sum.ln() } else { e / sum };
                write_at::<T>(&mut out, base + k * axis_stride, T::from_f64(v));
            }
        });
        // advance `index` over every axis except `axis`.
        for a in (0..dims.len()).rev() {
            if a == axis {
                continue;
            }
            index[a] += 1;
            if index[a] < dims[a] {
                break;
            }
            index[a] = 0;
        }
    }
    Ok(out)
}

fn matmul(descriptor: &OperationDescriptor, bytes: &[Vec<u8>]) -> Result<Vec<u8>> {
    let lhs_shape = descriptor.inputs[0].shape().dims().to_vec();
    let rhs_shape = descriptor.inputs[1].shape().dims().to_vec();
    let dtype = descriptor.output.dtype;

    // `m`/`n` are 1 whenever the matching operand is a bare vector (no row
    // or column dimension of its own, per the NumPy matmul rules in
    // `shape::matmul_shape`); each operand's own batch count broadcasts
    // against the wider of the two.
    let m = if lhs_shape.len() >= 2 { lhs_shape[lhs_shape.len() - 2] } else { 1 };
    let n = if rhs_shape.len() >= 2 { *rhs_shape.last().unwrap() } else { 1 };
    let k = *lhs_shape.last().unwrap();
    let lhs_batch: usize = if lhs_shape.len() >= 2 { lhs_shape[..lhs_shape.len() - 2].iter().product() } else { 1 };
    let rhs_batch: usize = if rhs_shape.len() >= 2 { rhs_shape[..rhs_shape.len() - 2].iter().product() } else { 1 };
    let batch = lhs_batch.max(rhs_batch).max(1);

    let lhs = &bytes[0];
    let rhs = &bytes[1];
    let mut out = vec![0u8; batch * m * n * dtype.byte_size()];
    with_element!(dtype, T, {
        for b in 0..batch {
            let lhs_base = (b % lhs_batch.max(1)) * m * k;
            let rhs_base = (b % rhs_batch.max(1)) * k * n;
            let out_base = b * m * n;
            for i in 0..m {
                for j in 0..n {
                    let mut acc = 0f64;
                    for p in 0..k {
                        let a: T = read_at(lhs, lhs_base + i * k + p);
                        let c: T = read_at(rhs, rhs_base + p * n + j);
                        acc += a.to_f64() * c.to_f64();
                    }
                    write_at::<T>(&mut out, out_base + i * n + j, T::from_f64(acc));
                }
            }
        }
    });
    Ok(out)
}
