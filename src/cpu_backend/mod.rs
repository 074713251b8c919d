//! The reference CPU backend: the one concrete implementation of
//! [`crate::backend::Backend`] this crate ships. It is intentionally the
//! "obviously correct, not obviously fast" backend the spec frames as an
//! external collaborator (§1) — a real deployment would plug in a vectorized
//! or GPU backend behind the same trait.

mod elem;
mod kernels;

use crate::backend::{Backend, Handle};
use crate::device::Device;
use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};
use crate::op::{OpParams, OpTag, OperationDescriptor};
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) use elem::CpuElement;

/// A CPU backend instance. Multiple instances may coexist (e.g. isolated
/// arenas in tests); `id` is what [`crate::device::Device`] compares to
/// decide whether two tensors may interact.
#[derive(Debug)]
pub struct CpuBackend {
    id: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self { id: NEXT_ID.fetch_add(1, Ordering::Relaxed) }
    }

    pub fn device(&self) -> Device {
        Device::cpu_with_id(self.id)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn id(&self) -> u64 {
        self.id
    }

    fn allocate(&self, byte_len: usize) -> Result<Handle> {
        Ok(Handle::new(vec![0u8; byte_len]))
    }

    fn write(&self, handle: &Handle, bytes: &[u8]) -> Result<()> {
        let mut guard = handle.buffer().write().expect("handle lock poisoned");
        if guard.len() != bytes.len() {
            *guard = bytes.to_vec();
        } else {
            guard.copy_from_slice(bytes);
        }
        Ok(())
    }

    fn read(&self, handle: &Handle) -> Result<Vec<u8>> {
        Ok(handle.buffer().read().expect("handle lock poisoned").clone())
    }

    fn dispose(&self, _handle: &Handle) -> Result<()> {
        // Memory is reclaimed by `Arc`'s refcount once the last Tensor (and
        // any view derived from it) drops its handle; there is nothing else
        // to release for an in-process backend. Kept as a real call so a
        // backend with an external allocator (e.g. a GPU arena) has a place
        // to hook in.
        Ok(())
    }

    fn supports_non_contiguous(&self, _op: OpTag) -> bool {
        // This reference backend always requires contiguous inputs; the
        // dispatcher materializes a contiguous copy of anything else before
        // calling `execute`.
        false
    }

    fn execute(&self, descriptor: &OperationDescriptor, inputs: &[Handle]) -> Result<Handle> {
        kernels::execute(descriptor, inputs, self)
    }
}

macro_rules! with_cpu_element {
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

fn scalar_as<T: CpuElement>(value: &Scalar) -> T {
    match value {
        Scalar::Bool(b) => T::from_i128(if *b { 1 } else { 0 }),
        Scalar::BigInt(v) => T::from_i128(*v),
        Scalar::Number(v) => {
            if T::DTYPE.is_float() {
                T::from_f64(*v)
            } else {
                T::from_i128(v.trunc() as i128)
            }
        }
    }
}

/// Encodes a single logical value into `dtype`'s buffer representation.
/// Used by the tensor facade (`from_nested`, `zeros`/`ones`/`identity`, and
/// dtype casts) to turn scalars into raw bytes without duplicating the
/// per-dtype dispatch kernels already use.
pub(crate) fn encode_scalar(dtype: DType, value: &Scalar) -> Vec<u8> {
    let mut out = vec![0u8; dtype.byte_size()];
    with_cpu_element!(dtype, T, {
        let v: T = scalar_as(value);
        v.write(&mut out);
    });
    out
}

/// Decodes one dtype-sized slice back into a logical [`Scalar`].
pub(crate) fn decode_scalar(dtype: DType, bytes: &[u8]) -> Scalar {
    with_cpu_element!(dtype, T, {
        let v = T::read(bytes);
        if T::DTYPE.is_bool() {
            Scalar::Bool(v.to_i128() != 0)
        } else if T::DTYPE.is_float() {
            Scalar::Number(v.to_f64())
        } else {
            Scalar::BigInt(v.to_i128())
        }
    })
}

pub(crate) fn unsupported(dtype: DType, op: OpTag) -> Error {
    Error::UnsupportedDTypeForOp(dtype, op.name())
}

pub(crate) fn params_reduce(params: &OpParams) -> Result<(Option<&[usize]>, bool)> {
    match params {
        OpParams::Reduce { axes, keep_dims } => Ok((axes.as_deref(), *keep_dims)),
        _ => crate::bail!("reduction op missing Reduce params"),
    }
}

pub(crate) fn params_axis(params: &OpParams) -> Result<usize> {
    match params {
        OpParams::Axis(axis) => Ok(*axis),
        _ => crate::bail!("softmax op missing Axis params"),
    }
}
