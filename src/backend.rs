//! The backend boundary (component F, second half): the interface a
//! pluggable backend implements, and the opaque device-data handle tensors
//! own. §5 identifies `read`, `write`, `execute` and `move_to` as the only
//! suspension points; everything between them is synchronous and coherent.

use crate::dtype::DType;
use crate::error::Result;
use crate::op::{OpTag, OperationDescriptor};
use std::sync::{Arc, RwLock};

/// Opaque device-data handle. Cloning a `Handle` shares the same underlying
/// buffer (an `Arc`), which is exactly how views share memory with their
/// producer (§5): writing through one clone is visible to all others on the
/// next `read`.
#[derive(Debug, Clone)]
pub struct Handle {
    buffer: Arc<RwLock<Vec<u8>>>,
}

impl Handle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { buffer: Arc::new(RwLock::new(bytes)) }
    }

    pub(crate) fn buffer(&self) -> &RwLock<Vec<u8>> {
        &self.buffer
    }

    /// Whether two handles are the very same allocation (used by views to
    /// assert they indeed share memory with their producer).
    pub fn same_allocation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

/// What a backend must provide to plug into the dispatcher. `allocate`,
/// `write`, `read`, `dispose` and `execute` are the suspension points of the
/// single-threaded cooperative scheduling model (§5); between them every
/// descriptor is immutable and safe to read from multiple in-flight chains.
pub trait Backend: std::fmt::Debug + Send + Sync {
    /// Identity: two tensors may only interact (e.g. as operands of the same
    /// binary op) when they report the same `id`.
    fn id(&self) -> u64;

    fn allocate(&self, byte_len: usize) -> Result<Handle>;

    /// Optional fast path: allocate and initialize in one call. The default
    /// implementation is just `allocate` followed by `write`.
    fn allocate_with_buffer(&self, bytes: &[u8]) -> Result<Handle> {
        let handle = self.allocate(bytes.len())?;
        self.write(&handle, bytes)?;
        Ok(handle)
    }

    fn write(&self, handle: &Handle, bytes: &[u8]) -> Result<()>;

    fn read(&self, handle: &Handle) -> Result<Vec<u8>>;

    fn dispose(&self, handle: &Handle) -> Result<()>;

    /// Executes `descriptor`, returning the output handle. `inputs` are
    /// positionally aligned with `descriptor.inputs`.
    fn execute(&self, descriptor: &OperationDescriptor, inputs: &[Handle]) -> Result<Handle>;

    /// Whether this backend's kernel for `op` can consume non-contiguous
    /// inputs directly. The dispatcher inserts a contiguity coercion ahead
    /// of `execute` whenever this returns `false` and an input isn't
    /// already contiguous.
    fn supports_non_contiguous(&self, op: OpTag) -> bool;

    fn dtype_supported(&self, _dtype: DType) -> bool {
        true
    }
}
