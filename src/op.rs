//! Operation records (component F, first half): the immutable
//! `(op-tag, output-descriptor, inputs, params?)` record the dispatcher
//! builds for every tensor operation and hands to a backend's `execute`.

use crate::layout::StorageDescriptor;
use crate::shape::{Shape, SliceAxis};

/// The operation tags the core dispatches, §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Create,
    Neg,
    Abs,
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
    Square,
    Add,
    Sub,
    Mul,
    Div,
    Reshape,
    View,
    Slice,
    Transpose,
    Permute,
    Matmul,
    Softmax,
    LogSoftmax,
    Sum,
    Mean,
    Max,
    Min,
}

impl OpTag {
    pub fn name(self) -> &'static str {
        use OpTag::*;
        match self {
            Create => "create",
            Neg => "neg",
            Abs => "abs",
            Sin => "sin",
            Cos => "cos",
            Exp => "exp",
            Log => "log",
            Sqrt => "sqrt",
            Square => "square",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Reshape => "reshape",
            View => "view",
            Slice => "slice",
            Transpose => "transpose",
            Permute => "permute",
            Matmul => "matmul",
            Softmax => "softmax",
            LogSoftmax => "log_softmax",
            Sum => "sum",
            Mean => "mean",
            Max => "max",
            Min => "min",
        }
    }
}

/// The op-specific payload carried in an [`OperationDescriptor`]'s `params`
/// slot: axis indices for softmax/reductions, permutation axes, slice
/// specifiers, or reshape targets.
#[derive(Debug, Clone)]
pub enum OpParams {
    None,
    /// The normalized axis `softmax`/`log_softmax` operate along.
    Axis(usize),
    /// Reduction axes (already normalized; `None` means "all axes") and
    /// whether reduced dims are kept as size-1.
    Reduce { axes: Option<Vec<usize>>, keep_dims: bool },
    Permute(Vec<isize>),
    Slice(Vec<SliceAxis>),
    Reshape(Shape),
}

/// The immutable record passed to a backend's `execute`. Built once by the
/// dispatcher and never mutated afterwards; the dispatcher may rebuild a new
/// one (with different `inputs`) when it inserts a contiguity coercion.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub op: OpTag,
    pub output: StorageDescriptor,
    pub inputs: Vec<StorageDescriptor>,
    pub params: OpParams,
}

impl OperationDescriptor {
    pub fn new(op: OpTag, output: StorageDescriptor, inputs: Vec<StorageDescriptor>, params: OpParams) -> Self {
        Self { op, output, inputs, params }
    }
}
