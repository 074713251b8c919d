//! The flat error taxonomy shared by every module in this crate.
//!
//! Every fallible entry point returns [`Result<T>`] with a single [`Error`]
//! variant describing what went wrong; there are no partial successes and no
//! second, separate "warnings" channel mixed into the error type (conversion
//! warnings travel alongside an `Ok` value instead, see [`crate::convert`]).

use crate::dtype::DType;
use crate::shape::Shape;

pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Each variant carries the context (dtype, shape, value, index) needed to
/// format a diagnostic without the caller having to reconstruct it.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown dtype '{0}'")]
    UnknownDType(String),

    #[error("value {value} is not a valid {dtype:?}")]
    DTypeValidation { value: String, dtype: DType },

    #[error("dtype mismatch in {op}: lhs {lhs:?}, rhs {rhs:?}")]
    DTypeMismatchBinaryOp { op: &'static str, lhs: DType, rhs: DType },

    #[error("unsupported dtype {0:?} for op {1}")]
    UnsupportedDTypeForOp(DType, &'static str),

    #[error("buffer offset {offset} is not aligned to the {byte_size}-byte element size of {dtype:?}")]
    BufferAlignment { offset: usize, byte_size: usize, dtype: DType },

    #[error("index {index} out of bounds for axis of length {length}")]
    Bounds { index: isize, length: usize },

    #[error("shape mismatch in {op}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch { op: &'static str, lhs: Shape, rhs: Shape },

    #[error("rank {rank} exceeds the maximum supported rank of {max}")]
    RankExceeded { rank: usize, max: usize },

    #[error("cannot reshape {from:?} ({from_elems} elements) into {to:?} ({to_elems} elements)")]
    ReshapeMismatch {
        from: Shape,
        to: Shape,
        from_elems: usize,
        to_elems: usize,
    },

    #[error("ambiguous view target {dims:?}: {reason}")]
    ViewAmbiguous { dims: Vec<isize>, reason: &'static str },

    #[error("slice step of 0 is not allowed on axis {axis}")]
    SliceStepZero { axis: usize },

    #[error("permutation {axes:?} contains a duplicate axis after normalization")]
    PermutationDuplicate { axes: Vec<isize> },

    #[error("ragged nested data: axis {axis} has inconsistent lengths ({expected} vs {got})")]
    InconsistentDimensions { axis: usize, expected: usize, got: usize },

    #[error("converting {value} from {from:?} to {to:?} loses precision")]
    ConversionPrecisionLoss { value: String, from: DType, to: DType },

    #[error("converting {value} from {from:?} to {to:?} overflows the target range")]
    ConversionOverflow { value: String, from: DType, to: DType },

    #[error("converting special value {value} from {from:?} to {to:?} is not permitted by policy")]
    ConversionSpecialValue { value: String, from: DType, to: DType },

    #[error("element {index}: {source}")]
    ConversionElement { index: usize, source: Box<Error> },

    #[error("tensors live on different devices: {lhs:?} vs {rhs:?}")]
    DeviceMismatch { lhs: crate::device::DeviceLocation, rhs: crate::device::DeviceLocation },

    #[error("use of tensor after it was disposed")]
    UseAfterDispose,

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("{op} requires at least one tensor")]
    OpRequiresAtLeastOneTensor { op: &'static str },

    #[error("promotion table is inconsistent: {0}")]
    PromotionTableInvalid(String),
}

/// Shorthand matching the teacher's `bail!` idiom: builds an [`Error::BackendError`]
/// from a format string and returns it.
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::Error::BackendError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::Error::BackendError(format!($err)))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::Error::BackendError(format!($fmt, $($arg)*)))
    };
}
