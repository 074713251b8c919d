//! A small tensor computation kernel: eleven numeric dtypes, NumPy-compatible
//! type promotion, shape/stride/layout tracking with broadcasting, and a
//! backend-dispatched operation graph, wrapped in a single user-facing
//! [`Tensor`] type.
//!
//! The reference [`cpu_backend::CpuBackend`] is the only concrete backend
//! this crate ships — a real deployment plugs a vectorized or GPU backend in
//! behind the same [`backend::Backend`] trait. Everything above that trait
//! (promotion, conversion, shape algebra, dispatch, the tensor facade) is
//! backend-agnostic.

pub mod backend;
pub mod convert;
pub mod cpu_backend;
mod dispatch;
pub mod device;
mod display;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod op;
pub mod promotion;
pub mod shape;
mod tensor;

pub use dtype::{DType, Scalar};
pub use error::{Error, Result};
pub use tensor::{CreateOptions, Nested, Tensor};

/// Common imports for working with this crate: `use tensorkit::prelude::*;`.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::convert::ConvertPolicy;
    pub use crate::cpu_backend::CpuBackend;
    pub use crate::dtype::{DType, Scalar};
    pub use crate::error::{Error, Result};
    pub use crate::tensor::{CreateOptions, Nested, Tensor};
}
