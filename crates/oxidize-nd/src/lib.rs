//! # OxidizeND
//!
//! Strided N-dimensional arrays in pure Rust.
//!
//! ## Modules
//!
//! - **core**: Shapes, strided layouts, storages (dense or adapted from an
//!   existing sequence), iteration orders, zero-copy views, broadcasting,
//!   element-wise arithmetic, reductions and chunked parallel execution
//! - **linalg**: Eigendecomposition, LU (determinant, inverse, solve) and
//!   Cholesky decompositions

/// Core array engine.
pub use oxidize_nd_core as core;

/// Linear algebra decompositions.
pub use oxidize_nd_linalg as linalg;

/// The types most programs need.
pub mod prelude {
    pub use oxidize_nd_core::{
        DType, Element, ElementWise, Float, Order, ParallelConfig, Shape, StrideLayout, Tensor,
        TensorError, TensorResult,
    };
    pub use oxidize_nd_linalg::{cholesky, det, eig, inv, lu, solve};
}
