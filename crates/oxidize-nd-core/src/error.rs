use thiserror::Error;

use crate::order::Order;

/// Core error type for all array operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TensorError {
    #[error("Invalid order {order:?} for {context}")]
    InvalidOrder { order: Order, context: &'static str },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Cannot broadcast shapes {shapes:?}")]
    BroadcastError { shapes: Vec<Vec<usize>> },

    #[error("Cannot reshape {from:?} into {to:?}: element counts differ")]
    ReshapeMismatch { from: Vec<usize>, to: Vec<usize> },

    #[error("Layout with shape {shape:?} and strides {strides:?} is not dense in {order:?} order")]
    NotContiguous {
        shape: Vec<usize>,
        strides: Vec<usize>,
        order: Order,
    },

    #[error("Matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Invalid axis: {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Storage position {position} out of range for storage of length {len}")]
    StorageOutOfRange { position: usize, len: usize },

    #[error("Iterator exhausted after {size} elements")]
    IterationExhausted { size: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Singular matrix: cannot invert or decompose")]
    SingularMatrix,

    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("No convergence after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Tensor contains NaN values")]
    ContainsNaN,

    #[error("Empty tensor")]
    EmptyTensor,
}

pub type TensorResult<T> = Result<T, TensorError>;
