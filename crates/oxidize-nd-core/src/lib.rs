pub mod broadcast;
pub mod dtype;
pub mod error;
pub mod iterator;
pub mod layout;
pub mod ops;
pub mod order;
pub mod parallel;
pub mod reduce;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use broadcast::ElementWise;
pub use dtype::{DType, Element, Float};
pub use error::{TensorError, TensorResult};
pub use iterator::{IndexIterator, StridePointerIterator};
pub use layout::StrideLayout;
pub use order::Order;
pub use parallel::ParallelConfig;
pub use shape::Shape;
pub use storage::{DenseStorage, Sequence, SequenceStorage, Storage};
pub use tensor::Tensor;
