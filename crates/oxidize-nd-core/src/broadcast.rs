//! Element-wise broadcasting of a set of shapes.
//!
//! Shapes are aligned at their trailing dimensions. Along every aligned
//! dimension all sizes other than 1 must agree; the common size is that
//! value, or 1 when every input has 1 there. Size-1 and missing dimensions
//! are replicated virtually through zero strides.

use crate::dtype::Element;
use crate::error::{TensorError, TensorResult};
use crate::layout::StrideLayout;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Outcome of broadcasting a list of shapes together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementWise {
    inputs: Vec<Shape>,
    shape: Option<Shape>,
    unchanged: bool,
}

impl ElementWise {
    pub fn new(shapes: &[Shape]) -> Self {
        let inputs = shapes.to_vec();
        let shape = common_shape(shapes);
        let unchanged = shape
            .as_ref()
            .is_some_and(|target| shapes.iter().all(|s| s == target));
        ElementWise {
            inputs,
            shape,
            unchanged,
        }
    }

    pub fn valid(&self) -> bool {
        self.shape.is_some()
    }

    /// True when every input already has the common shape (always true for
    /// zero or one input).
    pub fn unchanged(&self) -> bool {
        self.unchanged
    }

    /// The common shape, `None` when the inputs are incompatible.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn has_shape<T: Element>(&self, tensor: &Tensor<T>) -> bool {
        self.shape.as_ref() == Some(tensor.shape())
    }

    pub fn into_result(self) -> TensorResult<Self> {
        if self.valid() {
            Ok(self)
        } else {
            Err(self.error())
        }
    }

    fn error(&self) -> TensorError {
        TensorError::BroadcastError {
            shapes: self.inputs.iter().map(Shape::to_vec).collect(),
        }
    }

    fn target(&self) -> TensorResult<&Shape> {
        self.shape.as_ref().ok_or_else(|| self.error())
    }

    pub fn transform_layout(&self, layout: &StrideLayout) -> TensorResult<StrideLayout> {
        let target = self.target()?;
        if layout.shape() == target {
            return Ok(layout.clone());
        }
        layout.broadcast_to(target)
    }

    /// View of `tensor` with the common shape; shares its storage.
    pub fn transform<T: Element>(&self, tensor: &Tensor<T>) -> TensorResult<Tensor<T>> {
        let target = self.target()?;
        if tensor.shape() == target {
            return Ok(tensor.clone());
        }
        tensor.broadcast_to(target.dims())
    }
}

fn common_shape(shapes: &[Shape]) -> Option<Shape> {
    let rank = shapes.iter().map(Shape::rank).max().unwrap_or(0);
    let mut dims = vec![1usize; rank];
    for shape in shapes {
        let lead = rank - shape.rank();
        for (i, &d) in shape.dims().iter().enumerate() {
            let slot = &mut dims[lead + i];
            if d == 1 {
                continue;
            }
            if *slot == 1 {
                *slot = d;
            } else if *slot != d {
                return None;
            }
        }
    }
    Shape::new(dims).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;

    fn shape(dims: &[usize]) -> Shape {
        Shape::of(dims).unwrap()
    }

    #[test]
    fn test_empty_and_single_inputs_are_unchanged() {
        let ew = ElementWise::new(&[]);
        assert!(ew.valid());
        assert!(ew.unchanged());
        assert_eq!(ew.shape(), Some(&Shape::scalar()));

        let ew = ElementWise::new(&[shape(&[4, 1, 2])]);
        assert!(ew.unchanged());
        assert_eq!(ew.shape(), Some(&shape(&[4, 1, 2])));
    }

    #[test]
    fn test_compatible_shapes() {
        let ew = ElementWise::new(&[shape(&[2, 1]), shape(&[3, 2, 3]), shape(&[3])]);
        assert!(ew.valid());
        assert!(!ew.unchanged());
        assert_eq!(ew.shape(), Some(&shape(&[3, 2, 3])));
    }

    #[test]
    fn test_incompatible_shapes() {
        let ew = ElementWise::new(&[shape(&[2, 1]), shape(&[2, 3, 1])]);
        assert!(!ew.valid());
        assert_eq!(ew.shape(), None);
        let err = ew.into_result().unwrap_err();
        assert_eq!(
            err,
            TensorError::BroadcastError {
                shapes: vec![vec![2, 1], vec![2, 3, 1]]
            }
        );
    }

    #[test]
    fn test_zero_sized_dims_broadcast_against_one() {
        let ew = ElementWise::new(&[shape(&[0, 3]), shape(&[1, 3])]);
        assert_eq!(ew.shape(), Some(&shape(&[0, 3])));
        assert!(!ElementWise::new(&[shape(&[0]), shape(&[2])]).valid());
    }

    #[test]
    fn test_transform_is_a_zero_copy_view() {
        let ew = ElementWise::new(&[shape(&[2, 1]), shape(&[3, 2, 3]), shape(&[3])]);
        let t = Tensor::<i32>::from_vec(vec![10, 20], &[2, 1], Order::RowMajor).unwrap();
        let b = ew.transform(&t).unwrap();
        assert!(ew.has_shape(&b));
        assert!(!ew.has_shape(&t));
        assert!(b.shares_storage(&t));
        assert_eq!(b.layout().strides(), &[0, 1, 0]);
        assert_eq!(b.get(&[2, 1, 2]).unwrap(), 20);
        assert_eq!(b.get(&[0, 0, 1]).unwrap(), 10);

        let bad = ElementWise::new(&[shape(&[2]), shape(&[3])]);
        assert!(bad.transform(&t).is_err());
    }
}
