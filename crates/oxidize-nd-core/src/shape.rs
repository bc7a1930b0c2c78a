use crate::error::{TensorError, TensorResult};
use serde::{Deserialize, Serialize};

/// Represents the shape of a tensor (dimensions).
///
/// The total element count is computed once at construction with checked
/// arithmetic, so a `Shape` value always has a representable size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape {
    dims: Vec<usize>,
    size: usize,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> TensorResult<Self> {
        let size = dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                TensorError::InvalidLayout(format!("shape {:?} has an unrepresentable size", dims))
            })?;
        Ok(Shape { dims, size })
    }

    pub fn of(dims: &[usize]) -> TensorResult<Self> {
        Shape::new(dims.to_vec())
    }

    pub fn scalar() -> Self {
        Shape {
            dims: vec![],
            size: 1,
        }
    }

    /// Number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Size along a specific axis.
    pub fn dim(&self, axis: usize) -> TensorResult<usize> {
        self.dims.get(axis).copied().ok_or(TensorError::InvalidAxis {
            axis,
            ndim: self.rank(),
        })
    }

    /// Total number of elements, 1 for a scalar shape.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.clone()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Number of dimensions with size 1.
    pub fn unit_dim_count(&self) -> usize {
        self.dims.iter().filter(|&&d| d == 1).count()
    }

    /// Dimensions with `axis` removed.
    pub fn narrow_dims(&self, axis: usize) -> TensorResult<Vec<usize>> {
        if axis >= self.rank() {
            return Err(TensorError::InvalidAxis {
                axis,
                ndim: self.rank(),
            });
        }
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(dims)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = TensorError;

    fn try_from(dims: Vec<usize>) -> TensorResult<Self> {
        Shape::new(dims)
    }
}

impl TryFrom<&[usize]> for Shape {
    type Error = TensorError;

    fn try_from(dims: &[usize]) -> TensorResult<Self> {
        Shape::of(dims)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_basics() {
        let s = Shape::of(&[3, 4, 5]).unwrap();
        assert_eq!(s.rank(), 3);
        assert_eq!(s.size(), 60);
        assert_eq!(s.dim(0).unwrap(), 3);
        assert_eq!(s.dim(1).unwrap(), 4);
        assert_eq!(s.dim(2).unwrap(), 5);
        assert!(s.dim(3).is_err());
    }

    #[test]
    fn test_scalar() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.size(), 1);
        assert_eq!(s, Shape::of(&[]).unwrap());
        assert_eq!(s.to_string(), "()");
    }

    #[test]
    fn test_zero_sized() {
        let s = Shape::of(&[3, 0, 2]).unwrap();
        assert_eq!(s.size(), 0);
        assert_eq!(s.unit_dim_count(), 0);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let err = Shape::of(&[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TensorError::InvalidLayout(_)));
    }

    #[test]
    fn test_structural_equality() {
        let a = Shape::of(&[2, 3]).unwrap();
        let b = Shape::new(vec![2, 3]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Shape::of(&[3, 2]).unwrap());
        assert_eq!(a.to_string(), "(2, 3)");
    }

    #[test]
    fn test_narrow_dims() {
        let s = Shape::of(&[2, 3, 4]).unwrap();
        assert_eq!(s.narrow_dims(1).unwrap(), vec![2, 4]);
        assert!(s.narrow_dims(3).is_err());
    }
}
