//! Array shapes.

use smallvec::SmallVec;
use std::fmt;

/// Shape of a decoded array or of an array declaration.
///
/// An empty shape is a scalar (one element).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    /// 1D shape.
    pub fn d1(len: usize) -> Self {
        Self { dims: smallvec::smallvec![len] }
    }

    /// Create from a slice of sizes.
    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of items (product of all dimensions, 1 for scalars).
    /// `None` when the product does not fit in `usize`.
    pub fn product(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// This shape with `elem_count` appended as trailing axis when it exceeds one.
    pub fn with_elements(&self, elem_count: usize) -> Self {
        let mut dims = self.dims.clone();
        if elem_count > 1 {
            dims.push(elem_count);
        }
        Self { dims }
    }
}

impl From<usize> for Shape {
    fn from(len: usize) -> Self {
        Self::d1(len)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl From<&[usize]> for Shape {
    fn from(v: &[usize]) -> Self {
        Self::from_slice(v)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product() {
        assert_eq!(Shape::scalar().product(), Some(1));
        assert_eq!(Shape::d1(11).product(), Some(11));
        assert_eq!(Shape::from_slice(&[4, 5, 6]).product(), Some(120));
        assert_eq!(Shape::d1(0).product(), Some(0));
        assert_eq!(Shape::from_slice(&[1 << 32, 1 << 32, 2]).product(), None);
        assert_eq!(Shape::from_slice(&[0, usize::MAX, 2]).product(), Some(0));
    }

    #[test]
    fn test_trailing_axis() {
        assert_eq!(Shape::d1(11).with_elements(3).dims(), &[11, 3]);
        assert_eq!(Shape::d1(11).with_elements(1).dims(), &[11]);
        assert_eq!(Shape::from_slice(&[2, 2]).with_elements(2).rank(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::from_slice(&[3, 4]).to_string(), "(3, 4)");
    }
}
