use std::fmt;

use crate::internal::*;

/// Element type and shape of a value: what a Parameter declares, what a
/// Result promises, and what a tensor handle carries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypedFact {
    pub datum_type: DatumType,
    pub shape: TVec<usize>,
}

impl TypedFact {
    pub fn dt_shape(datum_type: DatumType, shape: impl AsRef<[usize]>) -> TypedFact {
        TypedFact { datum_type, shape: shape.as_ref().into() }
    }

    pub fn shape<T: Datum, S: AsRef<[usize]>>(shape: S) -> TypedFact {
        Self::dt_shape(T::datum_type(), shape)
    }

    pub fn scalar<T: Datum>() -> TypedFact {
        Self::dt_shape(T::datum_type(), [])
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, tensor: &Tensor) -> bool {
        self.datum_type == tensor.datum_type() && *self.shape == *tensor.shape()
    }
}

impl From<&Tensor> for TypedFact {
    fn from(t: &Tensor) -> TypedFact {
        TypedFact::dt_shape(t.datum_type(), t.shape())
    }
}

impl fmt::Display for TypedFact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {{{}}}", self.datum_type, self.shape.iter().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(TypedFact::shape::<f32, _>([2, 2]).to_string(), "f32 {2,2}");
        assert_eq!(TypedFact::scalar::<bool>().to_string(), "bool {}");
    }

    #[test]
    fn matches_tensor() {
        let t = Tensor::from_shape(&[2], &[1i32, 2]).unwrap();
        assert!(TypedFact::shape::<i32, _>([2]).matches(&t));
        assert!(!TypedFact::shape::<i32, _>([1, 2]).matches(&t));
        assert!(!TypedFact::shape::<u32, _>([2]).matches(&t));
        assert_eq!(TypedFact::from(&t), TypedFact::shape::<i32, _>([2]));
    }
}
