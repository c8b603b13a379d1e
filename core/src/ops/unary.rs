use crate::internal::*;
use tessel_num_traits::Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Neg,
    Abs,
    Relu,
    Exp,
    Sqrt,
}

impl UnaryKind {
    fn float_only(&self) -> bool {
        matches!(self, UnaryKind::Exp | UnaryKind::Sqrt)
    }
}

/// Sign-aware element-wise maps, for signed integers and floats.
pub trait SignedArith: Datum {
    fn neg(self) -> Self;
    fn abs(self) -> Self;
    fn relu(self) -> Self;
}

macro_rules! signed_int {
    ($($t:ty),*) => { $(
        impl SignedArith for $t {
            fn neg(self) -> Self { self.wrapping_neg() }
            fn abs(self) -> Self { self.wrapping_abs() }
            fn relu(self) -> Self { Ord::max(self, 0) }
        }
    )* }
}

macro_rules! signed_float {
    ($($t:ty),*) => { $(
        impl SignedArith for $t {
            fn neg(self) -> Self { -self }
            fn abs(self) -> Self { Float::abs(self) }
            fn relu(self) -> Self { if self > <$t>::default() { self } else { <$t>::default() } }
        }
    )* }
}

signed_int!(i8, i16, i32, i64);
signed_float!(f16, f32, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Unary(pub UnaryKind);

impl Unary {
    fn eval_signed<T: SignedArith>(&self, input: &Tensor) -> TesselResult<Tensor> {
        let f = match self.0 {
            UnaryKind::Neg => T::neg,
            UnaryKind::Abs => T::abs,
            UnaryKind::Relu => T::relu,
            _ => bail!("{:?} is not defined here", self.0),
        };
        Ok(input.as_slice::<T>()?.iter().map(|x| f(*x)).collect::<Vec<T>>().into())
    }

    fn eval_float<T: Datum + Float>(&self, input: &Tensor) -> TesselResult<Tensor> {
        let f = match self.0 {
            UnaryKind::Exp => T::exp,
            UnaryKind::Sqrt => T::sqrt,
            _ => bail!("{:?} is not defined here", self.0),
        };
        Ok(input.as_slice::<T>()?.iter().map(|x| f(*x)).collect::<Vec<T>>().into())
    }
}

impl Op for Unary {
    fn name(&self) -> StaticName {
        format!("{:?}", self.0).into()
    }

    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact> {
        crate::ops::check_input_arity(inputs.len(), 1)?;
        let dt = inputs[0].datum_type;
        if self.0.float_only() {
            ensure!(dt.is_float(), "{:?} requires a float input, got {}", self.0, dt);
        } else {
            ensure!(dt.is_float() || dt.is_signed(), "{:?} requires a signed input, got {}", self.0, dt);
        }
        Ok(inputs[0].clone())
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>> {
        crate::ops::check_input_arity(inputs.len(), 1)?;
        let input = &inputs[0];
        let output: Tensor = if self.0.float_only() {
            dispatch_floatlike!(Self::eval_float(input.datum_type())(self, input))?
        } else {
            dispatch_signed!(Self::eval_signed(input.datum_type())(self, input))?
        };
        Ok(Arc::new(output.into_shape(input.shape())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: UnaryKind, t: Tensor) -> TesselResult<Arc<Tensor>> {
        Unary(kind).eval(tvec!(t.into_arc_tensor()))
    }

    #[test]
    fn relu_and_abs() {
        let t = Tensor::from_shape(&[3], &[-2i32, 0, 3]).unwrap();
        assert_eq!(run(UnaryKind::Relu, t.clone()).unwrap().as_slice::<i32>().unwrap(), &[0, 0, 3]);
        assert_eq!(run(UnaryKind::Abs, t).unwrap().as_slice::<i32>().unwrap(), &[2, 0, 3]);
    }

    #[test]
    fn neg_wraps_min() {
        let t = Tensor::from_shape(&[1], &[i16::MIN]).unwrap();
        assert_eq!(run(UnaryKind::Neg, t).unwrap().as_slice::<i16>().unwrap(), &[i16::MIN]);
    }

    #[test]
    fn sqrt_is_float_only() {
        let f = TypedFact::shape::<i32, _>([2]);
        assert!(Unary(UnaryKind::Sqrt).output_fact(&[&f]).is_err());
        let t = Tensor::from_shape(&[2], &[4f64, 9.]).unwrap();
        assert_eq!(run(UnaryKind::Sqrt, t).unwrap().as_slice::<f64>().unwrap(), &[2., 3.]);
    }

    #[test]
    fn unsigned_is_rejected() {
        let f = TypedFact::shape::<u8, _>([2]);
        assert!(Unary(UnaryKind::Neg).output_fact(&[&f]).is_err());
    }
}
