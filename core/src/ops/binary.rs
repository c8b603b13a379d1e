use crate::internal::*;
use tessel_num_traits::Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
}

/// Element-wise arithmetic used by the binary ops and by `MatMul`.
///
/// Integers wrap on overflow; integer division by zero is an error.
pub trait Arith: Datum {
    fn add(a: Self, b: Self) -> Self;
    fn sub(a: Self, b: Self) -> Self;
    fn mul(a: Self, b: Self) -> Self;
    fn div(a: Self, b: Self) -> Option<Self>;
    fn max(a: Self, b: Self) -> Self;
    fn min(a: Self, b: Self) -> Self;
}

macro_rules! arith_int {
    ($($t:ty),*) => { $(
        impl Arith for $t {
            fn add(a: Self, b: Self) -> Self { a.wrapping_add(b) }
            fn sub(a: Self, b: Self) -> Self { a.wrapping_sub(b) }
            fn mul(a: Self, b: Self) -> Self { a.wrapping_mul(b) }
            fn div(a: Self, b: Self) -> Option<Self> { a.checked_div(b) }
            fn max(a: Self, b: Self) -> Self { Ord::max(a, b) }
            fn min(a: Self, b: Self) -> Self { Ord::min(a, b) }
        }
    )* }
}

macro_rules! arith_float {
    ($($t:ty),*) => { $(
        impl Arith for $t {
            fn add(a: Self, b: Self) -> Self { a + b }
            fn sub(a: Self, b: Self) -> Self { a - b }
            fn mul(a: Self, b: Self) -> Self { a * b }
            fn div(a: Self, b: Self) -> Option<Self> { Some(a / b) }
            fn max(a: Self, b: Self) -> Self { Float::max(a, b) }
            fn min(a: Self, b: Self) -> Self { Float::min(a, b) }
        }
    )* }
}

arith_int!(u8, u16, u32, u64, i8, i16, i32, i64);
arith_float!(f16, f32, f64);

impl BinaryKind {
    fn apply<T: Arith>(&self, a: T, b: T) -> TesselResult<T> {
        Ok(match self {
            BinaryKind::Add => T::add(a, b),
            BinaryKind::Sub => T::sub(a, b),
            BinaryKind::Mul => T::mul(a, b),
            BinaryKind::Div => T::div(a, b).context("Integer division by zero")?,
            BinaryKind::Max => T::max(a, b),
            BinaryKind::Min => T::min(a, b),
        })
    }
}

/// Element-wise binary op over two values of identical facts. There is no
/// broadcasting at this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binary(pub BinaryKind);

impl Binary {
    fn eval_t<T: Arith>(&self, a: &Tensor, b: &Tensor) -> TesselResult<Tensor> {
        let a = a.as_slice::<T>()?;
        let b = b.as_slice::<T>()?;
        let values = a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| self.0.apply(*a, *b))
            .collect::<TesselResult<Vec<T>>>()?;
        Ok(values.into())
    }
}

impl Op for Binary {
    fn name(&self) -> StaticName {
        format!("{:?}", self.0).into()
    }

    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact> {
        crate::ops::check_input_arity(inputs.len(), 2)?;
        ensure!(
            inputs[0] == inputs[1],
            "{:?} operands must have identical type and shape, got {} and {}",
            self.0,
            inputs[0],
            inputs[1]
        );
        ensure!(inputs[0].datum_type.is_number(), "{:?} is not defined on bool", self.0);
        Ok(inputs[0].clone())
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>> {
        crate::ops::check_input_arity(inputs.len(), 2)?;
        let (a, b) = (&inputs[0], &inputs[1]);
        ensure!(a.shape() == b.shape(), "Shape mismatch {:?} vs {:?}", a.shape(), b.shape());
        let values: Tensor = dispatch_numbers!(Self::eval_t(a.datum_type())(self, a, b))?;
        Ok(Arc::new(values.into_shape(a.shape())?))
    }
}
