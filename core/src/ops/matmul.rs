use crate::internal::*;
use crate::ops::binary::Arith;
use tessel_ndarray::Ix2;

/// Plain `[m, k] x [k, n] -> [m, n]` product. Accumulation runs in `k`
/// order so the result is the same wherever the node is placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatMul;

impl MatMul {
    fn eval_t<T: Arith>(a: &Tensor, b: &Tensor) -> TesselResult<Tensor> {
        let a = a.to_array_view::<T>()?.into_dimensionality::<Ix2>()?;
        let b = b.to_array_view::<T>()?.into_dimensionality::<Ix2>()?;
        let (m, k) = a.dim();
        let n = b.dim().1;
        let mut c = Vec::with_capacity(m * n);
        for i in 0..m {
            for j in 0..n {
                let mut acc = T::default();
                for p in 0..k {
                    acc = T::add(acc, T::mul(a[(i, p)], b[(p, j)]));
                }
                c.push(acc);
            }
        }
        Tensor::from(c).into_shape(&[m, n])
    }
}

impl Op for MatMul {
    fn name(&self) -> StaticName {
        "MatMul".into()
    }

    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact> {
        crate::ops::check_input_arity(inputs.len(), 2)?;
        let (a, b) = (inputs[0], inputs[1]);
        ensure!(a.datum_type == b.datum_type, "MatMul operands types differ: {} and {}", a, b);
        ensure!(a.datum_type.is_number(), "MatMul is not defined on bool");
        ensure!(a.rank() == 2 && b.rank() == 2, "MatMul expects rank 2 operands, got {} and {}", a, b);
        ensure!(a.shape[1] == b.shape[0], "MatMul inner dimensions differ: {} and {}", a, b);
        Ok(TypedFact::dt_shape(a.datum_type, [a.shape[0], b.shape[1]]))
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>> {
        crate::ops::check_input_arity(inputs.len(), 2)?;
        let (a, b) = (&inputs[0], &inputs[1]);
        ensure!(a.datum_type() == b.datum_type(), "MatMul operands types differ");
        Ok(Arc::new(dispatch_numbers!(Self::eval_t(a.datum_type())(a, b))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product() {
        let a = Tensor::from_shape(&[2, 3], &[1i64, 2, 3, 4, 5, 6]).unwrap();
        let b = Tensor::from_shape(&[3, 1], &[1i64, 0, -1]).unwrap();
        let c = MatMul.eval(tvec!(a.into_arc_tensor(), b.into_arc_tensor())).unwrap();
        assert_eq!(c.shape(), &[2, 1]);
        assert_eq!(c.as_slice::<i64>().unwrap(), &[-2, -2]);
    }

    #[test]
    fn fact_checks_inner_dim() {
        let a = TypedFact::shape::<f32, _>([2, 3]);
        let b = TypedFact::shape::<f32, _>([2, 3]);
        assert!(MatMul.output_fact(&[&a, &b]).is_err());
        let b = TypedFact::shape::<f32, _>([3, 4]);
        assert_eq!(MatMul.output_fact(&[&a, &b]).unwrap(), TypedFact::shape::<f32, _>([2, 4]));
    }
}
