//! Planned host backend, restricted to float arithmetic.
use crate::backend::check_supported;
use crate::internal::*;
use crate::tensor::host_value;

#[derive(Debug)]
pub struct CpuTensor(pub TensorCell);
crate::host_tensor!(CpuTensor);

impl CpuTensor {
    pub fn is_supported_dt(dt: DatumType) -> bool {
        dt.is_float()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn name(&self) -> StaticName {
        "cpu".into()
    }

    fn compile(&self, function: &Function) -> TesselResult<Box<dyn Executable>> {
        let order = check_supported(self, function)?;
        let plan = CpuPlan::new(function, order);
        debug!(
            "cpu: compiled {} ({} steps, {} early releases)",
            function.name,
            plan.order.len(),
            plan.flush_lists.iter().map(|l| l.len()).sum::<usize>()
        );
        Ok(Box::new(CpuExecutable { signature: Signature::of(function), function: function.clone(), plan }))
    }

    fn create_tensor(
        &self,
        datum_type: DatumType,
        shape: &[usize],
    ) -> TesselResult<Arc<dyn BackendTensor>> {
        Ok(Arc::new(CpuTensor(TensorCell::zero(TypedFact::dt_shape(datum_type, shape))?)))
    }

    fn create_tensor_from(&self, tensor: Tensor) -> TesselResult<Arc<dyn BackendTensor>> {
        Ok(Arc::new(CpuTensor(TensorCell::from_tensor(tensor))))
    }

    fn supports(&self, node: &Node) -> bool {
        node.op_is::<Source>() || node.op_is::<Const>() || CpuTensor::is_supported_dt(node.fact.datum_type)
    }

    fn accepts(&self, tensor: &dyn BackendTensor) -> bool {
        tensor.is::<CpuTensor>()
    }
}

/// Evaluation order plus, for every step, the values no later step needs.
#[derive(Debug, Clone)]
struct CpuPlan {
    order: Vec<usize>,
    flush_lists: Vec<TVec<usize>>,
}

impl CpuPlan {
    fn new(function: &Function, order: Vec<usize>) -> CpuPlan {
        let mut values_needed_until_step = vec![0; function.nodes.len()];
        for (step, &n) in order.iter().enumerate() {
            for &i in &function.node(n).inputs {
                values_needed_until_step[i] = step;
            }
        }
        for &o in &function.outputs {
            values_needed_until_step[o] = order.len();
        }
        let mut flush_lists: Vec<TVec<usize>> = vec![tvec!(); order.len()];
        for &n in &order {
            let step = values_needed_until_step[n];
            if step < order.len() {
                flush_lists[step].push(n);
            }
        }
        CpuPlan { order, flush_lists }
    }
}

#[derive(Debug)]
pub struct CpuExecutable {
    signature: Signature,
    function: Function,
    plan: CpuPlan,
}

impl Executable for CpuExecutable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn execute(
        &mut self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<bool> {
        let function = &self.function;
        ensure!(
            inputs.len() == function.inputs.len() && outputs.len() == function.outputs.len(),
            "cpu executable called with {} inputs and {} outputs, expects {} and {}",
            inputs.len(),
            outputs.len(),
            function.inputs.len(),
            function.outputs.len()
        );
        let mut values: Vec<Option<Arc<Tensor>>> = vec![None; function.nodes.len()];
        for (&source, input) in function.inputs.iter().zip(inputs.iter()) {
            values[source] = Some(host_value::<CpuTensor>(*input)?);
        }
        for (step, &n) in self.plan.order.iter().enumerate() {
            let node = function.node(n);
            if !node.op_is::<Source>() {
                trace!("cpu: step {step}, {node}");
                let args = node
                    .inputs
                    .iter()
                    .map(|&i| values[i].clone().with_context(|| format!("No value for #{i}, input of {node}")))
                    .collect::<TesselResult<TVec<_>>>()?;
                let value = node.op.eval(args).with_context(|| format!("Evaluating {node}"))?;
                if cfg!(debug_assertions) {
                    ensure!(
                        node.fact.matches(&value),
                        "Evaluating {}: expected {}, got {}",
                        node,
                        node.fact,
                        TypedFact::from(&*value)
                    );
                }
                values[n] = Some(value);
            }
            for &flush in &self.plan.flush_lists[step] {
                values[flush] = None;
            }
        }
        for (&o, output) in function.outputs.iter().zip(outputs.iter()) {
            let value = values[o].clone().with_context(|| format!("No value for output #{o}"))?;
            output.write_shared(value)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::binary::{Binary, BinaryKind};
    use crate::ops::matmul::MatMul;
    use crate::ops::unary::{Unary, UnaryKind};

    #[test]
    fn rejects_integer_arithmetic() {
        let mut function = Function::new("int");
        let a = function.add_source("a", TypedFact::shape::<i32, _>([2])).unwrap();
        let neg = function.wire_node("neg", Unary(UnaryKind::Neg), &[a]).unwrap();
        function.set_outputs(&[neg]).unwrap();
        let err = CpuBackend.compile(&function).unwrap_err();
        let err = err.downcast_ref::<CompilationError>().unwrap();
        assert_eq!(err.backend, "cpu");
        assert_eq!(err.node, "neg");
        assert!(err.reason.contains("Neg:i32"));
    }

    #[test]
    fn flush_lists_release_intermediates() {
        let mut function = Function::new("chain");
        let a = function.add_source("a", TypedFact::shape::<f32, _>([2, 2])).unwrap();
        let mm = function.wire_node("mm", MatMul, &[a, a]).unwrap();
        let relu = function.wire_node("relu", Unary(UnaryKind::Relu), &[mm]).unwrap();
        let sum = function.wire_node("sum", Binary(BinaryKind::Add), &[relu, a]).unwrap();
        function.set_outputs(&[sum]).unwrap();
        let plan = CpuPlan::new(&function, function.eval_order().unwrap());
        assert_eq!(plan.order, vec![a, mm, relu, sum]);
        assert_eq!(&*plan.flush_lists[2], &[mm]);
        assert_eq!(&*plan.flush_lists[3], &[a, relu]);
        assert!(plan.flush_lists.iter().all(|l| !l.contains(&sum)));
    }

    #[test]
    fn runs_float_graph() -> TesselResult<()> {
        crate::setup_test_logger();
        let mut function = Function::new("affine");
        let x = function.add_source("x", TypedFact::shape::<f32, _>([1, 2]))?;
        let w = function.add_const("w", Tensor::from_shape(&[2, 2], &[1f32, 2., 3., 4.])?)?;
        let y = function.wire_node("y", MatMul, &[x, w])?;
        let z = function.wire_node("z", Unary(UnaryKind::Neg), &[y])?;
        function.set_outputs(&[y, z])?;
        let mut exe = CpuBackend.compile(&function)?;
        let x = CpuBackend.create_tensor_from(Tensor::from_shape(&[1, 2], &[1f32, 1.])?)?;
        let y = CpuBackend.create_tensor(DatumType::F32, &[1, 2])?;
        let z = CpuBackend.create_tensor(DatumType::F32, &[1, 2])?;
        assert!(exe.call_with_validate(&[y.clone(), z.clone()], &[x])?);
        assert_eq!(y.read()?.as_slice::<f32>()?, &[4., 6.]);
        assert_eq!(z.read()?.as_slice::<f32>()?, &[-4., -6.]);
        assert!(exe.performance_data().is_empty());
        Ok(())
    }

    #[test]
    fn zero_copy_binding() -> TesselResult<()> {
        let mut function = Function::new("id");
        let a = function.add_source("a", TypedFact::shape::<f64, _>([3]))?;
        function.set_outputs(&[a])?;
        let mut exe = CpuBackend.compile(&function)?;
        let input = CpuBackend.create_tensor_from(Tensor::from_shape(&[3], &[1f64, 2., 3.])?)?;
        let output = CpuBackend.create_tensor(DatumType::F64, &[3])?;
        assert!(exe.call(&[output.clone()], &[input.clone()])?);
        let input = input.downcast_arc::<CpuTensor>().unwrap();
        let output = output.downcast_arc::<CpuTensor>().unwrap();
        assert!(Arc::ptr_eq(&input.0.shared(), &output.0.shared()));
        Ok(())
    }

    #[test]
    fn oversized_tensor_is_an_error() {
        assert!(CpuBackend.create_tensor(DatumType::F32, &[usize::MAX, 2]).is_err());
    }
}
