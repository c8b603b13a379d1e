//! Reference backend: runs every op on every datum type, one node at a
//! time, and profiles each node.
use std::time::{Duration, Instant};

use crate::backend::check_supported;
use crate::internal::*;
use crate::tensor::host_value;

#[derive(Debug)]
pub struct InterpreterTensor(pub TensorCell);
crate::host_tensor!(InterpreterTensor);

#[derive(Debug, Clone, Copy, Default)]
pub struct InterpreterBackend;

impl Backend for InterpreterBackend {
    fn name(&self) -> StaticName {
        "interpreter".into()
    }

    fn compile(&self, function: &Function) -> TesselResult<Box<dyn Executable>> {
        let order = check_supported(self, function)?;
        debug!("interpreter: compiled {} ({} steps)", function.name, order.len());
        Ok(Box::new(InterpreterExecutable::new(function, order)))
    }

    fn create_tensor(
        &self,
        datum_type: DatumType,
        shape: &[usize],
    ) -> TesselResult<Arc<dyn BackendTensor>> {
        Ok(Arc::new(InterpreterTensor(TensorCell::zero(TypedFact::dt_shape(datum_type, shape))?)))
    }

    fn create_tensor_from(&self, tensor: Tensor) -> TesselResult<Arc<dyn BackendTensor>> {
        Ok(Arc::new(InterpreterTensor(TensorCell::from_tensor(tensor))))
    }

    fn supports(&self, _node: &Node) -> bool {
        true
    }

    fn accepts(&self, tensor: &dyn BackendTensor) -> bool {
        tensor.is::<InterpreterTensor>()
    }
}

#[derive(Debug)]
pub struct InterpreterExecutable {
    signature: Signature,
    function: Function,
    order: Vec<usize>,
    counters: Vec<PerformanceCounter>,
}

impl InterpreterExecutable {
    fn new(function: &Function, order: Vec<usize>) -> InterpreterExecutable {
        let counters = function
            .nodes
            .iter()
            .map(|n| PerformanceCounter::new(n.name.clone(), Duration::ZERO, 0))
            .collect();
        InterpreterExecutable {
            signature: Signature::of(function),
            function: function.clone(),
            order,
            counters,
        }
    }
}

impl Executable for InterpreterExecutable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn execute(
        &mut self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<bool> {
        ensure!(
            inputs.len() == self.function.inputs.len() && outputs.len() == self.function.outputs.len(),
            "Interpreter called with {} inputs and {} outputs, expects {} and {}",
            inputs.len(),
            outputs.len(),
            self.function.inputs.len(),
            self.function.outputs.len()
        );
        let mut values: Vec<Option<Arc<Tensor>>> = vec![None; self.function.nodes.len()];
        for (&source, input) in self.function.inputs.iter().zip(inputs.iter()) {
            values[source] = Some(host_value::<InterpreterTensor>(*input)?);
        }
        for &id in &self.order {
            let node = &self.function.nodes[id];
            if node.op_is::<Source>() {
                continue;
            }
            let args = node
                .inputs
                .iter()
                .map(|&i| values[i].clone().with_context(|| format!("No value for #{i}, input of {node}")))
                .collect::<TesselResult<TVec<_>>>()?;
            let start = Instant::now();
            let value = node.op.eval(args).with_context(|| format!("Evaluating {node}"))?;
            self.counters[id].record(start.elapsed());
            values[id] = Some(value);
        }
        for (&o, output) in self.function.outputs.iter().zip(outputs.iter()) {
            let value = values[o].clone().with_context(|| format!("No value for output #{o}"))?;
            output.write_shared(value)?;
        }
        Ok(true)
    }

    fn performance_data(&self) -> Vec<PerformanceCounter> {
        self.counters.iter().filter(|c| c.call_count > 0).cloned().collect()
    }
}
