//! The validated invocation protocol every compiled function satisfies.
use std::time::Duration;

use crate::internal::*;

/// Parameter and Result declarations of a function, frozen when a backend
/// compiles it. Later changes to the function do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
    pub results: Vec<Output>,
}

impl Signature {
    pub fn of(function: &Function) -> Signature {
        Signature { parameters: function.parameters(), results: function.results() }
    }

    /// Checks a call against the declarations: input count, output count,
    /// then type and shape of every input, then of every output. The first
    /// violation is reported as a `ContractViolation`.
    pub fn validate(
        &self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<()> {
        if self.parameters.len() != inputs.len() {
            return Err(ContractViolation::CountMismatch {
                slot: Slot::Input,
                expected: self.parameters.len(),
                actual: inputs.len(),
            }
            .into());
        }
        if self.results.len() != outputs.len() {
            return Err(ContractViolation::CountMismatch {
                slot: Slot::Output,
                expected: self.results.len(),
                actual: outputs.len(),
            }
            .into());
        }
        for (ix, (param, input)) in self.parameters.iter().zip(inputs.iter()).enumerate() {
            check_slot(Slot::Input, ix, &param.fact, *input)?;
        }
        for (ix, (result, output)) in self.results.iter().zip(outputs.iter()).enumerate() {
            check_slot(Slot::Output, ix, &result.fact, *output)?;
        }
        Ok(())
    }
}

fn check_slot(
    slot: Slot,
    index: usize,
    expected: &TypedFact,
    tensor: &dyn BackendTensor,
) -> TesselResult<()> {
    if expected.datum_type != tensor.datum_type() {
        return Err(ContractViolation::TypeMismatch {
            slot,
            index,
            expected: expected.datum_type,
            actual: tensor.datum_type(),
        }
        .into());
    }
    if *expected.shape != *tensor.shape() {
        return Err(ContractViolation::ShapeMismatch {
            slot,
            index,
            expected: expected.shape.clone(),
            actual: tensor.shape().into(),
        }
        .into());
    }
    Ok(())
}

/// Accumulated timing of one operation.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PerformanceCounter {
    pub name: String,
    pub total_time: Duration,
    pub call_count: usize,
}

impl PerformanceCounter {
    pub fn average(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
    }
}

/// The compiled form of a function.
///
/// An executable can be called many times with different tensors, as long
/// as they match its signature positionally. `execute` takes `&mut self`:
/// one instance is not reentrant unless an implementation says otherwise,
/// while distinct executables can run concurrently on different threads.
pub trait Executable: fmt::Debug + Send {
    fn signature(&self) -> &Signature;

    /// Runs the computation without checking the call. `Ok(false)` means
    /// the backend could not complete it; callers must check it.
    ///
    /// On `Ok(true)`, every output has been fully written.
    fn execute(
        &mut self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<bool>;

    fn parameters(&self) -> &[Parameter] {
        &self.signature().parameters
    }

    fn results(&self) -> &[Output] {
        &self.signature().results
    }

    fn validate(
        &self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<()> {
        self.signature().validate(outputs, inputs)
    }

    /// Unchecked call on shared handles.
    fn call(
        &mut self,
        outputs: &[Arc<dyn BackendTensor>],
        inputs: &[Arc<dyn BackendTensor>],
    ) -> TesselResult<bool> {
        let outputs = borrow_handles(outputs);
        let inputs = borrow_handles(inputs);
        self.execute(&outputs, &inputs)
    }

    fn call_with_validate(
        &mut self,
        outputs: &[Arc<dyn BackendTensor>],
        inputs: &[Arc<dyn BackendTensor>],
    ) -> TesselResult<bool> {
        let outputs = borrow_handles(outputs);
        let inputs = borrow_handles(inputs);
        self.validate_and_execute(&outputs, &inputs)
    }

    fn validate_and_execute(
        &mut self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<bool> {
        self.validate(outputs, inputs)?;
        self.execute(outputs, inputs)
    }

    /// Per-operation counters, empty unless the backend profiles.
    fn performance_data(&self) -> Vec<PerformanceCounter> {
        vec![]
    }
}

fn borrow_handles(handles: &[Arc<dyn BackendTensor>]) -> TVec<&dyn BackendTensor> {
    handles.iter().map(|h| &**h).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::binary::{Binary, BinaryKind};

    #[derive(Debug)]
    struct Cell(TensorCell);
    crate::host_tensor!(Cell);

    fn handle<T: Datum>(shape: &[usize]) -> Cell {
        Cell(TensorCell::zero(TypedFact::shape::<T, _>(shape)).unwrap())
    }

    fn signature() -> Signature {
        let mut function = Function::new("f");
        let a = function.add_source("a", TypedFact::shape::<f32, _>([2, 2])).unwrap();
        let b = function.add_source("b", TypedFact::shape::<f32, _>([2, 2])).unwrap();
        let sum = function.wire_node("sum", Binary(BinaryKind::Add), &[a, b]).unwrap();
        function.set_outputs(&[sum]).unwrap();
        Signature::of(&function)
    }

    fn violation(r: TesselResult<()>) -> ContractViolation {
        r.unwrap_err().downcast::<ContractViolation>().unwrap()
    }

    #[test]
    fn counts_come_first() {
        let sig = signature();
        let bad = handle::<i32>(&[3]);
        let v = violation(sig.validate(&[], &[&bad]));
        assert_eq!(v, ContractViolation::CountMismatch { slot: Slot::Input, expected: 2, actual: 1 });
        let good = handle::<f32>(&[2, 2]);
        let v = violation(sig.validate(&[], &[&good, &good]));
        assert_eq!(v, ContractViolation::CountMismatch { slot: Slot::Output, expected: 1, actual: 0 });
    }

    #[test]
    fn inputs_before_outputs_type_before_shape() {
        let sig = signature();
        let good = handle::<f32>(&[2, 2]);
        let wrong_both = handle::<i32>(&[3, 3]);
        let v = violation(sig.validate(&[&wrong_both], &[&good, &wrong_both]));
        assert_eq!(
            v,
            ContractViolation::TypeMismatch {
                slot: Slot::Input,
                index: 1,
                expected: DatumType::F32,
                actual: DatumType::I32
            }
        );
        let wrong_shape = handle::<f32>(&[3, 3]);
        let v = violation(sig.validate(&[&wrong_both], &[&good, &wrong_shape]));
        assert_eq!(v.slot(), Slot::Input);
        assert!(matches!(v, ContractViolation::ShapeMismatch { index: 1, .. }));
        let v = violation(sig.validate(&[&wrong_shape], &[&good, &good]));
        assert!(matches!(v, ContractViolation::ShapeMismatch { slot: Slot::Output, index: 0, .. }));
    }

    #[test]
    fn valid_call_is_idempotent() {
        let sig = signature();
        let t = handle::<f32>(&[2, 2]);
        assert!(sig.validate(&[&t], &[&t, &t]).is_ok());
        assert!(sig.validate(&[&t], &[&t, &t]).is_ok());
    }

    #[test]
    fn counter_average() {
        let mut c = PerformanceCounter::new("add".into(), Duration::ZERO, 0);
        assert_eq!(c.average(), Duration::ZERO);
        c.record(Duration::from_millis(4));
        c.record(Duration::from_millis(2));
        assert_eq!(c.call_count, 2);
        assert_eq!(c.average(), Duration::from_millis(3));
    }
}
