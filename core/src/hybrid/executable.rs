use rayon::prelude::*;

use crate::hybrid::partition::Partition;
use crate::internal::*;

/// A value available during one invocation: a caller tensor, or a tensor
/// allocated by a sub-backend for this invocation only.
#[derive(Debug, Clone)]
enum Handle<'a> {
    Borrowed(&'a dyn BackendTensor),
    Owned(Arc<dyn BackendTensor>),
}

impl Handle<'_> {
    fn get(&self) -> &dyn BackendTensor {
        match self {
            Handle::Borrowed(t) => *t,
            Handle::Owned(t) => &**t,
        }
    }
}

struct Job<'a> {
    partition: usize,
    inputs: TVec<Handle<'a>>,
    outputs: TVec<Handle<'a>>,
}

#[derive(Debug)]
pub struct HybridExecutable {
    signature: Signature,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    facts: Vec<TypedFact>,
    backends: Vec<Arc<dyn Backend>>,
    partitions: Vec<Partition>,
    executables: Vec<Box<dyn Executable>>,
    waves: Vec<Vec<usize>>,
    /// Per wave, the values no later wave reads.
    release_after: Vec<Vec<usize>>,
}

impl HybridExecutable {
    pub(super) fn new(
        function: &Function,
        backends: Vec<Arc<dyn Backend>>,
        partitions: Vec<Partition>,
        executables: Vec<Box<dyn Executable>>,
    ) -> TesselResult<HybridExecutable> {
        let wave_count = partitions.iter().map(|p| p.wave + 1).max().unwrap_or(0);
        let mut waves = vec![vec![]; wave_count];
        for (ix, p) in partitions.iter().enumerate() {
            waves[p.wave].push(ix);
        }
        ensure!(waves.iter().all(|w| !w.is_empty()), "Partition waves of {} are not contiguous", function.name);
        let mut last_read: HashMap<usize, usize> = HashMap::new();
        for p in &partitions {
            for &i in &p.inputs {
                let wave = last_read.entry(i).or_insert(p.wave);
                *wave = (*wave).max(p.wave);
            }
        }
        let mut release_after = vec![vec![]; wave_count];
        for (value, wave) in last_read.into_iter().sorted() {
            if !function.outputs.contains(&value) {
                release_after[wave].push(value);
            }
        }
        Ok(HybridExecutable {
            signature: Signature::of(function),
            inputs: function.inputs.clone(),
            outputs: function.outputs.clone(),
            facts: function.nodes.iter().map(|n| n.fact.clone()).collect(),
            backends,
            partitions,
            executables,
            waves,
            release_after,
        })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }

    /// Binds partition inputs, staging a copy whenever the partition
    /// sub-backend does not take the value as is, and allocates partition
    /// outputs. A Result goes straight into the caller tensor when the
    /// sub-backend accepts it.
    fn prepare<'a>(
        &self,
        partition: usize,
        values: &[Option<Handle<'a>>],
        caller_outputs: &[&'a dyn BackendTensor],
    ) -> TesselResult<Job<'a>> {
        let p = &self.partitions[partition];
        let backend = &self.backends[p.backend];
        let mut inputs = tvec!();
        for &i in &p.inputs {
            let value = values[i].as_ref().with_context(|| format!("No value for node #{i}"))?;
            if backend.accepts(value.get()) {
                inputs.push(value.clone());
            } else {
                trace!("hybrid: staging #{} for {}", i, p.function.name);
                inputs.push(Handle::Owned(backend.create_tensor_from(value.get().read()?)?));
            }
        }
        let mut outputs = tvec!();
        for &o in &p.outputs {
            let caller = self.outputs.iter().position(|&r| r == o).map(|pos| caller_outputs[pos]);
            match caller {
                Some(t) if backend.accepts(t) => outputs.push(Handle::Borrowed(t)),
                _ => {
                    let fact = &self.facts[o];
                    outputs.push(Handle::Owned(backend.create_tensor(fact.datum_type, &fact.shape)?))
                }
            }
        }
        Ok(Job { partition, inputs, outputs })
    }
}

fn run(executable: &mut Box<dyn Executable>, job: &Job) -> TesselResult<bool> {
    let inputs: TVec<&dyn BackendTensor> = job.inputs.iter().map(|h| h.get()).collect();
    let outputs: TVec<&dyn BackendTensor> = job.outputs.iter().map(|h| h.get()).collect();
    executable.execute(&outputs, &inputs)
}

impl Executable for HybridExecutable {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn execute(
        &mut self,
        outputs: &[&dyn BackendTensor],
        inputs: &[&dyn BackendTensor],
    ) -> TesselResult<bool> {
        ensure!(
            inputs.len() == self.inputs.len() && outputs.len() == self.outputs.len(),
            "Hybrid executable called with {} inputs and {} outputs, expects {} and {}",
            inputs.len(),
            outputs.len(),
            self.inputs.len(),
            self.outputs.len()
        );
        let mut values: Vec<Option<Handle>> = vec![None; self.facts.len()];
        for (&source, &input) in self.inputs.iter().zip(inputs.iter()) {
            // Results are written as soon as their partition completes, so
            // a Parameter that is also a Result tensor is read up front.
            if outputs.iter().any(|&o| std::ptr::addr_eq(o, input)) {
                trace!("hybrid: Parameter #{source} aliases a Result, taking a copy");
                values[source] = Some(Handle::Owned(self.backends[0].create_tensor_from(input.read()?)?));
            } else {
                values[source] = Some(Handle::Borrowed(input));
            }
        }
        for wave in 0..self.waves.len() {
            let jobs = self.waves[wave]
                .iter()
                .map(|&p| self.prepare(p, &values, outputs))
                .collect::<TesselResult<Vec<_>>>()?;
            trace!("hybrid: wave {wave}, partitions {:?}", self.waves[wave]);
            let done = if jobs.len() == 1 {
                vec![run(&mut self.executables[jobs[0].partition], &jobs[0])?]
            } else {
                let mut executables: Vec<&mut Box<dyn Executable>> = self
                    .executables
                    .iter_mut()
                    .enumerate()
                    .filter(|(ix, _)| self.partitions[*ix].wave == wave)
                    .map(|(_, e)| e)
                    .collect();
                executables
                    .par_iter_mut()
                    .zip(jobs.par_iter())
                    .map(|(exe, job)| run(exe, job))
                    .collect::<TesselResult<Vec<bool>>>()?
            };
            if let Some(pos) = done.iter().position(|ok| !ok) {
                debug!("hybrid: partition {} did not complete", self.partitions[jobs[pos].partition].function.name);
                return Ok(false);
            }
            for job in jobs {
                for (&o, handle) in self.partitions[job.partition].outputs.iter().zip(job.outputs) {
                    values[o] = Some(handle);
                }
            }
            for &released in &self.release_after[wave] {
                values[released] = None;
            }
        }
        for (&o, &output) in self.outputs.iter().zip(outputs.iter()) {
            let value = values[o].as_ref().with_context(|| format!("No value for output #{o}"))?;
            if !std::ptr::addr_eq(value.get(), output) {
                output.write(&value.get().read()?)?;
            }
        }
        Ok(true)
    }

    fn performance_data(&self) -> Vec<PerformanceCounter> {
        self.executables
            .iter()
            .enumerate()
            .flat_map(|(ix, e)| {
                e.performance_data().into_iter().map(move |c| PerformanceCounter {
                    name: format!("{ix}/{}", c.name),
                    ..c
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::{CpuBackend, CpuTensor};
    use crate::hybrid::HybridBackend;
    use crate::interpreter::{InterpreterBackend, InterpreterTensor};
    use crate::ops::binary::{Binary, BinaryKind};
    use crate::ops::unary::{Unary, UnaryKind};

    fn hybrid() -> HybridBackend {
        HybridBackend::new(vec![Box::new(CpuBackend), Box::new(InterpreterBackend)]).unwrap()
    }

    #[test]
    fn fork_runs_in_one_wave() -> TesselResult<()> {
        crate::setup_test_logger();
        let mut function = Function::new("fork");
        let x = function.add_source("x", TypedFact::shape::<f32, _>([2]))?;
        let y = function.add_source("y", TypedFact::shape::<i32, _>([2]))?;
        let a = function.wire_node("a", Unary(UnaryKind::Neg), &[x])?;
        let b = function.wire_node("b", Unary(UnaryKind::Abs), &[y])?;
        function.set_outputs(&[a, b])?;
        let backend = hybrid();
        let mut exe = backend.compile_with_placement(&function, &Placement(vec![0, 0, 0, 1]))?;
        assert_eq!(exe.waves(), &[vec![0, 1]]);
        let x = CpuBackend.create_tensor_from(Tensor::from_shape(&[2], &[1f32, -2.])?)?;
        let y = CpuBackend.create_tensor_from(Tensor::from_shape(&[2], &[-3i32, 4])?)?;
        let a = InterpreterBackend.create_tensor(DatumType::F32, &[2])?;
        let b = CpuBackend.create_tensor(DatumType::I32, &[2])?;
        assert!(exe.call_with_validate(&[a.clone(), b.clone()], &[x, y])?);
        assert_eq!(a.read()?.as_slice::<f32>()?, &[-1., 2.]);
        assert_eq!(b.read()?.as_slice::<i32>()?, &[3, 4]);
        assert!(a.is::<InterpreterTensor>());
        assert!(b.is::<CpuTensor>());
        Ok(())
    }

    #[test]
    fn boundaries_are_released() -> TesselResult<()> {
        let mut function = Function::new("chain");
        let x = function.add_source("x", TypedFact::shape::<f32, _>([2]))?;
        let a = function.wire_node("a", Unary(UnaryKind::Exp), &[x])?;
        let b = function.wire_node("b", Unary(UnaryKind::Neg), &[a])?;
        let c = function.wire_node("c", Binary(BinaryKind::Add), &[b, b])?;
        function.set_outputs(&[c])?;
        let exe = hybrid().compile_with_placement(&function, &Placement(vec![0, 0, 1, 0]))?;
        assert_eq!(exe.partitions().len(), 3);
        assert_eq!(exe.release_after, vec![vec![x], vec![a], vec![b]]);
        Ok(())
    }

    #[test]
    fn result_from_a_parameter() -> TesselResult<()> {
        let mut function = Function::new("passthrough");
        let x = function.add_source("x", TypedFact::shape::<u8, _>([3]))?;
        function.set_outputs(&[x])?;
        let mut exe = hybrid().compile(&function)?;
        let input = CpuBackend.create_tensor_from(Tensor::from_shape(&[3], &[1u8, 2, 3])?)?;
        let output = InterpreterBackend.create_tensor(DatumType::U8, &[3])?;
        assert!(exe.call_with_validate(&[output.clone()], &[input])?);
        assert_eq!(output.read()?.as_slice::<u8>()?, &[1, 2, 3]);
        Ok(())
    }

    #[test]
    fn result_overwriting_a_parameter() -> TesselResult<()> {
        let mut function = Function::new("in_place");
        let x = function.add_source("x", TypedFact::shape::<f32, _>([2]))?;
        let a = function.wire_node("a", Unary(UnaryKind::Neg), &[x])?;
        let b = function.wire_node("b", Binary(BinaryKind::Add), &[x, a])?;
        function.set_outputs(&[a, b])?;
        let mut exe = hybrid().compile_with_placement(&function, &Placement(vec![0, 0, 1]))?;
        let x = CpuBackend.create_tensor_from(Tensor::from_shape(&[2], &[2f32, 4.])?)?;
        let b = CpuBackend.create_tensor(DatumType::F32, &[2])?;
        assert!(exe.call_with_validate(&[x.clone(), b.clone()], &[x.clone()])?);
        assert_eq!(x.read()?.as_slice::<f32>()?, &[-2., -4.]);
        assert_eq!(b.read()?.as_slice::<f32>()?, &[0., 0.]);
        Ok(())
    }

    #[test]
    fn prefixed_performance_data() -> TesselResult<()> {
        let mut function = Function::new("profiled");
        let x = function.add_source("x", TypedFact::shape::<f32, _>([2]))?;
        let a = function.wire_node("a", Unary(UnaryKind::Sqrt), &[x])?;
        let b = function.wire_node("b", Unary(UnaryKind::Relu), &[a])?;
        function.set_outputs(&[b])?;
        let mut exe = hybrid().compile_with_placement(&function, &Placement(vec![0, 0, 1]))?;
        assert!(exe.performance_data().is_empty());
        let x = CpuBackend.create_tensor_from(Tensor::from_shape(&[2], &[4f32, 9.])?)?;
        let b = CpuBackend.create_tensor(DatumType::F32, &[2])?;
        assert!(exe.call(&[b.clone()], &[x])?);
        assert_eq!(b.read()?.as_slice::<f32>()?, &[2., 3.]);
        let names = exe.performance_data().into_iter().map(|c| c.name).collect::<Vec<_>>();
        assert_eq!(names, vec!["1/b"]);
        Ok(())
    }
}
