//! A backend made of sub-backends.
//!
//! Compilation places every node on a sub-backend, splits the function
//! into partitions along the placement, and has each sub-backend compile
//! its partitions. The resulting executable runs the partitions in
//! dependency order and moves boundary values between sub-backends.
use crate::internal::*;
use crate::placement::{FirstCapable, assign_placement};

mod executable;
pub mod partition;

pub use executable::HybridExecutable;
pub use partition::{Partition, split_by_placement};

#[derive(Debug)]
pub struct HybridBackend {
    backends: Vec<Arc<dyn Backend>>,
    policy: Box<dyn PlacementPolicy>,
}

impl HybridBackend {
    pub fn new(backends: Vec<Box<dyn Backend>>) -> TesselResult<HybridBackend> {
        ensure!(!backends.is_empty(), "Hybrid backend needs at least one sub-backend");
        Ok(HybridBackend {
            backends: backends.into_iter().map(Arc::from).collect(),
            policy: Box::new(FirstCapable),
        })
    }

    pub fn with_policy(self, policy: impl PlacementPolicy + 'static) -> HybridBackend {
        HybridBackend { policy: Box::new(policy), ..self }
    }

    pub fn sub_backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn policy(&self) -> &dyn PlacementPolicy {
        &*self.policy
    }

    /// Compiles with a placement computed elsewhere. The placement is
    /// checked before use.
    pub fn compile_with_placement(
        &self,
        function: &Function,
        placement: &Placement,
    ) -> TesselResult<HybridExecutable> {
        placement.check(function, &self.backends)?;
        let partitions = split_by_placement(function, placement)?;
        let executables = partitions
            .iter()
            .map(|p| {
                self.backends[p.backend]
                    .compile(&p.function)
                    .with_context(|| format!("Compiling partition {} on {}", p.function.name, self.backends[p.backend].name()))
            })
            .collect::<TesselResult<Vec<_>>>()?;
        for p in &partitions {
            debug!(
                "hybrid: partition {} on {} (wave {}): {} nodes, inputs {:?}, outputs {:?}",
                p.function.name,
                self.backends[p.backend].name(),
                p.wave,
                p.nodes.len(),
                p.inputs,
                p.outputs
            );
        }
        HybridExecutable::new(function, self.backends.clone(), partitions, executables)
    }
}

impl Backend for HybridBackend {
    fn name(&self) -> StaticName {
        format!("hybrid:{}", self.backends.iter().map(|b| b.name()).join(",")).into()
    }

    fn compile(&self, function: &Function) -> TesselResult<Box<dyn Executable>> {
        let placement = assign_placement(function, &self.backends, &*self.policy)?;
        Ok(Box::new(self.compile_with_placement(function, &placement)?))
    }

    fn create_tensor(
        &self,
        datum_type: DatumType,
        shape: &[usize],
    ) -> TesselResult<Arc<dyn BackendTensor>> {
        self.backends[0].create_tensor(datum_type, shape)
    }

    fn create_tensor_from(&self, tensor: Tensor) -> TesselResult<Arc<dyn BackendTensor>> {
        self.backends[0].create_tensor_from(tensor)
    }

    fn supports(&self, node: &Node) -> bool {
        self.backends.iter().any(|b| b.supports(node))
    }

    /// Hybrid executables stage foreign tensors themselves.
    fn accepts(&self, _tensor: &dyn BackendTensor) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use crate::interpreter::InterpreterBackend;

    #[test]
    fn needs_sub_backends() {
        assert!(HybridBackend::new(vec![]).is_err());
    }

    #[test]
    fn name_and_allocation() -> TesselResult<()> {
        let hybrid = HybridBackend::new(vec![Box::new(CpuBackend), Box::new(InterpreterBackend)])?;
        assert_eq!(hybrid.name(), "hybrid:cpu,interpreter");
        assert_eq!(hybrid.policy().name(), "first-capable");
        let t = hybrid.create_tensor(DatumType::F32, &[2])?;
        assert!(hybrid.sub_backends()[0].accepts(&*t));
        Ok(())
    }
}
