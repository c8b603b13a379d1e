use crate::internal::*;

/// A compiler and allocator: turns functions into executables and
/// allocates the tensors they run on.
///
/// Executables and tensors produced by a backend belong to the caller.
pub trait Backend: fmt::Debug + Send + Sync {
    fn name(&self) -> StaticName;

    /// Compiles a whole function. Fails with a `CompilationError` if the
    /// function contains a node the backend can not run.
    fn compile(&self, function: &Function) -> TesselResult<Box<dyn Executable>>;

    fn create_tensor(
        &self,
        datum_type: DatumType,
        shape: &[usize],
    ) -> TesselResult<Arc<dyn BackendTensor>>;

    /// Wraps a host tensor, taking ownership of it. Backends that can use
    /// host memory directly keep it without copy. Later writes to the handle
    /// replace its value: they are never visible through another copy of
    /// the original tensor.
    fn create_tensor_from(&self, tensor: Tensor) -> TesselResult<Arc<dyn BackendTensor>> {
        let handle = self.create_tensor(tensor.datum_type(), tensor.shape())?;
        handle.write(&tensor)?;
        Ok(handle)
    }

    /// Whether this backend can run the node. Drives hybrid placement.
    fn supports(&self, node: &Node) -> bool;

    /// Whether a tensor can be handed to this backend's executables as is,
    /// without staging a copy.
    fn accepts(&self, tensor: &dyn BackendTensor) -> bool;
}

/// Compilation-time check shared by primitive backends: every node
/// reachable from the Results must be supported.
pub fn check_supported(backend: &dyn Backend, function: &Function) -> TesselResult<Vec<usize>> {
    let order = function.eval_order()?;
    for &id in &order {
        let node = function.node(id);
        if !backend.supports(node) {
            return Err(CompilationError::new(
                backend.name().to_string(),
                node.name.clone(),
                format!("unsupported {}", node.capability()),
            )
            .into());
        }
    }
    Ok(order)
}
