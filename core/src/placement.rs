//! Assignment of every node of a function to one sub-backend of a hybrid
//! backend.
//!
//! The result is a side table indexed by node id. It lives with the
//! compilation pipeline and is dropped once partitions are built.
use crate::internal::*;

/// Sub-backend index of every node, indexed by node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placement(pub Vec<usize>);

impl Placement {
    pub fn backend_for(&self, node: usize) -> usize {
        self.0[node]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Every node has an in-range index, and its sub-backend supports it.
    pub fn check(&self, function: &Function, backends: &[Arc<dyn Backend>]) -> TesselResult<()> {
        ensure!(
            self.0.len() == function.nodes.len(),
            "Placement covers {} nodes, function {} has {}",
            self.0.len(),
            function.name,
            function.nodes.len()
        );
        for (node, &ix) in function.nodes.iter().zip(self.0.iter()) {
            let Some(backend) = backends.get(ix) else {
                return Err(PlacementError::new(
                    node.name.clone(),
                    node.capability(),
                    format!("assigned to sub-backend {ix}, only {} available", backends.len()),
                )
                .into());
            };
            if !backend.supports(node) {
                return Err(PlacementError::new(
                    node.name.clone(),
                    node.capability(),
                    format!("assigned to sub-backend {ix} ({}) which does not support it", backend.name()),
                )
                .into());
            }
        }
        Ok(())
    }
}

/// Decides which sub-backend runs each node. Implementations must be
/// deterministic for a given function and sub-backend list.
pub trait PlacementPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> StaticName;

    fn assign(&self, function: &Function, backends: &[Arc<dyn Backend>]) -> TesselResult<Placement>;
}

fn capable(node: &Node, backends: &[Arc<dyn Backend>]) -> TVec<usize> {
    backends.iter().enumerate().filter(|(_, b)| b.supports(node)).map(|(ix, _)| ix).collect()
}

fn no_capable_backend(node: &Node) -> TesselError {
    PlacementError::new(node.name.clone(), node.capability(), "no sub-backend supports it".into())
        .into()
}

/// First sub-backend, in declaration order, that supports the node.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCapable;

impl PlacementPolicy for FirstCapable {
    fn name(&self) -> StaticName {
        "first-capable".into()
    }

    fn assign(&self, function: &Function, backends: &[Arc<dyn Backend>]) -> TesselResult<Placement> {
        function
            .nodes
            .iter()
            .map(|node| {
                backends.iter().position(|b| b.supports(node)).ok_or_else(|| no_capable_backend(node))
            })
            .collect::<TesselResult<Vec<_>>>()
            .map(Placement)
    }
}

/// Spreads computing nodes over the capable sub-backends, in node order.
/// Sources stay on the first capable one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl PlacementPolicy for RoundRobin {
    fn name(&self) -> StaticName {
        "round-robin".into()
    }

    fn assign(&self, function: &Function, backends: &[Arc<dyn Backend>]) -> TesselResult<Placement> {
        let mut turn = 0;
        let mut placement = Vec::with_capacity(function.nodes.len());
        for node in &function.nodes {
            let capable = capable(node, backends);
            if capable.is_empty() {
                return Err(no_capable_backend(node));
            }
            if node.op_is::<Source>() {
                placement.push(capable[0]);
            } else {
                placement.push(capable[turn % capable.len()]);
                turn += 1;
            }
        }
        Ok(Placement(placement))
    }
}

/// Caller-chosen sub-backend per node name. Unlisted nodes go through the
/// fallback policy.
#[derive(Debug)]
pub struct Explicit {
    pub assignments: HashMap<String, usize>,
    pub fallback: Box<dyn PlacementPolicy>,
}

impl Explicit {
    pub fn new(assignments: HashMap<String, usize>) -> Explicit {
        Explicit { assignments, fallback: Box::new(FirstCapable) }
    }

    pub fn with_fallback(self, fallback: impl PlacementPolicy + 'static) -> Explicit {
        Explicit { fallback: Box::new(fallback), ..self }
    }
}

impl PlacementPolicy for Explicit {
    fn name(&self) -> StaticName {
        format!("explicit({})", self.fallback.name()).into()
    }

    fn assign(&self, function: &Function, backends: &[Arc<dyn Backend>]) -> TesselResult<Placement> {
        for name in self.assignments.keys() {
            ensure!(
                function.node_by_name(name).is_some(),
                "Explicit placement names {}, not a node of {}",
                name,
                function.name
            );
        }
        let mut placement = self.fallback.assign(function, backends)?;
        for node in &function.nodes {
            if let Some(&ix) = self.assignments.get(&node.name) {
                placement.0[node.id] = ix;
            }
        }
        Ok(placement)
    }
}

/// Runs the policy and checks its output.
pub fn assign_placement(
    function: &Function,
    backends: &[Arc<dyn Backend>],
    policy: &dyn PlacementPolicy,
) -> TesselResult<Placement> {
    let placement = policy
        .assign(function, backends)
        .with_context(|| format!("Placing {} with {}", function.name, policy.name()))?;
    placement.check(function, backends)?;
    for node in &function.nodes {
        debug!("placement: {} -> {}", node, backends[placement.backend_for(node.id)].name());
    }
    Ok(placement)
}
