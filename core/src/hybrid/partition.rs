use crate::internal::*;

/// A contiguous region of the evaluation order placed on one sub-backend,
/// as a standalone function.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Sub-backend index.
    pub backend: usize,
    /// Region members, as node ids of the split function.
    pub nodes: Vec<usize>,
    /// Values feeding the partition sources, in positional order.
    pub inputs: Vec<usize>,
    /// Values the partition exports, in positional order.
    pub outputs: Vec<usize>,
    pub function: Function,
    /// Partitions of the same wave do not depend on each other.
    pub wave: usize,
}

/// Cuts the evaluation order of `function` into maximal runs of nodes with
/// the same placement. Sources are left out: they are inputs of whichever
/// partition consumes them.
///
/// Regions follow a topological order, so the partition graph is acyclic
/// and every partition only depends on earlier ones.
pub fn split_by_placement(function: &Function, placement: &Placement) -> TesselResult<Vec<Partition>> {
    let order = function.eval_order()?;
    let mut regions: Vec<(usize, Vec<usize>)> = vec![];
    let mut region_of: Vec<Option<usize>> = vec![None; function.nodes.len()];
    for &n in &order {
        if function.node(n).op_is::<Source>() {
            continue;
        }
        let backend = placement.backend_for(n);
        match regions.last_mut() {
            Some((b, nodes)) if *b == backend => nodes.push(n),
            _ => regions.push((backend, vec![n])),
        }
        region_of[n] = Some(regions.len() - 1);
    }

    let successors = function.successors();
    let mut partitions: Vec<Partition> = Vec::with_capacity(regions.len());
    for (ix, (backend, nodes)) in regions.into_iter().enumerate() {
        let mut inputs: Vec<usize> = vec![];
        for &n in &nodes {
            for &i in &function.node(n).inputs {
                if region_of[i] != Some(ix) && !inputs.contains(&i) {
                    inputs.push(i);
                }
            }
        }
        let outputs: Vec<usize> = nodes
            .iter()
            .copied()
            .filter(|&n| {
                function.outputs.contains(&n)
                    || successors[n].iter().any(|&s| region_of[s].is_some_and(|r| r != ix))
            })
            .collect();
        let wave = inputs
            .iter()
            .filter_map(|&i| region_of[i])
            .map(|producer| partitions[producer].wave + 1)
            .max()
            .unwrap_or(0);
        let sub = sub_function(function, ix, &nodes, &inputs, &outputs)?;
        partitions.push(Partition { backend, nodes, inputs, outputs, function: sub, wave });
    }
    Ok(partitions)
}

fn sub_function(
    function: &Function,
    ix: usize,
    nodes: &[usize],
    inputs: &[usize],
    outputs: &[usize],
) -> TesselResult<Function> {
    let mut sub = Function::new(format!("{}.{}", function.name, ix));
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    for &i in inputs {
        let node = function.node(i);
        mapping.insert(i, sub.add_source(&*node.name, node.fact.clone())?);
    }
    for &n in nodes {
        let node = function.node(n);
        let wires = node.inputs.iter().map(|i| mapping[i]).collect::<TVec<_>>();
        mapping.insert(n, sub.wire_node(&*node.name, node.op.clone(), &wires)?);
    }
    sub.set_outputs(&outputs.iter().map(|o| mapping[o]).collect::<Vec<_>>())?;
    Ok(sub)
}
