use crate::TesselResult;
use crate::model::Node;

/// Evaluation order of the nodes needed to compute `targets`.
///
/// Depth-first from the targets, every node comes after all of its inputs.
/// Nodes in `inputs` are considered available and never look at their own
/// inputs.
pub fn eval_order_for_nodes(
    nodes: &[Node],
    inputs: &[usize],
    targets: &[usize],
) -> TesselResult<Vec<usize>> {
    let mut done = bit_set::BitSet::with_capacity(nodes.len());
    let mut pending = bit_set::BitSet::with_capacity(nodes.len());
    let mut needed: Vec<usize> = vec![];
    let mut order: Vec<usize> = vec![];
    for &t in targets.iter().rev() {
        anyhow::ensure!(t < nodes.len(), "Target node #{} does not exist", t);
        needed.push(t);
    }
    while let Some(&node) = needed.last() {
        if done.contains(node) {
            needed.pop();
            continue;
        }
        if inputs.contains(&node) || nodes[node].inputs.iter().all(|i| done.contains(*i)) {
            order.push(node);
            needed.pop();
            done.insert(node);
        } else {
            anyhow::ensure!(pending.insert(node), "Cycle in graph around node {}", nodes[node]);
            for &input in nodes[node].inputs.iter().rev() {
                if !done.contains(input) {
                    needed.push(input);
                }
            }
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use crate::internal::*;
    use crate::ops::binary::{Binary, BinaryKind};

    #[test]
    fn test_simple() {
        let mut function = Function::new("simple");
        let a = function.add_source("a", TypedFact::shape::<f32, _>([])).unwrap();
        let b = function.add_const("b", Tensor::from(12.0f32)).unwrap();
        let add = function.wire_node("add", Binary(BinaryKind::Add), &[a, b]).unwrap();
        function.set_outputs(&[add]).unwrap();
        assert_eq!(function.eval_order().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_diamond() {
        let mut function = Function::new("diamond");
        let a = function.add_source("a", TypedFact::shape::<f32, _>([])).unwrap();
        let add = function.wire_node("add", Binary(BinaryKind::Add), &[a, a]).unwrap();
        function.set_outputs(&[add]).unwrap();
        assert_eq!(function.eval_order().unwrap(), vec![0, 1]);
    }

    #[test]
    fn unreachable_nodes_are_skipped() {
        let mut function = Function::new("dangling");
        let a = function.add_source("a", TypedFact::shape::<f32, _>([])).unwrap();
        let _dead = function.wire_node("dead", Binary(BinaryKind::Mul), &[a, a]).unwrap();
        let live = function.wire_node("live", Binary(BinaryKind::Add), &[a, a]).unwrap();
        function.set_outputs(&[live]).unwrap();
        assert_eq!(function.eval_order().unwrap(), vec![a, live]);
    }
}
