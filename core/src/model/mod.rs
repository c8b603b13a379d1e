//! Graph descriptor consumed by backends.
//!
//! A `Function` is an append-only list of single-output nodes. Sources are
//! the declared Parameters, in declaration order; `set_outputs` declares the
//! Results. Nodes can only be wired to nodes that already exist, so the
//! graph is acyclic by construction.
use std::fmt;

use crate::internal::*;
use crate::ops::source::Source;

mod fact;
pub mod order;

pub use fact::TypedFact;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub name: String,
    pub op: Box<dyn Op>,
    pub inputs: TVec<usize>,
    pub fact: TypedFact,
}

impl Node {
    pub fn op(&self) -> &dyn Op {
        &*self.op
    }

    pub fn op_as<O: Op>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    pub fn op_is<O: Op>(&self) -> bool {
        self.op_as::<O>().is_some()
    }

    /// What a backend must be able to run to host this node, as
    /// `OpName:datum_type`.
    pub fn capability(&self) -> String {
        format!("{}:{}", self.op.name(), self.fact.datum_type)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} \"{}\" {}", self.id, self.name, self.op.name())
    }
}

/// A declared input slot of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub fact: TypedFact,
}

/// A declared output slot (a "Result") of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Output {
    pub name: String,
    pub fact: TypedFact,
}

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub name: String,
    pub nodes: Vec<Node>,
    /// Source nodes, in positional order.
    pub inputs: Vec<usize>,
    /// Result nodes, in positional order.
    pub outputs: Vec<usize>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Function {
        Function { name: name.into(), ..Function::default() }
    }

    /// Appends a node computing `op` over the values of `inputs`. The
    /// output fact is inferred by the op.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        inputs: &[usize],
    ) -> TesselResult<usize> {
        let name = name.into();
        let op = op.into();
        ensure!(self.node_by_name(&name).is_none(), "Duplicate node name {}", name);
        for &input in inputs {
            ensure!(input < self.nodes.len(), "Node {} wired to missing node #{}", name, input);
        }
        let fact = {
            let facts: TVec<&TypedFact> = inputs.iter().map(|&i| &self.nodes[i].fact).collect();
            op.output_fact(&facts).with_context(|| format!("Wiring node {name}"))?
        };
        let id = self.nodes.len();
        self.nodes.push(Node { id, name, op, inputs: inputs.into(), fact });
        Ok(id)
    }

    /// Declares the next Parameter.
    pub fn add_source(&mut self, name: impl Into<String>, fact: TypedFact) -> TesselResult<usize> {
        let id = self.wire_node(name, Source::new(fact), &[])?;
        self.inputs.push(id);
        Ok(id)
    }

    pub fn add_const(
        &mut self,
        name: impl Into<String>,
        value: impl IntoArcTensor,
    ) -> TesselResult<usize> {
        self.wire_node(name, Const::new(value.into_arc_tensor()), &[])
    }

    /// Declares the Results, replacing any previous declaration.
    pub fn set_outputs(&mut self, outputs: &[usize]) -> TesselResult<()> {
        for &o in outputs {
            ensure!(o < self.nodes.len(), "Output node #{} does not exist", o);
        }
        self.outputs = outputs.to_vec();
        Ok(())
    }

    /// Changes the declared fact of a Parameter. Facts downstream of it are
    /// not re-inferred.
    pub fn set_source_fact(&mut self, id: usize, fact: TypedFact) -> TesselResult<()> {
        let node = self.nodes.get_mut(id).with_context(|| format!("No node #{id}"))?;
        let Some(source) = node.op.downcast_mut::<Source>() else {
            bail!("Node {} is not a source", node);
        };
        source.fact = fact.clone();
        node.fact = fact;
        Ok(())
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.inputs
            .iter()
            .map(|&i| Parameter { name: self.nodes[i].name.clone(), fact: self.nodes[i].fact.clone() })
            .collect()
    }

    pub fn results(&self) -> Vec<Output> {
        self.outputs
            .iter()
            .map(|&o| Output { name: self.nodes[o].name.clone(), fact: self.nodes[o].fact.clone() })
            .collect()
    }

    /// Nodes needed to compute the Results, each after its inputs.
    pub fn eval_order(&self) -> TesselResult<Vec<usize>> {
        order::eval_order_for_nodes(&self.nodes, &self.inputs, &self.outputs)
    }

    /// For every node, the nodes consuming its value.
    pub fn successors(&self) -> Vec<TVec<usize>> {
        let mut successors = vec![tvec!(); self.nodes.len()];
        for node in &self.nodes {
            for &input in &node.inputs {
                if !successors[input].contains(&node.id) {
                    successors[input].push(node.id);
                }
            }
        }
        successors
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Function {}", self.name)?;
        for node in &self.nodes {
            writeln!(
                f,
                "  {} [{}] -> {}",
                node,
                node.inputs.iter().map(|i| format!("#{i}")).join(", "),
                node.fact
            )?;
        }
        Ok(())
    }
}
