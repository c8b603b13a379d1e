//! Ops
use std::fmt;

use downcast_rs::{Downcast, impl_downcast};
use dyn_clone::DynClone;

use crate::internal::*;

pub mod binary;
pub mod konst;
pub mod matmul;
pub mod source;
pub mod unary;

/// A node operation, evaluated on host tensors.
///
/// Every op has exactly one output. Backends decide which ops they can
/// host; the evaluation itself is shared so that the same node gives
/// bit-identical results on every backend.
pub trait Op: fmt::Debug + DynClone + Send + Sync + 'static + Downcast {
    fn name(&self) -> StaticName;

    /// Infers the output fact from the input facts, rejecting malformed
    /// wirings.
    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact>;

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>>;
}

dyn_clone::clone_trait_object!(Op);
impl_downcast!(Op);

impl<O: Op> From<O> for Box<dyn Op> {
    fn from(it: O) -> Box<dyn Op> {
        Box::new(it)
    }
}

pub fn check_input_arity(inputs: usize, expected: usize) -> TesselResult<()> {
    if inputs != expected {
        bail!("Wrong input number. Op expects {}, node has {}.", expected, inputs)
    } else {
        Ok(())
    }
}
