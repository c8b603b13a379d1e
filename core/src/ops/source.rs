use crate::internal::*;

/// A Parameter of the function. Its value is bound by the caller.
#[derive(Debug, Clone, new, Hash, PartialEq, Eq)]
pub struct Source {
    pub fact: TypedFact,
}

impl Op for Source {
    fn name(&self) -> StaticName {
        "Source".into()
    }

    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact> {
        crate::ops::check_input_arity(inputs.len(), 0)?;
        Ok(self.fact.clone())
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>> {
        bail!("Sources are bound by the caller, not evaluated")
    }
}
