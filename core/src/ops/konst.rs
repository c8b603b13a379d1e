use crate::internal::*;

#[derive(Debug, Clone, new, PartialEq)]
pub struct Const(pub Arc<Tensor>);

impl Const {
    pub fn val(&self) -> &Arc<Tensor> {
        &self.0
    }
}

impl Op for Const {
    fn name(&self) -> StaticName {
        "Const".into()
    }

    fn output_fact(&self, inputs: &[&TypedFact]) -> TesselResult<TypedFact> {
        crate::ops::check_input_arity(inputs.len(), 0)?;
        Ok(TypedFact::from(&*self.0))
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> TesselResult<Arc<Tensor>> {
        Ok(self.0.clone())
    }
}
