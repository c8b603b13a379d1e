//! Backend-owned tensor handles.
use downcast_rs::{DowncastSync, impl_downcast};
use parking_lot::RwLock;

use crate::internal::*;

/// A buffer allocated by a backend, with an element type and a shape fixed
/// at allocation.
///
/// Handles are shared (`Arc`) and written through `&self`: executables only
/// borrow them for the duration of a call, ownership stays with whoever
/// allocated them.
pub trait BackendTensor: fmt::Debug + DowncastSync {
    fn fact(&self) -> &TypedFact;

    /// Copies the content out to a host tensor.
    fn read(&self) -> TesselResult<Tensor>;

    /// Copies a host tensor in. The value must match the handle fact.
    fn write(&self, value: &Tensor) -> TesselResult<()>;

    /// Stores a shared host value. Host-backed handles keep the `Arc`
    /// without copying, replacing the value they held.
    fn write_shared(&self, value: Arc<Tensor>) -> TesselResult<()> {
        self.write(&value)
    }

    fn datum_type(&self) -> DatumType {
        self.fact().datum_type
    }

    fn shape(&self) -> &[usize] {
        &self.fact().shape
    }
}
impl_downcast!(sync BackendTensor);

/// Host memory behind a lock, shared by the host-resident backends.
#[derive(Debug)]
pub struct TensorCell {
    fact: TypedFact,
    data: RwLock<Arc<Tensor>>,
}

impl TensorCell {
    pub fn zero(fact: TypedFact) -> TesselResult<TensorCell> {
        let data = Tensor::zero_dt(fact.datum_type, &fact.shape)?;
        Ok(TensorCell { fact, data: RwLock::new(Arc::new(data)) })
    }

    /// Takes a host tensor without copying it.
    pub fn from_tensor(tensor: impl IntoArcTensor) -> TensorCell {
        let tensor = tensor.into_arc_tensor();
        TensorCell { fact: TypedFact::from(&*tensor), data: RwLock::new(tensor) }
    }

    pub fn fact(&self) -> &TypedFact {
        &self.fact
    }

    /// The current value, without copy.
    pub fn shared(&self) -> Arc<Tensor> {
        self.data.read().clone()
    }

    pub fn read(&self) -> TesselResult<Tensor> {
        Ok(Tensor::clone(&self.data.read()))
    }

    pub fn write(&self, value: &Tensor) -> TesselResult<()> {
        self.write_shared(Arc::new(value.clone()))
    }

    pub fn write_shared(&self, value: Arc<Tensor>) -> TesselResult<()> {
        ensure!(
            self.fact.matches(&value),
            "Can not store a {} value in a {} tensor",
            TypedFact::from(&*value),
            self.fact
        );
        *self.data.write() = value;
        Ok(())
    }
}

/// Implements `BackendTensor` for a newtype over `TensorCell`.
#[macro_export]
macro_rules! host_tensor {
    ($t:ident) => {
        impl $crate::tensor::HostResident for $t {
            fn cell(&self) -> &$crate::tensor::TensorCell {
                &self.0
            }
        }

        impl $crate::tensor::BackendTensor for $t {
            fn fact(&self) -> &$crate::model::TypedFact {
                self.0.fact()
            }

            fn read(&self) -> $crate::TesselResult<$crate::tessel_data::prelude::Tensor> {
                self.0.read()
            }

            fn write(&self, value: &$crate::tessel_data::prelude::Tensor) -> $crate::TesselResult<()> {
                self.0.write(value)
            }

            fn write_shared(
                &self,
                value: std::sync::Arc<$crate::tessel_data::prelude::Tensor>,
            ) -> $crate::TesselResult<()> {
                self.0.write_shared(value)
            }
        }
    };
}

/// A handle whose content lives in host memory.
pub trait HostResident: BackendTensor {
    fn cell(&self) -> &TensorCell;
}

/// Host value of any handle: shared without copy when the handle is a `T`,
/// copied out otherwise.
pub fn host_value<T: HostResident>(tensor: &dyn BackendTensor) -> TesselResult<Arc<Tensor>> {
    if let Some(native) = tensor.downcast_ref::<T>() {
        Ok(native.cell().shared())
    } else {
        Ok(Arc::new(tensor.read()?))
    }
}
