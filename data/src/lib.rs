#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere in tessel, for node inputs, signatures and
/// tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub mod prelude {
    pub use crate::datum::{Datum, DatumType};
    pub use crate::tensor::{IntoArcTensor, Tensor};
    pub use crate::tvec;
    pub use crate::TVec;
    pub use crate::{dispatch_datum, dispatch_floatlike, dispatch_numbers, dispatch_signed};
    pub use half::f16;
}

pub mod internal {
    pub use crate::prelude::*;
    pub use itertools as tessel_itertools;
    pub use ndarray as tessel_ndarray;
    pub use num_traits as tessel_num_traits;
    pub use smallvec as tessel_smallvec;
}

pub use anyhow;

mod datum;
mod tensor;
