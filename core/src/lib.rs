//! # Tessel
//!
//! Execution-dispatch core of the tessel runtime: compiled graphs
//! (`Executable`) with a frozen, validated call contract, and pluggable
//! `Backend`s, including a hybrid backend that places every node of a graph
//! on one of its sub-backends and stitches the partial results together.
//!
//! ## Example
//!
//! ```
//! use tessel_core::internal::*;
//! use tessel_core::ops::binary::{Binary, BinaryKind};
//!
//! # fn main() -> TesselResult<()> {
//! let mut function = Function::new("add");
//! let a = function.add_source("a", TypedFact::dt_shape(DatumType::F32, [2]))?;
//! let b = function.add_source("b", TypedFact::dt_shape(DatumType::F32, [2]))?;
//! let sum = function.wire_node("sum", Binary(BinaryKind::Add), &[a, b])?;
//! function.set_outputs(&[sum])?;
//!
//! let backend = new_backend("hybrid:cpu,interpreter")?;
//! let mut executable = backend.compile(&function)?;
//!
//! let a = backend.create_tensor_from(Tensor::from_shape(&[2], &[1f32, 2.0])?)?;
//! let b = backend.create_tensor_from(Tensor::from_shape(&[2], &[3f32, 4.0])?)?;
//! let sum = backend.create_tensor(DatumType::F32, &[2])?;
//! assert!(executable.call_with_validate(&[sum.clone()], &[a, b])?);
//! assert_eq!(sum.read()?.as_slice::<f32>()?, &[4.0, 6.0]);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate derive_new;
#[allow(unused_imports)]
#[macro_use]
extern crate log;

pub mod backend;
pub mod cpu;
pub mod errors;
pub mod executable;
pub mod hybrid;
pub mod interpreter;
pub mod model;
pub mod ops;
pub mod placement;
pub mod registry;
pub mod tensor;

pub use tessel_data;

/// Fallible result of every tessel operation.
///
/// Errors from the taxonomy in `errors` travel inside it and can be
/// recovered with `downcast_ref`.
pub type TesselResult<T> = anyhow::Result<T>;
pub type TesselError = anyhow::Error;

pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::executable::{Executable, PerformanceCounter, Signature};
    pub use crate::model::{Function, Node, Output, Parameter, TypedFact};
    pub use crate::registry::{BackendRegistry, new_backend, version};
    pub use crate::tensor::BackendTensor;
    pub use crate::{TesselError, TesselResult};
    pub use tessel_data::prelude::*;
}

pub mod internal {
    pub use crate::errors::*;
    pub use crate::ops::{Op, konst::Const, source::Source};
    pub use crate::placement::{Placement, PlacementPolicy};
    pub use crate::prelude::*;
    pub use crate::tensor::TensorCell;
    pub use anyhow::{Context as _, bail, ensure, format_err};
    pub use std::borrow::Cow;
    pub use std::collections::HashMap;
    pub use std::fmt;
    pub use std::sync::Arc;
    pub use tessel_data::internal::*;
    pub use tessel_data::internal::tessel_itertools::Itertools;

    pub type StaticName = Cow<'static, str>;
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("TESSEL_LOG").is_test(true).try_init();
}
