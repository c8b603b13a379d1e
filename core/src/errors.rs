//! Typed failures raised synchronously to the immediate caller.
//!
//! They all travel inside a `TesselResult` and can be recovered with
//! `err.downcast_ref::<ContractViolation>()` and friends.
use std::fmt;

use tessel_data::internal::tessel_itertools::Itertools;
use tessel_data::prelude::*;

/// Which side of a call a contract violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Input,
    Output,
}

impl Slot {
    fn declared_as(&self) -> &'static str {
        match self {
            Slot::Input => "Parameter",
            Slot::Output => "Result",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Input => write!(f, "Input"),
            Slot::Output => write!(f, "Output"),
        }
    }
}

/// A call did not match the frozen parameter/result contract of an
/// executable. Only the first violation is ever reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    CountMismatch { slot: Slot, expected: usize, actual: usize },
    TypeMismatch { slot: Slot, index: usize, expected: DatumType, actual: DatumType },
    ShapeMismatch { slot: Slot, index: usize, expected: TVec<usize>, actual: TVec<usize> },
}

impl ContractViolation {
    pub fn slot(&self) -> Slot {
        match self {
            ContractViolation::CountMismatch { slot, .. }
            | ContractViolation::TypeMismatch { slot, .. }
            | ContractViolation::ShapeMismatch { slot, .. } => *slot,
        }
    }

    /// Positional index of the offending tensor, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            ContractViolation::CountMismatch { .. } => None,
            ContractViolation::TypeMismatch { index, .. }
            | ContractViolation::ShapeMismatch { index, .. } => Some(*index),
        }
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContractViolation::CountMismatch { slot, expected, actual } => write!(
                f,
                "Call {} count {actual} does not match Function's {} count {expected}",
                slot.to_string().to_lowercase(),
                slot.declared_as()
            ),
            ContractViolation::TypeMismatch { slot, index, expected, actual } => write!(
                f,
                "{slot} {index} type '{actual}' does not match {} type '{expected}'",
                slot.declared_as()
            ),
            ContractViolation::ShapeMismatch { slot, index, expected, actual } => write!(
                f,
                "{slot} {index} shape {{{}}} does not match {} shape {{{}}}",
                actual.iter().join(","),
                slot.declared_as(),
                expected.iter().join(",")
            ),
        }
    }
}

impl std::error::Error for ContractViolation {}

/// A backend can not lower a function.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct CompilationError {
    pub backend: String,
    pub node: String,
    pub reason: String,
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Backend {} can not compile node {}: {}", self.backend, self.node, self.reason)
    }
}

impl std::error::Error for CompilationError {}

/// Hybrid placement could not give every node a legal sub-backend.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct PlacementError {
    pub node: String,
    pub capability: String,
    pub reason: String,
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Can not place node {} (requires {}): {}", self.node, self.capability, self.reason)
    }
}

impl std::error::Error for PlacementError {}

/// Registry lookup miss.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct UnknownBackendError {
    pub name: String,
    pub known: Vec<String>,
}

impl fmt::Display for UnknownBackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unknown backend '{}' (known backends: {})", self.name, self.known.join(", "))
    }
}

impl std::error::Error for UnknownBackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let count = ContractViolation::CountMismatch { slot: Slot::Input, expected: 2, actual: 1 };
        assert_eq!(
            count.to_string(),
            "Call input count 1 does not match Function's Parameter count 2"
        );
        let dt = ContractViolation::TypeMismatch {
            slot: Slot::Output,
            index: 0,
            expected: DatumType::F32,
            actual: DatumType::I32,
        };
        assert_eq!(dt.to_string(), "Output 0 type 'i32' does not match Result type 'f32'");
        let shape = ContractViolation::ShapeMismatch {
            slot: Slot::Input,
            index: 1,
            expected: tvec![2, 2],
            actual: tvec![3, 3],
        };
        assert_eq!(shape.to_string(), "Input 1 shape {3,3} does not match Parameter shape {2,2}");
        assert_eq!(shape.index(), Some(1));
        assert_eq!(count.index(), None);
    }

    #[test]
    fn survives_anyhow_context() {
        let err: anyhow::Error = PlacementError::new("n".into(), "MatMul:i8".into(), "x".into()).into();
        let err = err.context("compiling");
        assert!(err.downcast_ref::<PlacementError>().is_some());
    }
}
