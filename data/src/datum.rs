//! Element types of tensors, parameters and results.
use std::fmt;
use std::hash::Hash;

use half::f16;

/// Fixed-width element type tag. Never coerced implicitly: two types are
/// compatible only when they are equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum DatumType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DatumType {
    pub const ALL: [DatumType; 12] = [
        DatumType::Bool,
        DatumType::U8,
        DatumType::U16,
        DatumType::U32,
        DatumType::U64,
        DatumType::I8,
        DatumType::I16,
        DatumType::I32,
        DatumType::I64,
        DatumType::F16,
        DatumType::F32,
        DatumType::F64,
    ];

    pub fn is_unsigned(&self) -> bool {
        matches!(self, DatumType::U8 | DatumType::U16 | DatumType::U32 | DatumType::U64)
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, DatumType::I8 | DatumType::I16 | DatumType::I32 | DatumType::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DatumType::F16 | DatumType::F32 | DatumType::F64)
    }

    pub fn is_number(&self) -> bool {
        *self != DatumType::Bool
    }

    pub fn size_of(&self) -> usize {
        dispatch_datum!(std::mem::size_of(self)())
    }

    pub fn name(&self) -> &'static str {
        match self {
            DatumType::Bool => "bool",
            DatumType::U8 => "u8",
            DatumType::U16 => "u16",
            DatumType::U32 => "u32",
            DatumType::U64 => "u64",
            DatumType::I8 => "i8",
            DatumType::I16 => "i16",
            DatumType::I32 => "i32",
            DatumType::I64 => "i64",
            DatumType::F16 => "f16",
            DatumType::F32 => "f32",
            DatumType::F64 => "f64",
        }
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DatumType {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<DatumType> {
        DatumType::ALL
            .iter()
            .find(|dt| dt.name() == s)
            .copied()
            .ok_or_else(|| anyhow::format_err!("Unknown datum type {s}"))
    }
}

/// A rust type that can live in a `Tensor`.
///
/// All datums are plain `Copy` values whose every bit pattern of the right
/// size is valid, except `bool`, which the tensor constructors guard.
pub trait Datum:
    Clone + Copy + Send + Sync + fmt::Debug + fmt::Display + Default + PartialEq + 'static
{
    fn name() -> &'static str;
    fn datum_type() -> DatumType;
}

macro_rules! datum {
    ($t:ty, $v:ident) => {
        impl From<$t> for crate::tensor::Tensor {
            fn from(it: $t) -> crate::tensor::Tensor {
                crate::tensor::Tensor::scalar(it)
            }
        }

        impl Datum for $t {
            fn name() -> &'static str {
                stringify!($t)
            }

            fn datum_type() -> DatumType {
                DatumType::$v
            }
        }
    };
}

datum!(bool, Bool);
datum!(f16, F16);
datum!(f32, F32);
datum!(f64, F64);
datum!(i8, I8);
datum!(i16, I16);
datum!(i32, I32);
datum!(i64, I64);
datum!(u8, U8);
datum!(u16, U16);
datum!(u32, U32);
datum!(u64, U64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(DatumType::Bool.size_of(), 1);
        assert_eq!(DatumType::F16.size_of(), 2);
        assert_eq!(DatumType::I32.size_of(), 4);
        assert_eq!(DatumType::U64.size_of(), 8);
    }

    #[test]
    fn display_and_parse() {
        for dt in DatumType::ALL {
            assert_eq!(dt.to_string().parse::<DatumType>().unwrap(), dt);
        }
        assert_eq!(format!("{}", DatumType::F32), "f32");
        assert!("f128".parse::<DatumType>().is_err());
    }

    #[test]
    fn families() {
        assert!(DatumType::F16.is_float());
        assert!(!DatumType::I8.is_float());
        assert!(DatumType::I8.is_signed());
        assert!(DatumType::U8.is_unsigned());
        assert!(!DatumType::Bool.is_number());
    }
}
