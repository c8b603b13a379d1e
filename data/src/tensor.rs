//! `Tensor` is the host-side value container of tessel.
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use ndarray::prelude::*;

use crate::TVec;
use crate::datum::{Datum, DatumType};

/// A host buffer with a fixed element type and shape.
///
/// Storage is a vector of `u64` words so that every supported element type
/// is correctly aligned when the buffer is viewed as a typed slice.
#[derive(Clone)]
pub struct Tensor {
    dt: DatumType,
    shape: TVec<usize>,
    len: usize,
    data: Vec<u64>,
}

impl Tensor {
    /// A tensor filled with zeroes (`false` for booleans).
    pub fn zero_dt(dt: DatumType, shape: &[usize]) -> anyhow::Result<Tensor> {
        let too_big = || anyhow::format_err!("Tensor of {dt:?} and shape {shape:?} is too big");
        let len = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).ok_or_else(too_big)?;
        let bytes = len.checked_mul(dt.size_of()).ok_or_else(too_big)?;
        Ok(Tensor { dt, shape: shape.into(), len, data: vec![0u64; bytes.div_ceil(8)] })
    }

    pub fn zero<T: Datum>(shape: &[usize]) -> anyhow::Result<Tensor> {
        Self::zero_dt(T::datum_type(), shape)
    }

    pub fn scalar<T: Datum>(value: T) -> Tensor {
        let mut t = Self::zero::<T>(&[]).expect("scalar always fits");
        t.as_slice_mut::<T>().expect("type checked")[0] = value;
        t
    }

    pub fn from_shape<T: Datum>(shape: &[usize], data: &[T]) -> anyhow::Result<Tensor> {
        let mut t = Self::zero::<T>(shape)?;
        anyhow::ensure!(
            t.len() == data.len(),
            "Shape {:?} requires {} elements, got {}",
            shape,
            t.len(),
            data.len()
        );
        t.as_slice_mut::<T>()?.copy_from_slice(data);
        Ok(t)
    }

    /// Builds a tensor from raw native-endian bytes.
    pub fn from_bytes(dt: DatumType, shape: &[usize], bytes: &[u8]) -> anyhow::Result<Tensor> {
        let mut t = Self::zero_dt(dt, shape)?;
        t.copy_from_bytes(bytes)?;
        Ok(t)
    }

    /// Overwrites the whole content from raw native-endian bytes.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(
            bytes.len() == self.byte_len(),
            "Expected {} bytes for {:?} {:?}, got {}",
            self.byte_len(),
            self.dt,
            self.shape,
            bytes.len()
        );
        if self.dt == DatumType::Bool {
            anyhow::ensure!(bytes.iter().all(|b| *b <= 1), "Invalid byte pattern for bool tensor");
        }
        self.bytes_mut().copy_from_slice(bytes);
        Ok(())
    }

    /// Same data, new shape with the same number of elements.
    pub fn into_shape(mut self, shape: &[usize]) -> anyhow::Result<Tensor> {
        anyhow::ensure!(
            shape.iter().product::<usize>() == self.len,
            "Can not reshape {:?} to {:?}",
            self.shape,
            shape
        );
        self.shape = shape.into();
        Ok(self)
    }

    pub fn datum_type(&self) -> DatumType {
        self.dt
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len * self.dt.size_of()
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const u8, self.byte_len()) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut u8, self.byte_len()) }
    }

    fn check_for_access<D: Datum>(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.dt == D::datum_type(),
            "Tensor datum type error: tensor is {:?}, accessed as {:?}",
            self.dt,
            D::datum_type()
        );
        Ok(())
    }

    pub fn as_slice<D: Datum>(&self) -> anyhow::Result<&[D]> {
        self.check_for_access::<D>()?;
        unsafe { Ok(std::slice::from_raw_parts(self.data.as_ptr() as *const D, self.len)) }
    }

    pub fn as_slice_mut<D: Datum>(&mut self) -> anyhow::Result<&mut [D]> {
        self.check_for_access::<D>()?;
        unsafe { Ok(std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut D, self.len)) }
    }

    pub fn to_scalar<D: Datum>(&self) -> anyhow::Result<D> {
        anyhow::ensure!(self.len == 1, "Tensor of shape {:?} is not a scalar", self.shape);
        Ok(self.as_slice::<D>()?[0])
    }

    pub fn to_array_view<D: Datum>(&self) -> anyhow::Result<ArrayViewD<'_, D>> {
        Ok(ArrayViewD::from_shape(&*self.shape, self.as_slice::<D>()?)?)
    }

    pub fn into_array<D: Datum>(self) -> anyhow::Result<ArrayD<D>> {
        Ok(self.to_array_view::<D>()?.to_owned())
    }

    fn dump_t<D: Datum>(&self, n: usize) -> anyhow::Result<String> {
        Ok(self.as_slice::<D>()?.iter().take(n).join(", "))
    }

    /// Short textual form, the first `n` values at most.
    pub fn dump(&self, n: usize) -> anyhow::Result<String> {
        let values = dispatch_datum!(Self::dump_t(self.dt)(self, n))?;
        let ellipsis = if self.len > n { ", ..." } else { "" };
        Ok(format!("{},{:?} [{values}{ellipsis}]", self.shape.iter().join(","), self.dt))
    }
}

impl PartialEq for Tensor {
    /// Bitwise equality: NaNs compare equal to identical NaNs.
    fn eq(&self, other: &Tensor) -> bool {
        self.dt == other.dt && self.shape == other.shape && self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = self.dump(12).unwrap_or_else(|e| format!("Error : {e:?}"));
        write!(f, "{content}")
    }
}

impl<T: Datum, D: Dimension> From<Array<T, D>> for Tensor {
    fn from(it: Array<T, D>) -> Tensor {
        let shape = it.shape().to_vec();
        let data = it.iter().copied().collect::<Vec<T>>();
        Tensor::from_shape(&shape, &data).expect("array shape and length agree")
    }
}

impl<T: Datum> From<Vec<T>> for Tensor {
    fn from(it: Vec<T>) -> Tensor {
        Tensor::from_shape(&[it.len()], &it).expect("vector length is its shape")
    }
}

pub trait IntoArcTensor {
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl IntoArcTensor for Tensor {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}

impl<T: Datum, D: Dimension> IntoArcTensor for Array<T, D> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::f16;

    #[test]
    fn zero_is_zero_for_all_types() {
        for dt in DatumType::ALL {
            let t = Tensor::zero_dt(dt, &[2, 3]).unwrap();
            assert_eq!(t.len(), 6);
            assert_eq!(t.byte_len(), 6 * dt.size_of());
            assert!(t.as_bytes().iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn oversized_shapes_are_errors() {
        let err = Tensor::zero_dt(DatumType::F32, &[usize::MAX, 2]).unwrap_err();
        assert!(err.to_string().contains("too big"));
        assert!(Tensor::zero_dt(DatumType::F64, &[usize::MAX / 4]).is_err());
        assert_eq!(Tensor::zero_dt(DatumType::F32, &[usize::MAX, 0]).unwrap().len(), 0);
    }

    #[test]
    fn typed_access_is_checked() {
        let t = Tensor::from_shape(&[2], &[1f32, 2.0]).unwrap();
        assert_eq!(t.as_slice::<f32>().unwrap(), &[1.0, 2.0]);
        assert!(t.as_slice::<i32>().is_err());
    }

    #[test]
    fn from_shape_checks_length() {
        assert!(Tensor::from_shape(&[2, 2], &[1i32, 2, 3]).is_err());
    }

    #[test]
    fn bytes_round_trip_preserves_f16() {
        let t = Tensor::from_shape(&[3], &[f16::from_f32(1.5), f16::ONE, f16::ZERO]).unwrap();
        let back = Tensor::from_bytes(DatumType::F16, &[3], t.as_bytes()).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn invalid_bool_bytes_are_rejected() {
        assert!(Tensor::from_bytes(DatumType::Bool, &[2], &[0, 2]).is_err());
        let t = Tensor::from_bytes(DatumType::Bool, &[2], &[0, 1]).unwrap();
        assert_eq!(t.as_slice::<bool>().unwrap(), &[false, true]);
    }

    #[test]
    fn from_array() {
        let t: Tensor = ndarray::arr2(&[[1i64, 2], [3, 4]]).into();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.as_slice::<i64>().unwrap(), &[1, 2, 3, 4]);
        assert_eq!(t.to_array_view::<i64>().unwrap()[[1, 0]], 3);
    }

    #[test]
    fn bitwise_equality_on_nans() {
        let a = Tensor::from_shape(&[1], &[f32::NAN]).unwrap();
        let b = Tensor::from_shape(&[1], &[f32::NAN]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reshape() {
        let t: Tensor = vec![1u8, 2, 3, 4, 5, 6].into();
        assert_eq!(t.shape(), &[6]);
        let t = t.into_shape(&[2, 3]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert!(t.into_shape(&[4]).is_err());
    }

    #[test]
    fn scalar() {
        let t = Tensor::from(3.5f64);
        assert_eq!(t.rank(), 0);
        assert_eq!(t.to_scalar::<f64>().unwrap(), 3.5);
    }
}
