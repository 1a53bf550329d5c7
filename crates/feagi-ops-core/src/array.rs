// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Host Arrays
//!
//! Concrete, dynamically-typed n-dimensional buffers (`HostArray`) and the
//! borrowed views kernels receive (`HostView`, `HostViewMut`). Every variant
//! wraps an `ndarray` array of the matching element type.

use crate::desc::ArrayDesc;
use crate::dtype::{DType, Element};
use crate::error::{OpsError, Result};
use ndarray::{Array1, ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};

/// Owned n-dimensional array of any supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    Bool(ArrayD<bool>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U32(ArrayD<u32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Immutable borrowed view handed to kernels as an input
#[derive(Debug, Clone)]
pub enum HostView<'a> {
    Bool(ArrayViewD<'a, bool>),
    I32(ArrayViewD<'a, i32>),
    I64(ArrayViewD<'a, i64>),
    U32(ArrayViewD<'a, u32>),
    F32(ArrayViewD<'a, f32>),
    F64(ArrayViewD<'a, f64>),
}

/// Mutable borrowed view handed to kernels as an output
#[derive(Debug)]
pub enum HostViewMut<'a> {
    Bool(ArrayViewMutD<'a, bool>),
    I32(ArrayViewMutD<'a, i32>),
    I64(ArrayViewMutD<'a, i64>),
    U32(ArrayViewMutD<'a, u32>),
    F32(ArrayViewMutD<'a, f32>),
    F64(ArrayViewMutD<'a, f64>),
}

/// Apply the same expression to whichever variant is present
macro_rules! each_variant {
    ($enum:ident, $value:expr, $a:ident => $body:expr) => {
        match $value {
            $enum::Bool($a) => $body,
            $enum::I32($a) => $body,
            $enum::I64($a) => $body,
            $enum::U32($a) => $body,
            $enum::F32($a) => $body,
            $enum::F64($a) => $body,
        }
    };
}

fn zeros_of<T: Element>(shape: &[usize]) -> HostArray {
    T::into_host(ArrayD::from_elem(IxDyn(shape), T::default()))
}

fn convert<S: Element, T: Element>(array: &ArrayD<S>) -> HostArray {
    T::into_host(array.mapv(|v| T::from_f64(v.to_f64())))
}

impl HostArray {
    /// Zero-initialized array matching a descriptor
    pub fn zeros(desc: &ArrayDesc) -> Self {
        let shape = desc.shape();
        match desc.dtype() {
            DType::Bool => zeros_of::<bool>(shape),
            DType::I32 => zeros_of::<i32>(shape),
            DType::I64 => zeros_of::<i64>(shape),
            DType::U32 => zeros_of::<u32>(shape),
            DType::F32 => zeros_of::<f32>(shape),
            DType::F64 => zeros_of::<f64>(shape),
        }
    }

    /// Array filled with `value`
    pub fn full<T: Element>(shape: &[usize], value: T) -> Self {
        T::into_host(ArrayD::from_elem(IxDyn(shape), value))
    }

    /// Zero-dimensional array holding a single value
    pub fn scalar<T: Element>(value: T) -> Self {
        Self::full(&[], value)
    }

    /// One-dimensional array copied from a slice
    pub fn vector<T: Element>(values: &[T]) -> Self {
        T::into_host(Array1::from(values.to_vec()).into_dyn())
    }

    /// Array with an explicit shape, taking ownership of row-major data
    pub fn from_shape_vec<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let len = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(T::into_host)
            .map_err(|_| {
                OpsError::InvalidArray(format!(
                    "{} elements cannot be arranged into shape {:?}",
                    len, shape
                ))
            })
    }

    pub fn from_array<T: Element>(array: ArrayD<T>) -> Self {
        T::into_host(array)
    }

    pub fn dtype(&self) -> DType {
        match self {
            HostArray::Bool(_) => DType::Bool,
            HostArray::I32(_) => DType::I32,
            HostArray::I64(_) => DType::I64,
            HostArray::U32(_) => DType::U32,
            HostArray::F32(_) => DType::F32,
            HostArray::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(HostArray, self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        each_variant!(HostArray, self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.ndim() == 0
    }

    /// Descriptor of this array (shape + dtype)
    pub fn desc(&self) -> ArrayDesc {
        ArrayDesc::new(self.shape().to_vec(), self.dtype())
    }

    pub fn is_standard_layout(&self) -> bool {
        each_variant!(HostArray, self, a => a.is_standard_layout())
    }

    /// Row-major contiguous copy (or clone when already contiguous)
    pub fn to_contiguous(&self) -> HostArray {
        each_variant!(HostArray, self, a => Element::into_host(a.as_standard_layout().into_owned()))
    }

    pub fn view(&self) -> HostView<'_> {
        each_variant!(HostArray, self, a => Element::into_view(a.view()))
    }

    pub fn view_mut(&mut self) -> HostViewMut<'_> {
        each_variant!(HostArray, self, a => Element::into_view_mut(a.view_mut()))
    }

    /// Typed access, failing with `DTypeMismatch`
    pub fn as_array<T: Element>(&self) -> Result<&ArrayD<T>> {
        let actual = self.dtype();
        T::from_host(self).ok_or(OpsError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }

    pub fn as_array_mut<T: Element>(&mut self) -> Result<&mut ArrayD<T>> {
        let actual = self.dtype();
        T::from_host_mut(self).ok_or(OpsError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }

    /// Row-major copy of the elements
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_array::<T>()?.iter().copied().collect())
    }

    /// Single value of a zero-dimensional (or one-element) array
    pub fn scalar_value<T: Element>(&self) -> Result<T> {
        let array = self.as_array::<T>()?;
        if array.len() != 1 {
            return Err(OpsError::ShapeMismatch {
                expected: vec![],
                actual: array.shape().to_vec(),
            });
        }
        array
            .iter()
            .next()
            .copied()
            .ok_or_else(|| OpsError::InvalidArray("empty scalar".to_string()))
    }

    /// Element-wise conversion to another dtype.
    ///
    /// `bool` converts to 0/1, numeric to `bool` as `!= 0`; conversions pass
    /// through `f64` so `i64` values beyond 2^53 lose precision.
    pub fn astype(&self, dtype: DType) -> HostArray {
        if dtype == self.dtype() {
            return self.clone();
        }
        each_variant!(HostArray, self, a => match dtype {
            DType::Bool => convert::<_, bool>(a),
            DType::I32 => convert::<_, i32>(a),
            DType::I64 => convert::<_, i64>(a),
            DType::U32 => convert::<_, u32>(a),
            DType::F32 => convert::<_, f32>(a),
            DType::F64 => convert::<_, f64>(a),
        })
    }

    /// Index array as `usize` positions.
    ///
    /// Negative entries map to `None` so callers can apply their own
    /// out-of-range policy.
    pub fn to_indices(&self) -> Result<Vec<Option<usize>>> {
        match self {
            HostArray::I32(a) => Ok(a.iter().map(|&v| usize::try_from(v).ok()).collect()),
            HostArray::I64(a) => Ok(a.iter().map(|&v| usize::try_from(v).ok()).collect()),
            HostArray::U32(a) => Ok(a.iter().map(|&v| Some(v as usize)).collect()),
            other => Err(OpsError::Configuration(format!(
                "index arrays must be integer typed, got {}",
                other.dtype()
            ))),
        }
    }
}

impl<'a> HostView<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            HostView::Bool(_) => DType::Bool,
            HostView::I32(_) => DType::I32,
            HostView::I64(_) => DType::I64,
            HostView::U32(_) => DType::U32,
            HostView::F32(_) => DType::F32,
            HostView::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(HostView, self, v => v.shape())
    }

    pub fn desc(&self) -> ArrayDesc {
        ArrayDesc::new(self.shape().to_vec(), self.dtype())
    }

    pub fn as_array<T: Element>(&self) -> Result<&ArrayViewD<'a, T>> {
        let actual = self.dtype();
        T::from_view(self).ok_or(OpsError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }

    /// Owned copy of the viewed data
    pub fn to_host(&self) -> HostArray {
        each_variant!(HostView, self, v => Element::into_host(v.to_owned()))
    }
}

impl<'a> HostViewMut<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            HostViewMut::Bool(_) => DType::Bool,
            HostViewMut::I32(_) => DType::I32,
            HostViewMut::I64(_) => DType::I64,
            HostViewMut::U32(_) => DType::U32,
            HostViewMut::F32(_) => DType::F32,
            HostViewMut::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(HostViewMut, self, v => v.shape())
    }

    pub fn desc(&self) -> ArrayDesc {
        ArrayDesc::new(self.shape().to_vec(), self.dtype())
    }

    pub fn as_array_mut<T: Element>(&mut self) -> Result<&mut ArrayViewMutD<'a, T>> {
        let actual = self.dtype();
        T::from_view_mut(self).ok_or(OpsError::DTypeMismatch {
            expected: T::DTYPE,
            actual,
        })
    }
}

impl From<ArrayD<f32>> for HostArray {
    fn from(array: ArrayD<f32>) -> Self {
        HostArray::F32(array)
    }
}

impl From<ArrayD<f64>> for HostArray {
    fn from(array: ArrayD<f64>) -> Self {
        HostArray::F64(array)
    }
}

impl From<ArrayD<i32>> for HostArray {
    fn from(array: ArrayD<i32>) -> Self {
        HostArray::I32(array)
    }
}

impl From<ArrayD<bool>> for HostArray {
    fn from(array: ArrayD<bool>) -> Self {
        HostArray::Bool(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_matches_descriptor() {
        let desc = ArrayDesc::new(vec![2, 3], DType::I64);
        let array = HostArray::zeros(&desc);
        assert_eq!(array.desc(), desc);
        assert_eq!(array.to_vec::<i64>().unwrap(), vec![0; 6]);
    }

    #[test]
    fn test_typed_access_reports_mismatch() {
        let array = HostArray::vector(&[1.0f32, 2.0]);
        assert!(array.as_array::<f32>().is_ok());
        match array.as_array::<i32>() {
            Err(OpsError::DTypeMismatch { expected, actual }) => {
                assert_eq!(expected, DType::I32);
                assert_eq!(actual, DType::F32);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_astype_bool_promotion() {
        let array = HostArray::vector(&[true, false, true]);
        let promoted = array.astype(DType::I32);
        assert_eq!(promoted.to_vec::<i32>().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_to_indices_marks_negative() {
        let ids = HostArray::vector(&[0i32, -1, 2]);
        assert_eq!(ids.to_indices().unwrap(), vec![Some(0), None, Some(2)]);
        assert!(HostArray::vector(&[0.5f32]).to_indices().is_err());
    }

    #[test]
    fn test_from_shape_vec_rejects_bad_len() {
        assert!(HostArray::from_shape_vec(&[2, 2], vec![1.0f64; 3]).is_err());
        let ok = HostArray::from_shape_vec(&[2, 2], vec![1.0f64; 4]).unwrap();
        assert_eq!(ok.shape(), &[2, 2]);
    }

    #[test]
    fn test_view_mut_writes_through() {
        let mut array = HostArray::zeros(&ArrayDesc::vector(3, DType::F32));
        {
            let mut view = array.view_mut();
            view.as_array_mut::<f32>().unwrap().fill(2.5);
        }
        assert_eq!(array.to_vec::<f32>().unwrap(), vec![2.5; 3]);
    }
}
