// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Foreign-Call ABI
//!
//! Every custom-call target, whether produced by the trampoline compiler or
//! exported by a native extension, has the same C signature:
//!
//! ```text
//! int32 target(const void* context,
//!              const RawArray* outputs, size_t num_outputs,
//!              const RawArray* inputs,  size_t num_inputs);
//! ```
//!
//! `RawArray` carries pointer, dtype code, shape and element strides. Raw
//! pointers never leave this module as addresses: the only way to read a
//! `RawArray` is through [`RawArray::view`] / [`RawArray::host_view`], which
//! validate the descriptor first and hand back bounds-checked `ndarray` views.

use crate::array::{HostArray, HostView, HostViewMut};
use crate::desc::ArrayDesc;
use crate::dtype::{DType, Element};
use crate::error::{OpsError, Result};
use ndarray::{ArrayViewD, ArrayViewMutD, IxDyn};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Marker string every target handle must carry to be accepted by the registrar
pub const CUSTOM_CALL_TARGET_TAG: &str = "feagi_ops._CUSTOM_CALL_TARGET";

/// Signature of every custom-call target
pub type TargetFn = unsafe extern "C" fn(
    context: *const c_void,
    outputs: *const RawArray,
    num_outputs: usize,
    inputs: *const RawArray,
    num_inputs: usize,
) -> i32;

/// Status codes returned across the ABI
pub mod status {
    pub const OK: i32 = 0;
    pub const ARITY_MISMATCH: i32 = 1;
    pub const SIGNATURE_MISMATCH: i32 = 2;
    pub const KERNEL_ERROR: i32 = 3;
    pub const PANIC: i32 = 4;
    pub const UNSUPPORTED_DTYPE: i32 = 5;
    pub const INVALID_ARGUMENT: i32 = 6;

    /// Human-readable description of a status code
    pub fn describe(code: i32) -> &'static str {
        match code {
            OK => "ok",
            ARITY_MISMATCH => "argument count does not match the target signature",
            SIGNATURE_MISMATCH => "argument shape or dtype does not match the target signature",
            KERNEL_ERROR => "kernel reported an error",
            PANIC => "kernel panicked",
            UNSUPPORTED_DTYPE => "target does not support the argument dtype",
            INVALID_ARGUMENT => "argument values are out of range for the target",
            _ => "unknown status",
        }
    }
}

/// Convert a target status code into a `Result`
pub fn check_status(code: i32, target: &str) -> Result<()> {
    if code == status::OK {
        Ok(())
    } else {
        Err(OpsError::Execution(format!(
            "target \"{}\" failed with status {} ({})",
            target,
            code,
            status::describe(code)
        )))
    }
}

/// One entry of an extension's exported target table
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ExportedTarget {
    /// UTF-8 target name (not NUL-terminated)
    pub name: *const u8,
    pub name_len: usize,
    pub entry: TargetFn,
}

// SAFETY: entries point at `'static` names and functions inside the library.
unsafe impl Send for ExportedTarget {}
unsafe impl Sync for ExportedTarget {}

impl ExportedTarget {
    /// Entry for a static name
    pub const fn new(name: &'static str, entry: TargetFn) -> Self {
        Self {
            name: name.as_ptr(),
            name_len: name.len(),
            entry,
        }
    }

    /// Target name.
    ///
    /// # Safety
    /// `name` must point to `name_len` bytes that stay valid for `'a`.
    pub unsafe fn name<'a>(&self) -> Result<&'a str> {
        if self.name.is_null() {
            return Err(OpsError::InvalidArray("exported target has a null name".to_string()));
        }
        let bytes = std::slice::from_raw_parts(self.name, self.name_len);
        std::str::from_utf8(bytes)
            .map_err(|e| OpsError::InvalidArray(format!("exported target name is not UTF-8: {}", e)))
    }
}

/// `<extension>_version`: NUL-terminated version string with static lifetime
pub type VersionFn = unsafe extern "C" fn() -> *const std::os::raw::c_char;

/// `<extension>_registrations`: target table for a platform code, length in `out_count`
pub type RegistrationsFn =
    unsafe extern "C" fn(platform: u32, out_count: *mut usize) -> *const ExportedTarget;

/// Name of the version symbol an extension library exports
pub fn version_symbol(extension: &str) -> String {
    format!("{}_version", extension)
}

/// Name of the registration-table symbol an extension library exports
pub fn registrations_symbol(extension: &str) -> String {
    format!("{}_registrations", extension)
}

/// Array descriptor passed across the foreign-call boundary
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawArray {
    pub data: *mut c_void,
    pub dtype: u32,
    pub ndim: usize,
    pub shape: *const usize,
    /// Element (not byte) strides
    pub strides: *const isize,
}

impl RawArray {
    /// Shape slice.
    ///
    /// # Safety
    /// `shape` must point to `ndim` readable `usize` values (or `ndim == 0`).
    pub unsafe fn shape(&self) -> &[usize] {
        if self.ndim == 0 || self.shape.is_null() {
            &[]
        } else {
            std::slice::from_raw_parts(self.shape, self.ndim)
        }
    }

    /// Stride slice.
    ///
    /// # Safety
    /// `strides` must point to `ndim` readable `isize` values (or `ndim == 0`).
    pub unsafe fn strides(&self) -> &[isize] {
        if self.ndim == 0 || self.strides.is_null() {
            &[]
        } else {
            std::slice::from_raw_parts(self.strides, self.ndim)
        }
    }

    /// Descriptor (shape + dtype) after validating the dtype code.
    ///
    /// # Safety
    /// Same requirements as [`RawArray::shape`].
    pub unsafe fn describe(&self) -> Result<ArrayDesc> {
        if self.ndim > 0 && self.shape.is_null() {
            return Err(OpsError::InvalidArray(format!(
                "null shape pointer for {}-d array",
                self.ndim
            )));
        }
        let dtype = DType::from_code(self.dtype)
            .ok_or_else(|| OpsError::InvalidArray(format!("unknown dtype code {}", self.dtype)))?;
        Ok(ArrayDesc::new(self.shape().to_vec(), dtype))
    }

    /// Validate pointer, dtype and row-major contiguity for element type `T`
    unsafe fn validated_ptr<T: Element>(&self) -> Result<(ArrayDesc, NonNull<T>)> {
        let desc = self.describe()?;
        if desc.dtype() != T::DTYPE {
            return Err(OpsError::DTypeMismatch {
                expected: T::DTYPE,
                actual: desc.dtype(),
            });
        }
        let len = desc.num_elements()?;
        desc.num_bytes()?;

        if self.ndim > 0 && !self.strides.is_null() {
            let expected = desc.row_major_strides();
            let actual = self.strides();
            for (axis, (&dim, (&want, &got))) in desc
                .shape()
                .iter()
                .zip(expected.iter().zip(actual.iter()))
                .enumerate()
            {
                if dim > 1 && want != got {
                    return Err(OpsError::InvalidArray(format!(
                        "axis {} has stride {} but row-major layout requires {}",
                        axis, got, want
                    )));
                }
            }
        }

        let ptr = match NonNull::new(self.data as *mut T) {
            Some(ptr) => ptr,
            None if len == 0 => NonNull::dangling(),
            None => {
                return Err(OpsError::InvalidArray(format!(
                    "null data pointer for {} with {} elements",
                    desc, len
                )))
            }
        };
        if (ptr.as_ptr() as usize) % std::mem::align_of::<T>() != 0 {
            return Err(OpsError::InvalidArray(format!(
                "data pointer for {} is not aligned to {} bytes",
                desc,
                std::mem::align_of::<T>()
            )));
        }
        Ok((desc, ptr))
    }

    /// Typed read-only view.
    ///
    /// # Safety
    /// `data` must point to a live buffer holding the described elements for
    /// the whole of `'a`, and must not be mutated while the view exists.
    pub unsafe fn view<'a, T: Element>(&self) -> Result<ArrayViewD<'a, T>> {
        let (desc, ptr) = self.validated_ptr::<T>()?;
        Ok(ArrayViewD::from_shape_ptr(IxDyn(desc.shape()), ptr.as_ptr() as *const T))
    }

    /// Typed mutable view.
    ///
    /// # Safety
    /// As for [`RawArray::view`], and no other view of the buffer may exist
    /// for `'a`.
    pub unsafe fn view_mut<'a, T: Element>(&self) -> Result<ArrayViewMutD<'a, T>> {
        let (desc, ptr) = self.validated_ptr::<T>()?;
        Ok(ArrayViewMutD::from_shape_ptr(IxDyn(desc.shape()), ptr.as_ptr()))
    }

    /// Dynamically-typed read-only view.
    ///
    /// # Safety
    /// See [`RawArray::view`].
    pub unsafe fn host_view<'a>(&self) -> Result<HostView<'a>> {
        let dtype = self.describe()?.dtype();
        Ok(match dtype {
            DType::Bool => HostView::Bool(self.view::<bool>()?),
            DType::I32 => HostView::I32(self.view::<i32>()?),
            DType::I64 => HostView::I64(self.view::<i64>()?),
            DType::U32 => HostView::U32(self.view::<u32>()?),
            DType::F32 => HostView::F32(self.view::<f32>()?),
            DType::F64 => HostView::F64(self.view::<f64>()?),
        })
    }

    /// Dynamically-typed mutable view.
    ///
    /// # Safety
    /// See [`RawArray::view_mut`].
    pub unsafe fn host_view_mut<'a>(&self) -> Result<HostViewMut<'a>> {
        let dtype = self.describe()?.dtype();
        Ok(match dtype {
            DType::Bool => HostViewMut::Bool(self.view_mut::<bool>()?),
            DType::I32 => HostViewMut::I32(self.view_mut::<i32>()?),
            DType::I64 => HostViewMut::I64(self.view_mut::<i64>()?),
            DType::U32 => HostViewMut::U32(self.view_mut::<u32>()?),
            DType::F32 => HostViewMut::F32(self.view_mut::<f32>()?),
            DType::F64 => HostViewMut::F64(self.view_mut::<f64>()?),
        })
    }
}

/// Borrowed slice of `RawArray`s.
///
/// # Safety
/// `ptr` must point to `len` readable descriptors (or `len == 0`).
pub unsafe fn raw_slice<'a>(ptr: *const RawArray, len: usize) -> &'a [RawArray] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

/// Owned marshaling of host arrays into `RawArray` descriptors.
///
/// Keeps the shape/stride storage alive and borrows the arrays for `'a`, so
/// the descriptors stay valid for as long as this value exists.
pub struct RawArgs<'a> {
    raws: Vec<RawArray>,
    _shapes: Vec<Vec<usize>>,
    _strides: Vec<Vec<isize>>,
    _borrow: PhantomData<&'a mut HostArray>,
}

impl<'a> RawArgs<'a> {
    fn build(entries: Vec<(*mut c_void, ArrayDesc)>) -> Self {
        let shapes: Vec<Vec<usize>> = entries.iter().map(|(_, d)| d.shape().to_vec()).collect();
        let strides: Vec<Vec<isize>> = entries.iter().map(|(_, d)| d.row_major_strides()).collect();
        let raws = entries
            .iter()
            .zip(shapes.iter().zip(strides.iter()))
            .map(|((data, desc), (shape, stride))| RawArray {
                data: *data,
                dtype: desc.dtype().code(),
                ndim: shape.len(),
                shape: shape.as_ptr(),
                strides: stride.as_ptr(),
            })
            .collect();
        Self {
            raws,
            _shapes: shapes,
            _strides: strides,
            _borrow: PhantomData,
        }
    }

    fn require_contiguous(array: &HostArray) -> Result<()> {
        if array.is_standard_layout() {
            Ok(())
        } else {
            Err(OpsError::InvalidArray(format!(
                "{} is not row-major contiguous",
                array.desc()
            )))
        }
    }

    /// Descriptors for read-only inputs
    pub fn inputs<I>(arrays: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a HostArray>,
    {
        let mut entries = Vec::new();
        for array in arrays {
            Self::require_contiguous(array)?;
            let data = match array {
                HostArray::Bool(a) => a.as_ptr() as *mut c_void,
                HostArray::I32(a) => a.as_ptr() as *mut c_void,
                HostArray::I64(a) => a.as_ptr() as *mut c_void,
                HostArray::U32(a) => a.as_ptr() as *mut c_void,
                HostArray::F32(a) => a.as_ptr() as *mut c_void,
                HostArray::F64(a) => a.as_ptr() as *mut c_void,
            };
            entries.push((data, array.desc()));
        }
        Ok(Self::build(entries))
    }

    /// Descriptors for outputs the target writes in place
    pub fn outputs(arrays: &'a mut [HostArray]) -> Result<Self> {
        let mut entries = Vec::with_capacity(arrays.len());
        for array in arrays.iter_mut() {
            Self::require_contiguous(array)?;
            let desc = array.desc();
            let data = match array {
                HostArray::Bool(a) => a.as_mut_ptr() as *mut c_void,
                HostArray::I32(a) => a.as_mut_ptr() as *mut c_void,
                HostArray::I64(a) => a.as_mut_ptr() as *mut c_void,
                HostArray::U32(a) => a.as_mut_ptr() as *mut c_void,
                HostArray::F32(a) => a.as_mut_ptr() as *mut c_void,
                HostArray::F64(a) => a.as_mut_ptr() as *mut c_void,
            };
            entries.push((data, desc));
        }
        Ok(Self::build(entries))
    }

    pub fn as_ptr(&self) -> *const RawArray {
        self.raws.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.raws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raws.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshaled_inputs_roundtrip_through_views() {
        let arrays = vec![
            HostArray::from_shape_vec(&[2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap(),
            HostArray::vector(&[7i32, 8, 9]),
        ];
        let args = RawArgs::inputs(&arrays).unwrap();
        assert_eq!(args.len(), 2);

        let raws = unsafe { raw_slice(args.as_ptr(), args.len()) };
        let first = unsafe { raws[0].view::<f32>() }.unwrap();
        assert_eq!(first.shape(), &[2, 2]);
        assert_eq!(first[[1, 0]], 3.0);

        let second = unsafe { raws[1].host_view() }.unwrap();
        assert_eq!(second.dtype(), DType::I32);
        assert_eq!(second.to_host().to_vec::<i32>().unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn test_view_rejects_wrong_dtype() {
        let arrays = vec![HostArray::vector(&[1.0f64])];
        let args = RawArgs::inputs(&arrays).unwrap();
        let raws = unsafe { raw_slice(args.as_ptr(), args.len()) };
        assert!(matches!(
            unsafe { raws[0].view::<f32>() },
            Err(OpsError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_view_rejects_unknown_dtype_code_and_null_data() {
        let shape = [4usize];
        let raw = RawArray {
            data: std::ptr::null_mut(),
            dtype: DType::F32.code(),
            ndim: 1,
            shape: shape.as_ptr(),
            strides: std::ptr::null(),
        };
        assert!(matches!(unsafe { raw.view::<f32>() }, Err(OpsError::InvalidArray(_))));

        let bad = RawArray { dtype: 42, ..raw };
        assert!(matches!(unsafe { bad.describe() }, Err(OpsError::InvalidArray(_))));
    }

    #[test]
    fn test_empty_array_with_null_pointer_is_valid() {
        let shape = [0usize];
        let raw = RawArray {
            data: std::ptr::null_mut(),
            dtype: DType::F64.code(),
            ndim: 1,
            shape: shape.as_ptr(),
            strides: std::ptr::null(),
        };
        let view = unsafe { raw.view::<f64>() }.unwrap();
        assert_eq!(view.len(), 0);
    }

    #[test]
    fn test_view_rejects_non_row_major_strides() {
        let data = [0.0f32; 6];
        let shape = [2usize, 3];
        let strides = [1isize, 2];
        let raw = RawArray {
            data: data.as_ptr() as *mut c_void,
            dtype: DType::F32.code(),
            ndim: 2,
            shape: shape.as_ptr(),
            strides: strides.as_ptr(),
        };
        assert!(matches!(unsafe { raw.view::<f32>() }, Err(OpsError::InvalidArray(_))));
    }

    #[test]
    fn test_outputs_write_through() {
        let mut outputs = vec![HostArray::zeros(&ArrayDesc::vector(3, DType::F32))];
        {
            let args = RawArgs::outputs(&mut outputs).unwrap();
            let raws = unsafe { raw_slice(args.as_ptr(), args.len()) };
            let mut view = unsafe { raws[0].view_mut::<f32>() }.unwrap();
            view.fill(4.0);
        }
        assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![4.0; 3]);
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(status::OK, "t").is_ok());
        let err = check_status(status::PANIC, "t").unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
