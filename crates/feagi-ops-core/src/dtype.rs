// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Element Types
//!
//! `DType` is the primitive element type carried by every array descriptor.
//! `Element` ties a Rust scalar type to its `DType` and to the matching
//! variants of the host array and view enums, so generic code can move
//! between the dynamically-typed and statically-typed worlds without
//! matching on every variant by hand.

use crate::array::{HostArray, HostView, HostViewMut};
use crate::error::OpsError;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primitive element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    I32,
    I64,
    U32,
    F32,
    F64,
}

impl DType {
    /// All supported element types
    pub const ALL: [DType; 6] = [
        DType::Bool,
        DType::I32,
        DType::I64,
        DType::U32,
        DType::F32,
        DType::F64,
    ];

    /// Stable numeric code used across the foreign-call ABI
    pub const fn code(self) -> u32 {
        match self {
            DType::Bool => 1,
            DType::I32 => 2,
            DType::I64 => 3,
            DType::U32 => 4,
            DType::F32 => 5,
            DType::F64 => 6,
        }
    }

    /// Inverse of [`DType::code`]
    pub const fn from_code(code: u32) -> Option<DType> {
        match code {
            1 => Some(DType::Bool),
            2 => Some(DType::I32),
            3 => Some(DType::I64),
            4 => Some(DType::U32),
            5 => Some(DType::F32),
            6 => Some(DType::F64),
            _ => None,
        }
    }

    /// Size of one element in bytes
    pub const fn size_of(self) -> usize {
        match self {
            DType::Bool => 1,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U32 => "u32",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, DType::I32 | DType::I64 | DType::U32)
    }

    pub const fn is_bool(self) -> bool {
        matches!(self, DType::Bool)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" => Ok(DType::Bool),
            "i32" | "int32" => Ok(DType::I32),
            "i64" | "int64" => Ok(DType::I64),
            "u32" | "uint32" => Ok(DType::U32),
            "f32" | "float32" => Ok(DType::F32),
            "f64" | "float64" => Ok(DType::F64),
            _ => Err(OpsError::Configuration(format!("unknown dtype \"{}\"", s))),
        }
    }
}

/// Rust scalar type that can live in a [`HostArray`]
pub trait Element: Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn into_host(array: ArrayD<Self>) -> HostArray;
    fn from_host(array: &HostArray) -> Option<&ArrayD<Self>>;
    fn from_host_mut(array: &mut HostArray) -> Option<&mut ArrayD<Self>>;
    fn into_view(view: ArrayViewD<'_, Self>) -> HostView<'_>;
    fn into_view_mut(view: ArrayViewMutD<'_, Self>) -> HostViewMut<'_>;
    fn from_view<'a, 'b>(view: &'b HostView<'a>) -> Option<&'b ArrayViewD<'a, Self>>;
    fn from_view_mut<'a, 'b>(view: &'b mut HostViewMut<'a>)
        -> Option<&'b mut ArrayViewMutD<'a, Self>>;

    /// Lossy widening used by dtype promotion (i64 beyond 2^53 loses precision)
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $to:expr, $from:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn into_host(array: ArrayD<Self>) -> HostArray {
                HostArray::$variant(array)
            }

            fn from_host(array: &HostArray) -> Option<&ArrayD<Self>> {
                match array {
                    HostArray::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn from_host_mut(array: &mut HostArray) -> Option<&mut ArrayD<Self>> {
                match array {
                    HostArray::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn into_view(view: ArrayViewD<'_, Self>) -> HostView<'_> {
                HostView::$variant(view)
            }

            fn into_view_mut(view: ArrayViewMutD<'_, Self>) -> HostViewMut<'_> {
                HostViewMut::$variant(view)
            }

            fn from_view<'a, 'b>(view: &'b HostView<'a>) -> Option<&'b ArrayViewD<'a, Self>> {
                match view {
                    HostView::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_view_mut<'a, 'b>(
                view: &'b mut HostViewMut<'a>,
            ) -> Option<&'b mut ArrayViewMutD<'a, Self>> {
                match view {
                    HostViewMut::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_f64(self) -> f64 {
                let to: fn($ty) -> f64 = $to;
                to(self)
            }

            fn from_f64(value: f64) -> Self {
                let from: fn(f64) -> $ty = $from;
                from(value)
            }
        }
    };
}

impl_element!(bool, Bool, |v| if v { 1.0 } else { 0.0 }, |v| v != 0.0);
impl_element!(i32, I32, |v| v as f64, |v| v as i32);
impl_element!(i64, I64, |v| v as f64, |v| v as i64);
impl_element!(u32, U32, |v| v as f64, |v| v as u32);
impl_element!(f32, F32, |v| v as f64, |v| v as f32);
impl_element!(f64, F64, |v| v, |v| v);
