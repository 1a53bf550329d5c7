// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Array descriptors (shape + dtype, no buffer) and execution platforms

use crate::dtype::DType;
use crate::error::{OpsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape and element type of an array, without data.
///
/// Immutable value type used for abstract evaluation, trampoline
/// specialization and output allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayDesc {
    shape: Vec<usize>,
    dtype: DType,
}

impl ArrayDesc {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    /// Zero-dimensional descriptor
    pub fn scalar(dtype: DType) -> Self {
        Self::new(Vec::new(), dtype)
    }

    /// One-dimensional descriptor of length `len`
    pub fn vector(len: usize, dtype: DType) -> Self {
        Self::new(vec![len], dtype)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of elements, failing on `usize` overflow
    pub fn num_elements(&self) -> Result<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                OpsError::InvalidArray(format!("element count of shape {:?} overflows", self.shape))
            })
    }

    /// Number of bytes of a dense row-major buffer with this descriptor
    pub fn num_bytes(&self) -> Result<usize> {
        self.num_elements()?
            .checked_mul(self.dtype.size_of())
            .ok_or_else(|| {
                OpsError::InvalidArray(format!("byte size of shape {:?} overflows", self.shape))
            })
    }

    /// Row-major element strides for this shape
    pub fn row_major_strides(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.shape.len()];
        let mut acc = 1isize;
        for (stride, &dim) in strides.iter_mut().zip(self.shape.iter()).rev() {
            *stride = acc;
            acc = acc.saturating_mul(dim.max(1) as isize);
        }
        strides
    }

    /// Row-major layout expressed as minor-to-major dimension order
    pub fn row_major_layout(&self) -> Vec<usize> {
        (0..self.shape.len()).rev().collect()
    }

    /// Same shape with a different element type
    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self::new(self.shape.clone(), dtype)
    }

    /// Compact key such as `f32[2,3]`, used to build target names
    pub fn signature_key(&self) -> String {
        let dims = self
            .shape
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{}]", self.dtype, dims)
    }
}

impl fmt::Display for ArrayDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature_key())
    }
}

/// Execution platform owning a custom-call target namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Cpu,
    Gpu,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Cpu, Platform::Gpu];

    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Cpu => "cpu",
            Platform::Gpu => "gpu",
        }
    }

    /// Numeric code passed to extension symbol tables
    pub const fn code(self) -> u32 {
        match self {
            Platform::Cpu => 0,
            Platform::Gpu => 1,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Cpu
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Platform::Cpu),
            "gpu" | "cuda" => Ok(Platform::Gpu),
            _ => Err(OpsError::UnsupportedPlatform(s.to_string())),
        }
    }
}
