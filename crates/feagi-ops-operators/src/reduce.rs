// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reduction kinds and the segment fold shared by every scatter operator

use feagi_ops_core::{Element, OpsError};
use std::fmt;
use std::str::FromStr;

/// How values that land in the same group are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduce {
    Sum,
    Prod,
    Min,
    Max,
    Mean,
}

impl Reduce {
    pub const fn as_str(self) -> &'static str {
        match self {
            Reduce::Sum => "sum",
            Reduce::Prod => "prod",
            Reduce::Min => "min",
            Reduce::Max => "max",
            Reduce::Mean => "mean",
        }
    }

    /// Value an untouched group keeps
    #[inline]
    pub fn identity<T: Scalar>(self) -> T {
        match self {
            Reduce::Sum | Reduce::Mean => T::ZERO,
            Reduce::Prod => T::ONE,
            Reduce::Min => T::HIGHEST,
            Reduce::Max => T::LOWEST,
        }
    }

    #[inline]
    pub fn combine<T: Scalar>(self, acc: T, value: T) -> T {
        match self {
            Reduce::Sum | Reduce::Mean => acc.accumulate(value),
            Reduce::Prod => acc.scale(value),
            Reduce::Min => {
                if value < acc {
                    value
                } else {
                    acc
                }
            }
            Reduce::Max => {
                if value > acc {
                    value
                } else {
                    acc
                }
            }
        }
    }
}

impl fmt::Display for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduce {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" | "add" => Ok(Reduce::Sum),
            "prod" | "mul" | "multiply" => Ok(Reduce::Prod),
            "min" => Ok(Reduce::Min),
            "max" => Ok(Reduce::Max),
            "mean" => Ok(Reduce::Mean),
            other => Err(OpsError::Configuration(format!("unknown reduction \"{}\"", other))),
        }
    }
}

/// Numeric element a scatter can fold.
///
/// Integer sums and products wrap on overflow in every build profile.
pub trait Scalar: Element + Copy + PartialOrd + Send + Sync {
    const ZERO: Self;
    const ONE: Self;
    /// Identity for `max` (−∞ for floats)
    const LOWEST: Self;
    /// Identity for `min` (+∞ for floats)
    const HIGHEST: Self;

    fn accumulate(self, other: Self) -> Self;
    fn scale(self, other: Self) -> Self;
}

macro_rules! impl_scalar_int {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const LOWEST: Self = <$ty>::MIN;
                const HIGHEST: Self = <$ty>::MAX;

                #[inline]
                fn accumulate(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }

                #[inline]
                fn scale(self, other: Self) -> Self {
                    self.wrapping_mul(other)
                }
            }
        )*
    };
}

macro_rules! impl_scalar_float {
    ($($ty:ty),*) => {
        $(
            impl Scalar for $ty {
                const ZERO: Self = 0.0;
                const ONE: Self = 1.0;
                const LOWEST: Self = <$ty>::NEG_INFINITY;
                const HIGHEST: Self = <$ty>::INFINITY;

                #[inline]
                fn accumulate(self, other: Self) -> Self {
                    self + other
                }

                #[inline]
                fn scale(self, other: Self) -> Self {
                    self * other
                }
            }
        )*
    };
}

impl_scalar_int!(i32, i64, u32);
impl_scalar_float!(f32, f64);

/// Fold `values[i]` into `out[ids[i]]`; `None` ids and ids past the end are skipped.
///
/// `out` must already hold the reduction identity (or whatever the caller
/// wants to combine into). With `sorted`, runs of equal ids are folded
/// locally and written once; the result is the same either way.
pub fn segment_fold<T: Scalar>(reduce: Reduce, out: &mut [T], values: &[T], ids: &[Option<usize>], sorted: bool) {
    if !sorted {
        for (&value, &id) in values.iter().zip(ids) {
            if let Some(slot) = id.and_then(|g| out.get_mut(g)) {
                *slot = reduce.combine(*slot, value);
            }
        }
        return;
    }

    let mut i = 0;
    let n = values.len().min(ids.len());
    while i < n {
        let id = ids[i];
        let mut acc = values[i];
        let mut j = i + 1;
        while j < n && ids[j] == id {
            acc = reduce.combine(acc, values[j]);
            j += 1;
        }
        if let Some(slot) = id.and_then(|g| out.get_mut(g)) {
            *slot = reduce.combine(*slot, acc);
        }
        i = j;
    }
}
