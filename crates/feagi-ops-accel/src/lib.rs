// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI Ops Acceleration Library
//!
//! Native kernels that the runtime loads on demand, either as a shared
//! library (`libfeagi_ops_accel.so` and friends) or linked in-process.
//!
//! The library exports two C symbols:
//! - `feagi_ops_accel_version`: NUL-terminated version string
//! - `feagi_ops_accel_registrations`: target table for a platform code
//!
//! Only CPU targets are provided; the GPU table is empty.

pub mod event;

pub use event::{event_prod_f32, event_prod_f64, event_sum_f32, event_sum_f64, Combine};

use feagi_ops_core::{DType, ExportedTarget, Platform};
use std::os::raw::c_char;

/// Library name the loader resolves
pub const EXTENSION_NAME: &str = "feagi_ops_accel";

/// Version reported through `feagi_ops_accel_version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const VERSION_CSTR: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

pub const EVENT_SUM_F32: &str = "feagi_ops_accel.event_sum_f32";
pub const EVENT_SUM_F64: &str = "feagi_ops_accel.event_sum_f64";
pub const EVENT_PROD_F32: &str = "feagi_ops_accel.event_prod_f32";
pub const EVENT_PROD_F64: &str = "feagi_ops_accel.event_prod_f64";

static CPU_TARGETS: [ExportedTarget; 4] = [
    ExportedTarget::new(EVENT_SUM_F32, event_sum_f32),
    ExportedTarget::new(EVENT_SUM_F64, event_sum_f64),
    ExportedTarget::new(EVENT_PROD_F32, event_prod_f32),
    ExportedTarget::new(EVENT_PROD_F64, event_prod_f64),
];

/// Target name of the event kernel for `combine` over `dtype` values
pub fn event_target_name(combine: Combine, dtype: DType) -> Option<&'static str> {
    match (combine, dtype) {
        (Combine::Sum, DType::F32) => Some(EVENT_SUM_F32),
        (Combine::Sum, DType::F64) => Some(EVENT_SUM_F64),
        (Combine::Prod, DType::F32) => Some(EVENT_PROD_F32),
        (Combine::Prod, DType::F64) => Some(EVENT_PROD_F64),
        _ => None,
    }
}

/// Exported version string
#[no_mangle]
pub extern "C" fn feagi_ops_accel_version() -> *const c_char {
    VERSION_CSTR.as_ptr() as *const c_char
}

/// Exported target table for `platform` (see [`Platform::code`]).
///
/// # Safety
/// `out_count` must be null or valid for a write.
#[no_mangle]
pub unsafe extern "C" fn feagi_ops_accel_registrations(platform: u32, out_count: *mut usize) -> *const ExportedTarget {
    let table: &'static [ExportedTarget] = if platform == Platform::Cpu.code() {
        &CPU_TARGETS
    } else {
        &[]
    };
    if !out_count.is_null() {
        *out_count = table.len();
    }
    table.as_ptr()
}
