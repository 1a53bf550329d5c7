// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end check of the foreign-call ABI: a hand-written `extern "C"`
//! target is invoked through marshaled `RawArgs`, exactly as compiled
//! executables invoke registered targets.

use feagi_ops_core::abi::raw_slice;
use feagi_ops_core::{
    check_status, status, ArrayDesc, DType, HostArray, RawArgs, RawArray, TargetFn,
};
use std::ffi::c_void;

/// out[0] = in[0] * 2 + in[1]
unsafe extern "C" fn axpy_target(
    _ctx: *const c_void,
    outputs: *const RawArray,
    num_outputs: usize,
    inputs: *const RawArray,
    num_inputs: usize,
) -> i32 {
    if num_outputs != 1 || num_inputs != 2 {
        return status::ARITY_MISMATCH;
    }
    let outs = raw_slice(outputs, num_outputs);
    let ins = raw_slice(inputs, num_inputs);
    let (x, y, mut out) = match (
        ins[0].view::<f64>(),
        ins[1].view::<f64>(),
        outs[0].view_mut::<f64>(),
    ) {
        (Ok(x), Ok(y), Ok(out)) => (x, y, out),
        _ => return status::SIGNATURE_MISMATCH,
    };
    if x.shape() != out.shape() || y.shape() != out.shape() {
        return status::SIGNATURE_MISMATCH;
    }
    for ((o, &a), &b) in out.iter_mut().zip(x.iter()).zip(y.iter()) {
        *o = a * 2.0 + b;
    }
    status::OK
}

fn invoke(target: TargetFn, outputs: &mut [HostArray], inputs: &[HostArray]) -> i32 {
    let ins = RawArgs::inputs(inputs).unwrap();
    let outs = RawArgs::outputs(outputs).unwrap();
    unsafe {
        target(
            std::ptr::null(),
            outs.as_ptr(),
            outs.len(),
            ins.as_ptr(),
            ins.len(),
        )
    }
}

#[test]
fn test_target_invocation_through_raw_args() {
    let inputs = vec![
        HostArray::vector(&[1.0f64, 2.0, 3.0]),
        HostArray::vector(&[0.5f64, 0.5, 0.5]),
    ];
    let mut outputs = vec![HostArray::zeros(&ArrayDesc::vector(3, DType::F64))];

    let code = invoke(axpy_target, &mut outputs, &inputs);
    check_status(code, "axpy").unwrap();
    assert_eq!(outputs[0].to_vec::<f64>().unwrap(), vec![2.5, 4.5, 6.5]);
}

#[test]
fn test_target_reports_signature_mismatch() {
    let inputs = vec![
        HostArray::vector(&[1.0f32, 2.0]),
        HostArray::vector(&[1.0f32, 2.0]),
    ];
    let mut outputs = vec![HostArray::zeros(&ArrayDesc::vector(2, DType::F32))];

    let code = invoke(axpy_target, &mut outputs, &inputs);
    assert_eq!(code, status::SIGNATURE_MISMATCH);
    assert!(check_status(code, "axpy").is_err());
}

#[test]
fn test_non_contiguous_inputs_are_rejected() {
    let base = HostArray::from_shape_vec(&[2, 3], (0..6).map(|v| v as f64).collect()).unwrap();
    let transposed = match base {
        HostArray::F64(a) => HostArray::F64(a.reversed_axes()),
        _ => unreachable!(),
    };
    assert!(!transposed.is_standard_layout());
    assert!(RawArgs::inputs(std::slice::from_ref(&transposed)).is_err());

    let contiguous = transposed.to_contiguous();
    assert!(RawArgs::inputs(std::slice::from_ref(&contiguous)).is_ok());
}
