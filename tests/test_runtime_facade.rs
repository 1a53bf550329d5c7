// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end checks through the umbrella crate

use feagi_ops::prelude::*;
use std::sync::Arc;

#[cfg(feature = "accel")]
#[test]
fn test_accel_exports_every_event_target_the_operators_call() {
    use feagi_ops::accel::{event_target_name as accel_name, Combine};

    for (reduce, combine) in [(Reduce::Sum, Combine::Sum), (Reduce::Prod, Combine::Prod)] {
        for dtype in [DType::F32, DType::F64] {
            let expected = feagi_ops::operators::event_target_name(reduce, dtype).unwrap();
            assert_eq!(accel_name(combine, dtype), Some(expected.as_str()));
        }
    }
}

#[cfg(feature = "accel")]
#[test]
fn test_default_context_links_accel_in_process() {
    let ctx = RuntimeContext::new(OpsConfig::default()).unwrap();
    assert!(matches!(
        ctx.probe_extension(feagi_ops::runtime::ACCEL_EXTENSION, Platform::Cpu),
        Capability::Loaded { .. }
    ));

    let out = event_accumulate(
        &ctx,
        Reduce::Sum,
        HostArray::vector(&[true, true]),
        HostArray::vector(&[1i32, 1]),
        HostArray::vector(&[0i32, 1, 2]),
        2,
        None,
    )
    .unwrap()
    .into_concrete()
    .unwrap();
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0, 2.0]);
}

#[test]
fn test_builtin_linking_can_be_disabled() {
    let mut config = OpsConfig::default();
    config.runtime.link_builtin_extensions = false;
    let ctx = RuntimeContext::new(config).unwrap();
    match ctx.probe_extension(feagi_ops::runtime::ACCEL_EXTENSION, Platform::Cpu) {
        Capability::Unavailable { reason } => assert!(reason.contains("no extension sources")),
        Capability::Loaded { .. } => panic!("accel must not load without sources"),
    }
}

#[test]
fn test_user_kernel_and_builtin_operators_share_a_graph() {
    let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
    let relu = ctx
        .register_operator(
            kernel("relu", |outs, ins| {
                let x = ins[0].as_array::<f32>()?;
                for (o, &v) in outs[0].as_array_mut::<f32>()?.iter_mut().zip(x.iter()) {
                    *o = v.max(0.0);
                }
                Ok(())
            }),
            OutputSpec::same_as_inputs(),
        )
        .unwrap();

    let values = HostArray::vector(&[-1.0f32, 2.0, 3.0, -4.0]);
    let ids = HostArray::vector(&[0i32, 0, 1, 1]);
    let exe = ctx
        .jit(Platform::Cpu, &[values.desc(), ids.desc()], |args| {
            let positive = relu.invoke(&args[..1])?.into_single()?;
            Ok(vec![scatter_reduce(&ctx, Reduce::Sum, positive, args[1].clone(), 2)?])
        })
        .unwrap();
    let out = exe.run(&[values, ids]).unwrap();
    assert_eq!(out[0].to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
    assert!(ctx.operator_ids().contains(&"relu".to_string()));
}

#[test]
fn test_contexts_are_isolated() {
    let a = Arc::new(RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap());
    let b = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
    scatter_mean(&*a, HostArray::vector(&[1.0f64]), HostArray::vector(&[0i32]), 1).unwrap();
    assert!(a.operator("scatter_mean[1]").is_some());
    assert!(b.operator("scatter_mean[1]").is_none());
    a.reset();
    assert!(a.operator_ids().is_empty());
}

#[test]
fn test_debug_flags_enable_runtime_logging() {
    use feagi_ops::observability::{build_filter, init_logging, CrateDebugFlags};

    let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-ops-operators".to_string()]);
    assert!(flags.to_filter_string("info").starts_with("feagi-ops-operators=debug"));
    assert!(build_filter(&flags, "info").is_ok());
    // A second initialization in the same process reports an error instead of panicking.
    let _ = init_logging(&flags, "info");
    assert!(init_logging(&flags, "info").is_err());
}
