// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator registration, eager/compiled agreement and target caching

use feagi_ops_config::OpsConfig;
use feagi_ops_core::{ArrayDesc, DType, HostArray, OpsError, Platform};
use feagi_ops_runtime::{anonymous_kernel, kernel, AbstractOutput, OutputSpec, RuntimeContext};
use ndarray::arr2;
use std::sync::Arc;

fn context() -> RuntimeContext {
    RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap()
}

#[test]
fn test_two_anonymous_kernels_keep_their_own_targets() {
    let ctx = context();
    let plus_one = ctx
        .register_operator(
            anonymous_kernel(|outs, ins| {
                let x = ins[0].as_array::<f32>()?;
                for (o, &v) in outs[0].as_array_mut::<f32>()?.iter_mut().zip(x.iter()) {
                    *o = v + 1.0;
                }
                Ok(())
            }),
            OutputSpec::same_as_inputs(),
        )
        .unwrap();
    let times_ten = ctx
        .register_operator(
            anonymous_kernel(|outs, ins| {
                let x = ins[0].as_array::<f32>()?;
                for (o, &v) in outs[0].as_array_mut::<f32>()?.iter_mut().zip(x.iter()) {
                    *o = v * 10.0;
                }
                Ok(())
            }),
            OutputSpec::same_as_inputs(),
        )
        .unwrap();
    assert_ne!(plus_one.id(), times_ten.id());

    let desc = ArrayDesc::vector(2, DType::F32);
    let input = HostArray::vector(&[1.0f32, 2.0]);
    let exe = ctx
        .jit(Platform::Cpu, &[desc.clone()], |args| {
            let a = plus_one.invoke(args)?.into_single()?;
            let b = times_ten.invoke(args)?.into_single()?;
            Ok(vec![a, b])
        })
        .unwrap();
    let results = exe.run(&[input]).unwrap();
    assert_eq!(results[0].to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
    assert_eq!(results[1].to_vec::<f32>().unwrap(), vec![10.0, 20.0]);

    // Same signature, different operators: two distinct targets.
    assert_eq!(ctx.targets().len(Platform::Cpu), 2);
    let a = &plus_one.target_records(Platform::Cpu)[0];
    let b = &times_ten.target_records(Platform::Cpu)[0];
    assert_ne!(a.target_name, b.target_name);
    assert!(!a.handle.same_target(&b.handle));
}

#[test]
fn test_multi_output_operator_eager_and_compiled() {
    let ctx = context();
    let split = ctx
        .register_operator(
            kernel("row_sums_and_max", |outs, ins| {
                let x = ins[0].as_array::<f64>()?;
                let (sums, maxes) = outs.split_at_mut(1);
                let sums = sums[0].as_array_mut::<f64>()?;
                let maxes = maxes[0].as_array_mut::<f64>()?;
                for ((s, m), row) in sums.iter_mut().zip(maxes.iter_mut()).zip(x.outer_iter()) {
                    *s = row.sum();
                    *m = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                }
                Ok(())
            }),
            OutputSpec::from_fn(|inputs| {
                let rows = inputs[0].shape()[0];
                let out = ArrayDesc::vector(rows, DType::F64);
                Ok(AbstractOutput::Multi(vec![out.clone(), out]))
            }),
        )
        .unwrap();

    let x = HostArray::from_array(arr2(&[[1.0f64, 5.0, 2.0], [-1.0, -3.0, 0.5]]).into_dyn());
    let eager = split.call(std::slice::from_ref(&x)).unwrap().into_vec();
    assert_eq!(eager.len(), 2);

    let exe = ctx
        .jit(Platform::Cpu, &[x.desc()], |args| Ok(split.invoke(args)?.into_vec()))
        .unwrap();
    let compiled = exe.run(&[x]).unwrap();
    assert_eq!(eager, compiled);
    assert_eq!(compiled[0].to_vec::<f64>().unwrap(), vec![8.0, -3.5]);
    assert_eq!(compiled[1].to_vec::<f64>().unwrap(), vec![5.0, 0.5]);

    let call = exe.call_nodes()[0];
    assert_eq!(call.result_layouts, vec![vec![0], vec![0]]);
}

#[test]
fn test_concrete_captures_become_constants() {
    let ctx = context();
    let add = ctx
        .register_operator(
            kernel("add", |outs, ins| {
                let a = ins[0].as_array::<i32>()?;
                let b = ins[1].as_array::<i32>()?;
                for ((o, &x), &y) in outs[0].as_array_mut::<i32>()?.iter_mut().zip(a.iter()).zip(b.iter()) {
                    *o = x + y;
                }
                Ok(())
            }),
            OutputSpec::from_fn(|inputs| Ok(inputs[0].clone().into())),
        )
        .unwrap();
    let bias = HostArray::vector(&[100i32, 200]);
    let exe = ctx
        .jit(Platform::Cpu, &[ArrayDesc::vector(2, DType::I32)], |args| {
            Ok(add.invoke(&[args[0].clone(), bias.clone().into()])?.into_vec())
        })
        .unwrap();
    let out = exe.run(&[HostArray::vector(&[1i32, 2])]).unwrap();
    assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![101, 202]);
}

#[test]
fn test_kernel_errors_surface_on_both_paths() {
    let ctx = context();
    let picky = ctx
        .register_operator(
            kernel("picky", |outs, _ins| {
                // Declared output is f32; asking for i32 is a kernel bug.
                outs[0].as_array_mut::<i32>()?;
                Ok(())
            }),
            ArrayDesc::vector(1, DType::F32),
        )
        .unwrap();
    let x = HostArray::vector(&[0.0f32]);
    let eager = picky.call(std::slice::from_ref(&x)).unwrap_err();
    assert!(matches!(eager, OpsError::DTypeMismatch { .. }));

    let exe = ctx
        .jit(Platform::Cpu, &[x.desc()], |args| Ok(picky.invoke(args)?.into_vec()))
        .unwrap();
    let compiled = exe.run(&[x]).unwrap_err();
    assert!(matches!(compiled, OpsError::Execution(_)));
}

#[test]
fn test_concurrent_first_lowering_compiles_once() {
    let ctx = Arc::new(context());
    let op = ctx
        .register_operator(
            kernel("neg", |outs, ins| {
                let x = ins[0].as_array::<f64>()?;
                for (o, &v) in outs[0].as_array_mut::<f64>()?.iter_mut().zip(x.iter()) {
                    *o = -v;
                }
                Ok(())
            }),
            OutputSpec::same_as_inputs(),
        )
        .unwrap();
    let sig = vec![ArrayDesc::vector(16, DType::F64)];

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let op = Arc::clone(&op);
            let sig = sig.clone();
            std::thread::spawn(move || ctx.lower_operator(&op, &sig, Platform::Cpu).map(|c| c.target_name))
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap().unwrap(), "neg(f64[16])");
    }
    assert_eq!(ctx.targets().len(Platform::Cpu), 1);
    assert_eq!(op.target_records(Platform::Cpu).len(), 1);
}
