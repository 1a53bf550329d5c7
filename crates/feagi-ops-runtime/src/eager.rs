// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Eager (interpreted) execution: abstract-evaluate, allocate zeroed
//! outputs, let the kernel fill them. Never touches the target registrar.

use crate::abstract_eval::AbstractEvaluator;
use crate::kernel::Kernel;
use feagi_ops_core::{ArrayDesc, HostArray, HostView, HostViewMut, Result};
use tracing::debug;

pub(crate) fn execute(
    op_id: &str,
    kernel: &dyn Kernel,
    evaluator: &AbstractEvaluator,
    inputs: &[HostArray],
) -> Result<Vec<HostArray>> {
    let input_descs: Vec<ArrayDesc> = inputs.iter().map(HostArray::desc).collect();
    let output_descs = evaluator.evaluate(&input_descs)?;
    debug!(target: "feagi-ops-runtime", "eager {} with {} inputs -> {} outputs", op_id, inputs.len(), output_descs.len());

    let mut outputs: Vec<HostArray> = output_descs.iter().map(HostArray::zeros).collect();
    {
        let in_views: Vec<HostView<'_>> = inputs.iter().map(HostArray::view).collect();
        let mut out_views: Vec<HostViewMut<'_>> = outputs.iter_mut().map(HostArray::view_mut).collect();
        kernel.call(&mut out_views, &in_views)?;
    }
    Ok(outputs)
}
