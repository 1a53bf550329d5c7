// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Translation Rules
//!
//! A translation rule turns one traced operator application into a custom
//! call node. Rules are installed per (platform, operator id); only the CPU
//! rule exists for kernel operators, so lowering for any other platform
//! reports `UnsupportedPlatform`.

use crate::operator::Operator;
use crate::targets::{NativeHandle, TargetRecord, TargetRegistry};
use crate::trampoline;
use ahash::AHashMap;
use feagi_ops_core::{ArrayDesc, OpsError, Platform, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Lowered call of a registered target
#[derive(Clone)]
pub struct CallNode {
    pub target_name: String,
    pub handle: NativeHandle,
    pub operand_descs: Vec<ArrayDesc>,
    /// Minor-to-major dimension order of each operand
    pub operand_layouts: Vec<Vec<usize>>,
    pub result_descs: Vec<ArrayDesc>,
    /// Always row-major (reverse dimension order)
    pub result_layouts: Vec<Vec<usize>>,
}

impl CallNode {
    pub fn new(
        target_name: String,
        handle: NativeHandle,
        operand_descs: Vec<ArrayDesc>,
        result_descs: Vec<ArrayDesc>,
    ) -> Self {
        let operand_layouts = operand_descs.iter().map(ArrayDesc::row_major_layout).collect();
        let result_layouts = result_descs.iter().map(ArrayDesc::row_major_layout).collect();
        Self {
            target_name,
            handle,
            operand_descs,
            operand_layouts,
            result_descs,
            result_layouts,
        }
    }
}

impl fmt::Debug for CallNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallNode")
            .field("target_name", &self.target_name)
            .field("operand_descs", &self.operand_descs)
            .field("result_descs", &self.result_descs)
            .field("result_layouts", &self.result_layouts)
            .finish()
    }
}

pub trait TranslationRule: Send + Sync {
    fn platform(&self) -> Platform;

    /// Lower one application of `op` to operands with the given descriptors.
    ///
    /// Must be idempotent per signature: a repeated call returns the target
    /// built the first time.
    fn lower(&self, op: &Operator, operands: &[ArrayDesc], targets: &TargetRegistry) -> Result<CallNode>;
}

/// Lowers kernel operators through signature-specialized trampolines
pub struct KernelTranslation {
    platform: Platform,
}

impl KernelTranslation {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl TranslationRule for KernelTranslation {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn lower(&self, op: &Operator, operands: &[ArrayDesc], targets: &TargetRegistry) -> Result<CallNode> {
        let outputs = op.abstract_eval(operands)?;
        let platform = self.platform;
        let record = op.target_for(platform, operands, || {
            let name = trampoline::target_name(op.id(), operands);
            let handle = trampoline::compile(&name, Arc::clone(op.kernel()), platform, operands, &outputs)?;
            targets.register_target(&name, handle.clone(), platform)?;
            info!(target: "feagi-ops-runtime", "🔧 compiled trampoline {} for {}", name, platform);
            Ok(TargetRecord {
                target_name: name,
                handle,
                input_signature: operands.to_vec(),
                output_descs: outputs.clone(),
            })
        })?;

        Ok(CallNode::new(
            record.target_name,
            record.handle,
            operands.to_vec(),
            outputs,
        ))
    }
}

/// Installed rules keyed by (platform, operator id)
#[derive(Default)]
pub struct TranslationTable {
    rules: RwLock<AHashMap<(Platform, String), Arc<dyn TranslationRule>>>,
}

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, op_id: &str, rule: Arc<dyn TranslationRule>) {
        self.rules.write().insert((rule.platform(), op_id.to_string()), rule);
    }

    pub fn rule(&self, op_id: &str, platform: Platform) -> Result<Arc<dyn TranslationRule>> {
        self.rules
            .read()
            .get(&(platform, op_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                OpsError::UnsupportedPlatform(format!(
                    "operator {} has no translation rule for {}",
                    op_id, platform
                ))
            })
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }
}
