// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Runtime Context
//!
//! Owns the process-scoped state: operator table, per-platform target
//! namespaces, translation rules and the extension cache. Construct one per
//! test (or use [`RuntimeContext::global`] in applications); [`reset`]
//! returns a context to its freshly-constructed state.
//!
//! [`reset`]: RuntimeContext::reset

use crate::abstract_eval::OutputSpec;
use crate::extension::{
    Capability, DylibLoader, ExtensionHandle, ExtensionLoader, ExtensionSource, ExtensionSpec, LinkedExtensions,
};
use crate::graph::{Executable, Trace, Value};
use crate::kernel::Kernel;
use crate::lowering::{CallNode, KernelTranslation, TranslationRule, TranslationTable};
use crate::operator::Operator;
use crate::registry::OperatorRegistry;
use crate::targets::{NativeHandle, TargetRegistry};
use feagi_ops_config::{load_config_or_default, OpsConfig};
use feagi_ops_core::{ArrayDesc, HostArray, OpsError, Platform, Result};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

pub struct RuntimeContext {
    config: OpsConfig,
    operators: OperatorRegistry,
    targets: TargetRegistry,
    translations: TranslationTable,
    extensions: ExtensionLoader,
}

impl RuntimeContext {
    /// Context whose extension sources follow `config`: linked libraries
    /// (when `link_builtin_extensions` is set), then the dylib search paths.
    pub fn new(config: OpsConfig) -> Result<Self> {
        let sources = default_sources(&config);
        Self::with_sources(config, sources)
    }

    /// Context with explicit extension sources
    pub fn with_sources(config: OpsConfig, sources: Vec<Arc<dyn ExtensionSource>>) -> Result<Self> {
        let specs = config_specs(&config)?;
        Ok(Self::assemble(config, sources, specs))
    }

    fn assemble(config: OpsConfig, sources: Vec<Arc<dyn ExtensionSource>>, specs: Vec<ExtensionSpec>) -> Self {
        let extensions = ExtensionLoader::new();
        extensions.register_spec(ExtensionSpec::accel());
        for spec in specs {
            extensions.register_spec(spec);
        }
        for source in sources {
            extensions.add_source(source);
        }
        debug!(
            target: "feagi-ops-runtime",
            "runtime context created (default platform {}, event fallback {})",
            config.runtime.default_platform,
            config.runtime.event_fallback
        );
        Self {
            config,
            operators: OperatorRegistry::new(),
            targets: TargetRegistry::new(),
            translations: TranslationTable::new(),
            extensions,
        }
    }

    /// Shared context configured from `feagi_ops.toml` and the environment.
    ///
    /// Falls back to defaults (with a warning) if the configuration is invalid.
    pub fn global() -> &'static RuntimeContext {
        static GLOBAL: OnceLock<RuntimeContext> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = load_config_or_default(None).unwrap_or_else(|e| {
                warn!(target: "feagi-ops-runtime", "ignoring invalid configuration: {}", e);
                OpsConfig::default()
            });
            let sources = default_sources(&config);
            match config_specs(&config) {
                Ok(specs) => Self::assemble(config, sources, specs),
                Err(e) => {
                    warn!(target: "feagi-ops-runtime", "ignoring extension requirements: {}", e);
                    Self::assemble(config, sources, Vec::new())
                }
            }
        })
    }

    pub fn config(&self) -> &OpsConfig {
        &self.config
    }

    pub fn default_platform(&self) -> Platform {
        self.config.runtime.default_platform
    }

    // ---- operators ----

    /// Register a kernel and install its CPU translation rule
    pub fn register_operator(&self, kernel: Arc<dyn Kernel>, spec: impl Into<OutputSpec>) -> Result<Arc<Operator>> {
        let op = self.operators.register(kernel, spec.into())?;
        self.translations
            .install(op.id(), Arc::new(KernelTranslation::new(Platform::Cpu)));
        Ok(op)
    }

    pub fn operator(&self, id: &str) -> Option<Arc<Operator>> {
        self.operators.get(id)
    }

    pub fn operator_ids(&self) -> Vec<String> {
        self.operators.ids()
    }

    // ---- targets and lowering ----

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    pub fn register_target(&self, name: &str, handle: NativeHandle, platform: Platform) -> Result<()> {
        self.targets.register_target(name, handle, platform)
    }

    pub fn translation_rule(&self, op: &Operator, platform: Platform) -> Result<Arc<dyn TranslationRule>> {
        self.translations.rule(op.id(), platform)
    }

    /// Lower one application of `op`, compiling and registering its target on first use
    pub fn lower_operator(&self, op: &Operator, operands: &[ArrayDesc], platform: Platform) -> Result<CallNode> {
        self.translation_rule(op, platform)?
            .lower(op, operands, &self.targets)
    }

    // ---- extensions ----

    pub fn extensions(&self) -> &ExtensionLoader {
        &self.extensions
    }

    pub fn require_extension(&self, name: &str, platform: Platform) -> Result<Arc<ExtensionHandle>> {
        self.extensions.require(name, platform, &self.targets)
    }

    pub fn probe_extension(&self, name: &str, platform: Platform) -> Capability {
        self.extensions.probe(name, platform, &self.targets)
    }

    /// Whether `name` is already loaded for `platform`; never attempts a load
    pub fn is_extension_available(&self, name: &str, platform: Platform) -> bool {
        self.extensions.is_available(name, platform)
    }

    pub fn loaded_extensions(&self) -> Vec<Arc<ExtensionHandle>> {
        self.extensions.loaded()
    }

    // ---- execution ----

    /// Call a registered target directly on concrete arrays.
    ///
    /// Outputs are allocated zeroed from `output_descs`; the target writes
    /// them in place.
    pub fn call_target(
        &self,
        name: &str,
        platform: Platform,
        output_descs: &[ArrayDesc],
        inputs: &[HostArray],
    ) -> Result<Vec<HostArray>> {
        let handle = self.targets.lookup(name, platform).ok_or_else(|| {
            OpsError::Configuration(format!("target {} is not registered on {}", name, platform))
        })?;
        let inputs: Vec<HostArray> = inputs.iter().map(HostArray::to_contiguous).collect();
        let mut outputs: Vec<HostArray> = output_descs.iter().map(HostArray::zeros).collect();
        handle.call(name, &mut outputs, &inputs)?;
        Ok(outputs)
    }

    pub fn trace(&self) -> Trace {
        Trace::new()
    }

    /// Trace `f` over symbolic inputs and compile the graph for `platform`
    pub fn jit<F>(&self, platform: Platform, input_descs: &[ArrayDesc], f: F) -> Result<Executable>
    where
        F: FnOnce(&[Value]) -> Result<Vec<Value>>,
    {
        let trace = Trace::new();
        let params: Vec<Value> = input_descs.iter().map(|d| trace.parameter(d.clone())).collect();
        let outputs = f(&params)?;
        if outputs.is_empty() {
            return Err(OpsError::Configuration("traced function returned no outputs".to_string()));
        }
        trace.compile(self, platform, &outputs)
    }

    /// Drop every operator, target, translation rule and loaded extension
    pub fn reset(&self) {
        self.operators.clear();
        self.targets.clear();
        self.translations.clear();
        self.extensions.clear();
        info!(target: "feagi-ops-runtime", "runtime context reset");
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        let config = OpsConfig::default();
        let sources = default_sources(&config);
        Self::assemble(config, sources, Vec::new())
    }
}

fn default_sources(config: &OpsConfig) -> Vec<Arc<dyn ExtensionSource>> {
    let mut sources: Vec<Arc<dyn ExtensionSource>> = Vec::new();
    if config.runtime.link_builtin_extensions {
        let linked = LinkedExtensions::builtin();
        if !linked.is_empty() {
            sources.push(Arc::new(linked));
        }
    }
    if !config.extensions.search_paths.is_empty() {
        sources.push(Arc::new(DylibLoader::new(config.extensions.search_paths.clone())));
    }
    sources
}

fn config_specs(config: &OpsConfig) -> Result<Vec<ExtensionSpec>> {
    config
        .extensions
        .required
        .iter()
        .map(|req| {
            let hint = if req.install_hint.is_empty() {
                format!("install the {} library", req.name)
            } else {
                req.install_hint.clone()
            };
            ExtensionSpec::new(req.name.clone(), &req.min_version, hint)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{anonymous_kernel, kernel};
    use feagi_ops_config::ExtensionRequirement;
    use feagi_ops_core::DType;

    fn doubler() -> Arc<dyn Kernel> {
        kernel("double", |outs, ins| {
            let x = ins[0].as_array::<f64>()?;
            for (o, &v) in outs[0].as_array_mut::<f64>()?.iter_mut().zip(x.iter()) {
                *o = 2.0 * v;
            }
            Ok(())
        })
    }

    #[test]
    fn test_jit_matches_eager() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let op = ctx.register_operator(doubler(), OutputSpec::same_as_inputs()).unwrap();
        let x = HostArray::vector(&[1.0f64, -2.0, 3.5]);

        let eager = op.call(std::slice::from_ref(&x)).unwrap().into_single().unwrap();

        let exe = ctx
            .jit(Platform::Cpu, &[x.desc()], |args| {
                let once = op.invoke(args)?.into_single()?;
                Ok(op.invoke(&[once])?.into_vec())
            })
            .unwrap();
        let compiled = exe.run(&[x]).unwrap();
        assert_eq!(eager.to_vec::<f64>().unwrap(), vec![2.0, -4.0, 7.0]);
        assert_eq!(compiled[0].to_vec::<f64>().unwrap(), vec![4.0, -8.0, 14.0]);
        // Both applications share one signature, hence one target.
        assert_eq!(ctx.targets().names(Platform::Cpu), vec!["double(f64[3])".to_string()]);
        assert_eq!(exe.call_nodes().len(), 2);
    }

    #[test]
    fn test_gpu_jit_is_unsupported() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let op = ctx.register_operator(doubler(), OutputSpec::same_as_inputs()).unwrap();
        let desc = ArrayDesc::vector(2, DType::F64);
        let err = ctx
            .jit(Platform::Gpu, &[desc], |args| Ok(op.invoke(args)?.into_vec()))
            .unwrap_err();
        assert!(matches!(err, OpsError::UnsupportedPlatform(_)));
    }

    #[test]
    fn test_run_rejects_wrong_input_shape() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let op = ctx.register_operator(doubler(), OutputSpec::same_as_inputs()).unwrap();
        let exe = ctx
            .jit(Platform::Cpu, &[ArrayDesc::vector(2, DType::F64)], |args| {
                Ok(op.invoke(args)?.into_vec())
            })
            .unwrap();
        let err = exe.run(&[HostArray::vector(&[1.0f64])]).unwrap_err();
        assert!(matches!(err, OpsError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_reset_clears_state() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let op = ctx.register_operator(doubler(), OutputSpec::same_as_inputs()).unwrap();
        ctx.lower_operator(&op, &[ArrayDesc::vector(4, DType::F64)], Platform::Cpu)
            .unwrap();
        assert_eq!(ctx.operator_ids(), vec!["double".to_string()]);
        assert_eq!(ctx.targets().len(Platform::Cpu), 1);

        ctx.reset();
        assert!(ctx.operator_ids().is_empty());
        assert_eq!(ctx.targets().len(Platform::Cpu), 0);
        assert!(op.target_records(Platform::Cpu).is_empty());
    }

    #[test]
    fn test_anonymous_ids_survive_reset() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let desc = ArrayDesc::vector(2, DType::F32);
        let stale = ctx
            .register_operator(anonymous_kernel(|_, _| Ok(())), OutputSpec::same_as_inputs())
            .unwrap();
        ctx.lower_operator(&stale, &[desc.clone()], Platform::Cpu).unwrap();

        ctx.reset();
        let fresh = ctx
            .register_operator(anonymous_kernel(|_, _| Ok(())), OutputSpec::same_as_inputs())
            .unwrap();
        assert_ne!(stale.id(), fresh.id());

        let call = ctx.lower_operator(&fresh, &[desc], Platform::Cpu).unwrap();
        assert!(call.target_name.starts_with(fresh.id()));
        assert_eq!(ctx.targets().len(Platform::Cpu), 1);
    }

    #[test]
    fn test_config_requirements_become_specs() {
        let mut config = OpsConfig::default();
        config.extensions.required.push(ExtensionRequirement {
            name: "other_lib".to_string(),
            min_version: "2.1".to_string(),
            install_hint: String::new(),
        });
        let ctx = RuntimeContext::with_sources(config, vec![]).unwrap();
        let spec = ctx.extensions().spec("other_lib").unwrap();
        assert_eq!(spec.min_version.to_string(), "2.1.0");
        assert!(spec.install_hint.contains("other_lib"));
        assert!(ctx.extensions().spec("feagi_ops_accel").is_some());

        let mut bad = OpsConfig::default();
        bad.extensions.required.push(ExtensionRequirement {
            name: "x".to_string(),
            min_version: "latest".to_string(),
            install_hint: String::new(),
        });
        assert!(RuntimeContext::with_sources(bad, vec![]).is_err());
    }

    #[test]
    fn test_missing_extension_without_sources() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        assert!(matches!(
            ctx.require_extension("feagi_ops_accel", Platform::Cpu),
            Err(OpsError::CapabilityMissing(_))
        ));
        assert!(!ctx.is_extension_available("feagi_ops_accel", Platform::Cpu));
        assert!(!ctx.probe_extension("feagi_ops_accel", Platform::Cpu).is_loaded());
    }
}
