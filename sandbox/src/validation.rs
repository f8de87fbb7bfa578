//! Static checks and analysis of contract modules.
//!
//! A module is accepted by the cache only if:
//!
//! 1. It exports `memory`
//! 2. It exports at least one entry point, each with the guest signature
//! 3. All imports are known functions from the `env` module (no WASI)
//! 4. Every capability it requires is available

use std::collections::BTreeSet;

use wasmtime::{ExternType, Module, ValType};

use vmbridge_primitives::AnalysisReport;

use crate::entry_points::EntryPoint;
use crate::error::VmError;

/// Import module name for host functions.
pub const IMPORT_MODULE: &str = "env";

/// Host functions a contract may import from [`IMPORT_MODULE`], with the
/// number of i32 params and i32 results each is registered with.
pub const SUPPORTED_IMPORTS: &[(&str, usize, usize)] = &[
    ("db_read", 4, 1),
    ("db_write", 4, 1),
    ("db_remove", 2, 1),
    ("db_scan", 5, 1),
    ("db_next", 5, 1),
    ("addr_humanize", 4, 1),
    ("addr_canonicalize", 4, 1),
    ("query_chain", 4, 1),
    ("debug", 2, 0),
];

/// Exports named `requires_<capability>` declare a required capability.
const REQUIRES_PREFIX: &str = "requires_";

fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

/// Validate a compiled module against the available capabilities.
pub fn check_wasm(module: &Module, available: &BTreeSet<String>) -> Result<(), VmError> {
    check_memory(module)?;
    check_entry_points(module)?;
    check_imports(module)?;
    check_capabilities(module, available)?;
    Ok(())
}

fn check_memory(module: &Module) -> Result<(), VmError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == "memory" && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(VmError::StaticValidation(
            "module must export 'memory'".into(),
        ));
    }
    Ok(())
}

fn check_entry_points(module: &Module) -> Result<(), VmError> {
    let mut found = 0;
    for export in module.exports() {
        let entry = match EntryPoint::from_name(export.name()) {
            Some(entry) => entry,
            None => continue,
        };
        found += 1;

        let func_ty = match export.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(VmError::StaticValidation(format!(
                    "export '{}' must be a function",
                    entry.name()
                )));
            }
        };

        let params: Vec<ValType> = func_ty.params().collect();
        let results: Vec<ValType> = func_ty.results().collect();

        if params.len() != entry.param_count() || !params.iter().all(is_i32) {
            return Err(VmError::StaticValidation(format!(
                "export '{}' has wrong param signature: expected {} i32 params, got {} params",
                entry.name(),
                entry.param_count(),
                params.len()
            )));
        }
        if results.len() != 1 || !results.iter().all(is_i32) {
            return Err(VmError::StaticValidation(format!(
                "export '{}' must return a single i32",
                entry.name()
            )));
        }
    }
    if found == 0 {
        return Err(VmError::StaticValidation(
            "module exports no entry points".into(),
        ));
    }
    Ok(())
}

fn check_imports(module: &Module) -> Result<(), VmError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(VmError::StaticValidation(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != IMPORT_MODULE {
            return Err(VmError::StaticValidation(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                IMPORT_MODULE,
                import.name()
            )));
        }

        let (param_count, result_count) = match SUPPORTED_IMPORTS
            .iter()
            .find(|(name, _, _)| *name == import.name())
        {
            Some(&(_, params, results)) => (params, results),
            None => {
                return Err(VmError::StaticValidation(format!(
                    "unsupported import: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        };

        let func_ty = match import.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(VmError::StaticValidation(format!(
                    "non-function import not allowed: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        };

        let params: Vec<ValType> = func_ty.params().collect();
        let results: Vec<ValType> = func_ty.results().collect();
        if params.len() != param_count
            || results.len() != result_count
            || !params.iter().chain(results.iter()).all(is_i32)
        {
            return Err(VmError::StaticValidation(format!(
                "import {}::{} has wrong signature: expected {} i32 params and {} i32 results",
                module_name,
                import.name(),
                param_count,
                result_count
            )));
        }
    }
    Ok(())
}

fn check_capabilities(module: &Module, available: &BTreeSet<String>) -> Result<(), VmError> {
    let missing: Vec<String> = required_capabilities(module)
        .difference(available)
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(VmError::StaticValidation(format!(
            "Wasm contract requires unavailable capabilities: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn required_capabilities(module: &Module) -> BTreeSet<String> {
    module
        .exports()
        .filter_map(|e| e.name().strip_prefix(REQUIRES_PREFIX))
        .filter(|cap| !cap.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if the module exports any IBC lifecycle hook.
pub fn has_ibc_entry_points(module: &Module) -> bool {
    module
        .exports()
        .filter_map(|e| EntryPoint::from_name(e.name()))
        .any(EntryPoint::is_ibc)
}

pub fn analyze(module: &Module) -> AnalysisReport {
    AnalysisReport {
        has_ibc_entry_points: has_ibc_entry_points(module),
        required_capabilities: required_capabilities(module),
    }
}
