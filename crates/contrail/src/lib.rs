/*! Unified interface for the contrail code generator.
 *
 * Single import for the whole pipeline: build or load a resolved [`ast::SourceUnit`], lower it to
 * IR with [`compile_source_unit`], render the result with [`ContrailEmitter`] or execute it on the
 * reference [`interp::Vm`].
 */

pub use contrail_codegen as codegen;
pub use contrail_core as core;
pub use contrail_emit as emit;

pub use contrail_codegen::{
    ast, compile_contract, compile_source_unit, CodegenConfig, CodegenError, CompiledContracts,
    SourceUnitBuilder,
};
pub use contrail_core::{
    analysis::verify_contract,
    block::{BasicBlock, BlockId, Terminator},
    contract::Contract,
    function::{Function, Mutability, Visibility},
    instructions::Instruction,
    interp,
    ir_persist,
    types::Type,
    values::Value,
};
pub use contrail_emit::{ContrailEmitter, EmitterConfig};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Compiles every contract of `unit` and renders them one after another,
/// creators after the contracts they create.
pub fn compile_to_text(unit: &ast::SourceUnit, config: &CodegenConfig) -> Result<String> {
    let compiled = compile_source_unit(unit, config).context("code generation failed")?;
    let emitter = ContrailEmitter::default();
    let mut text = String::new();
    for contract in creation_ordered(&compiled) {
        text.push_str(&emitter.render(contract)?);
        text.push('\n');
    }
    Ok(text)
}

/// Compiles `unit` and writes one JSON file per contract into `dir`,
/// named after the contract. Returns the written paths.
pub fn compile_to_dir(
    unit: &ast::SourceUnit,
    config: &CodegenConfig,
    dir: impl AsRef<Path>,
) -> Result<Vec<std::path::PathBuf>> {
    let dir = dir.as_ref();
    let compiled = compile_source_unit(unit, config).context("code generation failed")?;
    let mut written = Vec::with_capacity(compiled.len());
    for contract in compiled.values() {
        let path = dir.join(format!("{}.json", contract.name));
        ir_persist::save_contract(contract, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    info!(contracts = written.len(), dir = %dir.display(), "saved compiled contracts");
    Ok(written)
}

/// Contracts ordered so that each one follows every contract it creates.
fn creation_ordered(compiled: &CompiledContracts) -> Vec<&Contract> {
    let mut ordered: Vec<&Contract> = Vec::with_capacity(compiled.len());
    let mut pending: Vec<&Contract> = compiled.values().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|contract| {
            let ready = contract
                .dependencies
                .iter()
                .all(|dep| ordered.iter().any(|done| &done.name == dep));
            if ready {
                ordered.push(*contract);
            }
            !ready
        });
        if pending.len() == before {
            // Dependencies outside the unit; keep declaration order.
            ordered.append(&mut pending);
        }
    }
    ordered
}
