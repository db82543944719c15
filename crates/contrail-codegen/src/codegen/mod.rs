//! Lowering from the resolved AST to contrail IR.
//!
//! [`compile_contract`] turns one contract, together with everything it
//! inherits, into a [`Contract`]: storage layout, constructor, accessors
//! and one IR function per implemented function. [`compile_source_unit`]
//! does that for every contract in dependency order so that `new C`
//! always finds `C` already compiled.

mod calls;
mod context;
mod declarations;
mod expression;
mod inheritance;
mod lvalue;
mod modifiers;
mod names;
mod operators;
mod statement;
mod types;

pub use context::REVERT_STATUS;
pub use inheritance::linearize;
pub use lvalue::{should_copy_memory_to_storage, should_copy_storage_to_memory, should_copy_storage_to_storage};
pub use types::canonical_type_name;

use crate::ast::{visit, ContractKind, ContractRef, ExpressionKind, FunctionRef, NewTarget, SourceUnit, VariableRef};
use crate::config::CodegenConfig;
use crate::errors::{CodegenError, Result};
use contrail_core::{Contract, Function, StorageLayout, TypeRegistry};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Contracts already lowered, available as `new` targets.
pub type CompiledContracts = BTreeMap<ContractRef, Contract>;

/// Per-contract compiler state. Discarded once the contract is built.
pub(crate) struct ContractCompiler<'a> {
    unit: &'a SourceUnit,
    config: &'a CodegenConfig,
    siblings: &'a CompiledContracts,
    contract: ContractRef,
    /// Most-derived first.
    linearization: Vec<ContractRef>,
    types: TypeRegistry,
    layout: StorageLayout,
    slots: HashMap<VariableRef, u64>,
    functions: IndexMap<String, Function>,
    dependencies: Vec<String>,
    /// Functions reached only through internal calls, lowered after the
    /// linearization: foreign library functions and the unchecked bodies
    /// of entry points that reject value.
    call_queue: Vec<FunctionRef>,
    queued: BTreeSet<FunctionRef>,
}

impl<'a> ContractCompiler<'a> {
    pub(crate) fn new(
        unit: &'a SourceUnit,
        config: &'a CodegenConfig,
        siblings: &'a CompiledContracts,
        contract: ContractRef,
    ) -> Result<Self> {
        let linearization = linearize(unit, contract)?;
        Ok(Self {
            unit,
            config,
            siblings,
            contract,
            linearization,
            types: TypeRegistry::new(),
            layout: StorageLayout::default(),
            slots: HashMap::new(),
            functions: IndexMap::new(),
            dependencies: Vec::new(),
            call_queue: Vec::new(),
            queued: BTreeSet::new(),
        })
    }

    pub(crate) fn contract_name(&self) -> &str {
        &self.unit.contract(self.contract).name
    }
}

/// Compiles one contract. Every contract it creates with `new` must
/// already be present in `siblings`.
pub fn compile_contract(
    unit: &SourceUnit,
    contract: ContractRef,
    siblings: &CompiledContracts,
    config: &CodegenConfig,
) -> Result<Contract> {
    ContractCompiler::new(unit, config, siblings, contract)?.compile()
}

/// Compiles every non-interface contract in `unit`, creators after the
/// contracts they create.
pub fn compile_source_unit(unit: &SourceUnit, config: &CodegenConfig) -> Result<CompiledContracts> {
    let order = creation_order(unit)?;
    info!(contracts = order.len(), "compiling source unit");

    let mut compiled = CompiledContracts::new();
    for contract in order {
        let result = compile_contract(unit, contract, &compiled, config)?;
        debug!(
            contract = %result.name,
            functions = result.functions.len(),
            "compiled contract"
        );
        compiled.insert(contract, result);
    }
    Ok(compiled)
}

/// Contracts whose `new` expressions appear anywhere in the code that
/// `contract` inherits.
fn created_contracts(unit: &SourceUnit, contract: ContractRef) -> Result<BTreeSet<ContractRef>> {
    let mut created = BTreeSet::new();
    let mut collect = |expr: &crate::ast::Expression| {
        if let ExpressionKind::New(NewTarget::Contract(target)) = &expr.kind {
            created.insert(*target);
        }
    };
    for base in linearize(unit, contract)? {
        let def = unit.contract(base);
        for f in &def.functions {
            let function = unit.function(*f);
            if let Some(body) = &function.body {
                visit::walk_block(body, &mut collect);
            }
            for invocation in &function.modifiers {
                for arg in &invocation.arguments {
                    visit::walk_expression(arg, &mut collect);
                }
            }
        }
        for m in &def.modifiers {
            visit::walk_block(&unit.modifier(*m).body, &mut collect);
        }
        for v in &def.state_variables {
            if let Some(value) = &unit.variable(*v).value {
                visit::walk_expression(value, &mut collect);
            }
        }
    }
    Ok(created)
}

fn creation_order(unit: &SourceUnit) -> Result<Vec<ContractRef>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        unit: &SourceUnit,
        contract: ContractRef,
        marks: &mut HashMap<ContractRef, Mark>,
        order: &mut Vec<ContractRef>,
    ) -> Result<()> {
        match marks.get(&contract) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let def = unit.contract(contract);
                return Err(CodegenError::SiblingNotCompiled {
                    node: def.id,
                    name: def.name.clone(),
                });
            }
            None => {}
        }
        marks.insert(contract, Mark::Visiting);
        for created in created_contracts(unit, contract)? {
            visit(unit, created, marks, order)?;
        }
        marks.insert(contract, Mark::Done);
        order.push(contract);
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut order = Vec::new();
    for contract in unit.contract_refs() {
        if unit.contract(contract).kind != ContractKind::Interface {
            visit(unit, contract, &mut marks, &mut order)?;
        }
    }
    Ok(order)
}
