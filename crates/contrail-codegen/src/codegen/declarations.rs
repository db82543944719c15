use super::context::CompilationContext;
use super::lvalue::{offset, LValue};
use super::types::canonical_type_name;
use super::ContractCompiler;
use crate::ast::{
    FunctionKind, FunctionRef, StateMutability, TypeName, VariableRef, VariableScope, Visibility,
};
use crate::errors::{CodegenError, Result};
use contrail_core::analysis::verify_contract;
use contrail_core::{
    BuiltinFunction, ContextVariable, Contract, Function, InstBuilder, InstBuilderExt, Instruction,
    Mutability, Type, Value,
};
use tracing::{debug, trace};

fn ir_visibility(visibility: Visibility) -> contrail_core::Visibility {
    match visibility {
        Visibility::Public => contrail_core::Visibility::Public,
        Visibility::External => contrail_core::Visibility::External,
        Visibility::Internal => contrail_core::Visibility::Internal,
        Visibility::Private => contrail_core::Visibility::Private,
    }
}

fn ir_mutability(mutability: StateMutability) -> Mutability {
    match mutability {
        StateMutability::Pure => Mutability::Pure,
        StateMutability::View => Mutability::View,
        StateMutability::NonPayable => Mutability::NonPayable,
        StateMutability::Payable => Mutability::Payable,
    }
}

fn calls_selfdestruct(function: &Function) -> bool {
    function
        .body
        .blocks
        .values()
        .flat_map(|block| &block.instructions)
        .any(|inst| {
            matches!(
                inst,
                Instruction::Builtin {
                    function: BuiltinFunction::SelfDestruct,
                    ..
                }
            )
        })
}

/// One accessor dimension: what the caller passes to step into it.
fn accessor_key(ty: &TypeName) -> Option<TypeName> {
    match ty {
        TypeName::Mapping { key, .. } => Some((**key).clone()),
        TypeName::Array { .. } => Some(TypeName::uint256()),
        _ => None,
    }
}

impl<'a> ContractCompiler<'a> {
    /// Lowers the whole contract: storage, `init`, accessors, every
    /// implemented function of the linearization and the library
    /// functions they reach.
    pub(crate) fn compile(mut self) -> Result<Contract> {
        let unit = self.unit;
        let name = self.contract_name().to_string();
        debug!(contract = %name, bases = self.linearization.len(), "lowering contract");

        self.allocate_storage()?;

        let init = self.compile_constructor()?;
        self.functions.insert(init.signature.name.clone(), init);

        let most_base_first: Vec<_> = self.linearization.iter().rev().copied().collect();
        for contract in most_base_first {
            let def = unit.contract(contract);
            if self.config.generate_accessors {
                for var in &def.state_variables {
                    if let Some(accessor) = self.compile_accessor(*var)? {
                        self.functions
                            .insert(accessor.signature.name.clone(), accessor);
                    }
                }
            }
            for function in &def.functions {
                let fdef = unit.function(*function);
                if fdef.kind == FunctionKind::Constructor || !fdef.is_implemented() {
                    continue;
                }
                let lowered = self.compile_function(*function)?;
                self.functions.insert(lowered.signature.name.clone(), lowered);
            }
        }

        while let Some(function) = self.call_queue.pop() {
            let lowered = self.compile_function_as(function, false)?;
            self.functions.insert(lowered.signature.name.clone(), lowered);
        }

        let mut contract = Contract::new(name);
        for function in std::mem::take(&mut self.functions).into_values() {
            contract.add_function(function);
        }
        contract.storage_layout = std::mem::take(&mut self.layout);
        contract.types = std::mem::take(&mut self.types);
        contract.dependencies = std::mem::take(&mut self.dependencies);
        contract.metadata.linearization = self
            .linearization
            .iter()
            .map(|c| unit.contract(*c).name.clone())
            .collect();
        contract.metadata.is_abstract = self.is_abstract();
        contract.metadata.has_external_calls = contract
            .functions
            .values()
            .any(|f| f.metadata.calls_external);
        contract.metadata.has_selfdestruct = contract.functions.values().any(calls_selfdestruct);

        verify_contract(&contract)?;
        debug!(
            contract = %contract.name,
            functions = contract.functions.len(),
            slots = contract.storage_layout.next_free_slot(),
            "lowered contract"
        );
        Ok(contract)
    }

    /// Assigns slots to every non-constant state variable, most-base
    /// contract first, in declaration order.
    fn allocate_storage(&mut self) -> Result<()> {
        let unit = self.unit;
        let mut next = 0u64;
        for contract in self.linearization.clone().into_iter().rev() {
            let def = unit.contract(contract);
            for var in &def.state_variables {
                let decl = unit.variable(*var);
                if decl.is_constant {
                    continue;
                }
                let ty = self.ir_type(&decl.ty, decl.id)?;
                let size = self.types.storage_size(&ty);
                self.layout
                    .add_variable(format!("{}.{}", def.name, decl.name), ty, next, size);
                self.slots.insert(*var, next);
                trace!(variable = %decl.name, slot = next, size, "allocated storage");
                next += size;
            }
        }
        Ok(())
    }

    fn declare_parameters(
        &mut self,
        ctx: &mut CompilationContext,
        parameters: &[VariableRef],
    ) -> Result<()> {
        let unit = self.unit;
        for param in parameters {
            let decl = unit.variable(*param);
            let ty = self.ir_type(&decl.ty, decl.id)?;
            let name = ctx.names.fresh(&decl.name);
            let value = ctx.builder.param(&name, ty);
            ctx.renames.declare_in_function_scope(*param, value);
        }
        Ok(())
    }

    /// Rejects calls carrying value into code that is not payable.
    fn payable_check(&mut self, ctx: &mut CompilationContext) -> Result<()> {
        let value = ctx.ins()?.context(ContextVariable::MsgValue);
        let nonzero = ctx.ins()?.ne(value, Value::zero());
        let revert = ctx.revert_block()?;
        ctx.fail_if(nonzero, revert, "body")
    }

    /// `init`: state variable initializers and constructor bodies of the
    /// whole linearization, most-base first.
    fn compile_constructor(&mut self) -> Result<Function> {
        let unit = self.unit;
        let constructor = self.constructor_of(self.contract);
        let mutability = constructor.map_or(StateMutability::NonPayable, |c| {
            unit.function(c).mutability
        });

        let mut ctx = CompilationContext::new("init", self.contract);
        ctx.builder
            .visibility(contrail_core::Visibility::Public)
            .mutability(ir_mutability(mutability));
        {
            let metadata = ctx.builder.metadata_mut();
            metadata.is_constructor = true;
            metadata.defined_in = Some(self.contract_name().to_string());
        }
        if let Some(constructor) = constructor {
            self.declare_parameters(&mut ctx, &unit.function(constructor).parameters)?;
        }
        if mutability != StateMutability::Payable {
            self.payable_check(&mut ctx)?;
        }

        for contract in self.linearization.clone().into_iter().rev() {
            ctx.scope_contract = contract;
            for var in &unit.contract(contract).state_variables {
                let decl = unit.variable(*var);
                let (false, Some(init)) = (decl.is_constant, &decl.value) else {
                    continue;
                };
                let slot = self.slots.get(var).copied().ok_or_else(|| {
                    CodegenError::UnknownVariable {
                        node: decl.id,
                        name: decl.name.clone(),
                    }
                })?;
                let value = self.compile_single(&mut ctx, init)?;
                let target = LValue::storage(Value::int(slot), &decl.ty);
                self.store(&mut ctx, &target, value, &init.ty, init.id)?;
            }

            let Some(base_constructor) = self.constructor_of(contract) else {
                continue;
            };
            let def = unit.function(base_constructor);
            if contract != self.contract && !def.parameters.is_empty() {
                return Err(CodegenError::unsupported(def.id, "base constructor arguments"));
            }
            if def.is_implemented() {
                trace!(contract = %unit.contract(contract).name, "inlining constructor");
                self.compile_function_body(&mut ctx, base_constructor)?;
            }
        }

        ctx.builder.return_values(Vec::new())?;
        Ok(ctx.builder.build()?)
    }

    /// Lowers one source function to an IR function named per
    /// [`ContractCompiler::function_name`].
    pub(crate) fn compile_function(&mut self, function: FunctionRef) -> Result<Function> {
        self.compile_function_as(function, true)
    }

    /// With `entry` unset the function is lowered under its qualified
    /// name, as an internal function without the value check.
    fn compile_function_as(&mut self, function: FunctionRef, entry: bool) -> Result<Function> {
        let unit = self.unit;
        let def = unit.function(function);
        let owner = unit.contract(def.contract);
        let name = if entry {
            self.function_name(function)
        } else {
            self.qualified_name(function)
        };
        let visibility = if entry || !self.is_entry_point(function) {
            ir_visibility(def.visibility)
        } else {
            contrail_core::Visibility::Internal
        };
        debug!(function = %name, entry, "lowering function");

        let mut ctx = CompilationContext::new(&name, def.contract);
        ctx.builder
            .visibility(visibility)
            .mutability(ir_mutability(def.mutability));
        {
            let metadata = ctx.builder.metadata_mut();
            metadata.is_fallback = def.kind == FunctionKind::Fallback;
            metadata.source_name = Some(def.name.clone());
            metadata.defined_in = Some(owner.name.clone());
        }

        self.declare_parameters(&mut ctx, &def.parameters)?;

        let mut return_types = Vec::with_capacity(def.returns.len());
        for ret in &def.returns {
            let decl = unit.variable(*ret);
            return_types.push(self.ir_type(&decl.ty, decl.id)?);
            let local = ctx.fresh_local(&decl.name);
            let zero = self.default_value(&mut ctx, &decl.ty, decl.id)?;
            ctx.ins()?.assign(local.clone(), zero);
            ctx.renames.declare_in_function_scope(*ret, local.clone());
            ctx.return_vars.push((local, decl.ty.clone()));
        }
        ctx.builder.returns(return_types);

        if entry && self.rejects_value(function) {
            self.payable_check(&mut ctx)?;
        }

        self.compile_function_body(&mut ctx, function)?;

        let values = ctx.return_values();
        ctx.builder.return_values(values)?;
        Ok(ctx.builder.build()?)
    }

    /// Getter for a public state variable, or `None` when the variable
    /// is not public or a function with the same signature replaces it.
    ///
    /// Mappings and arrays take one key per dimension. A struct value
    /// returns its value-typed members.
    fn compile_accessor(&mut self, var: VariableRef) -> Result<Option<Function>> {
        let unit = self.unit;
        let decl = unit.variable(var);
        if decl.visibility != Visibility::Public {
            return Ok(None);
        }
        let node = decl.id;

        let mut keys = Vec::new();
        let mut ty = &decl.ty;
        while let Some(key) = accessor_key(ty) {
            keys.push(key);
            ty = match ty {
                TypeName::Mapping { value, .. } => value,
                TypeName::Array { base, .. } => base,
                _ => break,
            };
        }
        let name = format!(
            "{}({})",
            decl.name,
            keys.iter()
                .map(|k| canonical_type_name(unit, k))
                .collect::<Vec<_>>()
                .join(",")
        );
        let replaced = self.linearization.iter().any(|c| {
            unit.contract(*c).functions.iter().any(|f| {
                unit.function(*f).kind == FunctionKind::Function
                    && unit.function(*f).is_implemented()
                    && self.function_signature(*f) == name
            })
        });
        if replaced {
            trace!(accessor = %name, "accessor replaced by a function");
            return Ok(None);
        }
        debug!(accessor = %name, "generating accessor");

        let owner = match decl.scope {
            VariableScope::State(c) => c,
            _ => self.contract,
        };
        let mut ctx = CompilationContext::new(&name, owner);
        ctx.builder
            .visibility(contrail_core::Visibility::Public)
            .mutability(Mutability::View);
        {
            let metadata = ctx.builder.metadata_mut();
            metadata.is_accessor = true;
            metadata.source_name = Some(decl.name.clone());
            metadata.defined_in = Some(unit.contract(owner).name.clone());
        }

        if decl.is_constant {
            let init = decl
                .value
                .as_ref()
                .ok_or_else(|| CodegenError::type_mismatch(node, "constant without a value"))?;
            ctx.builder.returns(vec![self.ir_type(&decl.ty, node)?]);
            let value = self.compile_single(&mut ctx, init)?;
            let value = self.convert(&mut ctx, value, &init.ty, &decl.ty)?;
            ctx.builder.return_values(vec![value])?;
            return Ok(Some(ctx.builder.build()?));
        }

        let root = self.slots.get(&var).copied().ok_or_else(|| CodegenError::UnknownVariable {
            node,
            name: decl.name.clone(),
        })?;
        let mut slot = Value::int(root);
        let mut current = decl.ty.clone();
        for key in &keys {
            let ir = self.ir_type(key, node)?;
            let param_name = ctx.names.fresh(if matches!(current, TypeName::Mapping { .. }) {
                "key"
            } else {
                "index"
            });
            let param = ctx.builder.param(&param_name, ir);
            current = match &current {
                TypeName::Mapping { value, .. } => {
                    slot = ctx.ins()?.mapping_slot(slot, param);
                    (**value).clone()
                }
                array @ TypeName::Array { base, .. } => {
                    slot = self.storage_element_slot(&mut ctx, slot, array, param, node)?;
                    (**base).clone()
                }
                _ => return Err(CodegenError::type_mismatch(node, "accessor key on a value")),
            };
        }

        let mut returns: Vec<Type> = Vec::new();
        let mut values = Vec::new();
        match &current {
            TypeName::Struct { id, .. } => {
                let members: Vec<TypeName> = unit
                    .struct_def(*id)
                    .members
                    .iter()
                    .map(|m| m.ty.clone())
                    .collect();
                for (index, member) in members.iter().enumerate() {
                    if !member.is_value_type() {
                        continue;
                    }
                    let field = self.storage_field_offset(*id, index, node)?;
                    let address = offset(&mut ctx, slot.clone(), Value::int(field))?;
                    returns.push(self.ir_type(member, node)?);
                    values.push(ctx.ins()?.storage_load(address));
                }
            }
            ty if ty.is_value_type() => {
                returns.push(self.ir_type(ty, node)?);
                values.push(ctx.ins()?.storage_load(slot));
            }
            _ => {
                return Err(CodegenError::unsupported(
                    node,
                    "accessor for a nested reference type",
                ))
            }
        }
        ctx.builder.returns(returns);
        ctx.builder.return_values(values)?;
        Ok(Some(ctx.builder.build()?))
    }
}
