use super::context::CompilationContext;
use super::lvalue::{offset, scale, LValue};
use super::ContractCompiler;
use crate::ast::{
    BuiltinFunction, CallKind, CallOptions, ContractKind, ContractRef, DataLocation, Declaration,
    Expression, ExpressionKind, FunctionRef, MagicVariable, NewTarget, NodeId, StructRef, TypeName,
};
use crate::errors::{CodegenError, Result};
use contrail_core::{BuiltinFunction as IrBuiltin, ContextVariable, InstBuilder, InstBuilderExt, Value};
use tracing::trace;

/// Gas forwarded with `transfer` and `send`.
const TRANSFER_STIPEND: i64 = 2300;

/// Function the value-only transfers call on the recipient.
const DEPOSIT_FUNCTION: &str = "deposit";

fn expect_arguments(node: NodeId, arguments: &[Expression], expected: usize) -> Result<()> {
    if arguments.len() != expected {
        return Err(CodegenError::ArityMismatch {
            node,
            expected,
            found: arguments.len(),
        });
    }
    Ok(())
}

impl ContractCompiler<'_> {
    pub(crate) fn compile_function_call(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
    ) -> Result<Vec<Value>> {
        let ExpressionKind::FunctionCall {
            callee,
            arguments,
            kind,
            options,
        } = &expr.kind
        else {
            return Err(CodegenError::type_mismatch(expr.id, "not a call"));
        };

        match kind {
            CallKind::TypeConversion => {
                expect_arguments(expr.id, arguments, 1)?;
                let value = self.compile_single(ctx, &arguments[0])?;
                Ok(vec![self.convert(ctx, value, &arguments[0].ty, &expr.ty)?])
            }
            CallKind::StructConstructor => match &callee.kind {
                ExpressionKind::Identifier {
                    declaration: Declaration::Struct(id),
                    ..
                } => Ok(vec![self.construct_struct(ctx, expr.id, *id, arguments)?]),
                _ => Err(CodegenError::type_mismatch(expr.id, "struct constructor without a struct")),
            },
            CallKind::Regular => self.compile_regular_call(ctx, expr, callee, arguments, options),
        }
    }

    fn compile_regular_call(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        callee: &Expression,
        arguments: &[Expression],
        options: &CallOptions,
    ) -> Result<Vec<Value>> {
        match &callee.kind {
            ExpressionKind::Identifier {
                declaration: Declaration::Builtin(builtin),
                ..
            } => self.compile_builtin_call(ctx, expr.id, *builtin, arguments),

            ExpressionKind::Identifier {
                declaration: Declaration::Function(function),
                ..
            } => {
                let target = self.resolve_virtual_function(*function, None, expr.id)?;
                self.internal_call(ctx, expr.id, target, arguments)
            }

            ExpressionKind::MemberAccess {
                expression: base,
                referenced: Some(Declaration::Function(function)),
                ..
            } => match &base.kind {
                ExpressionKind::Identifier {
                    declaration: Declaration::Magic(MagicVariable::Super),
                    ..
                } => {
                    let target =
                        self.resolve_virtual_function(*function, Some(ctx.scope_contract), expr.id)?;
                    self.internal_call(ctx, expr.id, target, arguments)
                }
                ExpressionKind::Identifier {
                    declaration: Declaration::Contract(contract),
                    ..
                } => self.static_call(ctx, expr.id, *contract, *function, arguments),
                _ => self.external_call(ctx, expr, base, *function, arguments, options),
            },

            ExpressionKind::MemberAccess {
                expression: base,
                member,
                referenced: None,
            } => match (member.as_str(), &base.ty) {
                ("push", array @ TypeName::Array { length: None, .. }) if array.is_in_storage() => {
                    expect_arguments(expr.id, arguments, 1)?;
                    self.push(ctx, expr.id, base, &arguments[0])
                }
                ("transfer" | "send", TypeName::Address | TypeName::Contract(_)) => {
                    expect_arguments(expr.id, arguments, 1)?;
                    self.transfer(ctx, base, &arguments[0], member == "transfer")
                }
                _ => Err(CodegenError::unsupported(
                    expr.id,
                    format!("call of member '{}'", member),
                )),
            },

            ExpressionKind::New(NewTarget::Contract(contract)) => {
                self.create(ctx, expr.id, *contract, arguments, options)
            }
            ExpressionKind::New(NewTarget::Array(ty)) => {
                expect_arguments(expr.id, arguments, 1)?;
                let ty = ty.clone();
                Ok(vec![self.new_memory_array(ctx, &ty, &arguments[0])?])
            }

            _ => Err(CodegenError::unsupported(expr.id, "call through a function value")),
        }
    }

    /// Evaluates call arguments left to right, converted to the parameter
    /// types of `function`.
    fn call_arguments(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        function: FunctionRef,
        arguments: &[Expression],
    ) -> Result<Vec<Value>> {
        let params = &self.unit.function(function).parameters;
        expect_arguments(node, arguments, params.len())?;
        let mut values = Vec::with_capacity(arguments.len());
        for (arg, param) in arguments.iter().zip(params) {
            let to = self.unit.variable(*param).ty.clone();
            let value = self.compile_single(ctx, arg)?;
            values.push(self.prepare_value(ctx, value, &arg.ty, &to, arg.id)?);
        }
        Ok(values)
    }

    fn internal_call(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        target: FunctionRef,
        arguments: &[Expression],
    ) -> Result<Vec<Value>> {
        let def = self.unit.function(target);
        let foreign_library = self.unit.contract(def.contract).kind == ContractKind::Library
            && def.contract != self.contract;
        // Internal calls skip the entry-point value check.
        let name = if foreign_library || self.rejects_value(target) {
            if self.queued.insert(target) {
                self.call_queue.push(target);
            }
            self.qualified_name(target)
        } else {
            self.function_name(target)
        };
        let values = self.call_arguments(ctx, node, target, arguments)?;
        trace!(callee = %name, "internal call");
        Ok(ctx.ins()?.call(&name, values, def.returns.len()))
    }

    /// `A.f(...)`: a base function called without virtual dispatch, or a
    /// library function.
    fn static_call(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        contract: ContractRef,
        function: FunctionRef,
        arguments: &[Expression],
    ) -> Result<Vec<Value>> {
        let def = self.unit.function(function);
        let is_library = self.unit.contract(contract).kind == ContractKind::Library;
        if !is_library && !self.linearization.contains(&contract) {
            return Err(CodegenError::unsupported(
                node,
                "static call into a contract that is not a base",
            ));
        }
        if !def.is_implemented() {
            return Err(CodegenError::UnresolvedFunction {
                node,
                name: self.function_signature(function),
            });
        }
        self.internal_call(ctx, node, function, arguments)
    }

    /// Branches to the status-revert block when `status` is non-zero.
    fn check_status(&mut self, ctx: &mut CompilationContext, status: Value, label: &str) -> Result<()> {
        let (block, register) = ctx.status_revert_block()?;
        ctx.ins()?.assign(register, status.clone());
        ctx.fail_if(status, block, label)
    }

    fn external_call(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        base: &Expression,
        function: FunctionRef,
        arguments: &[Expression],
        options: &CallOptions,
    ) -> Result<Vec<Value>> {
        let def = self.unit.function(function);
        let crosses_references = def
            .parameters
            .iter()
            .chain(&def.returns)
            .any(|v| self.unit.variable(*v).ty.is_reference());
        if crosses_references {
            return Err(CodegenError::unsupported(
                expr.id,
                "reference types across an external call",
            ));
        }

        let address = self.compile_single(ctx, base)?;
        let values = self.call_arguments(ctx, expr.id, function, arguments)?;
        let value = match &options.value {
            Some(v) => self.compile_single(ctx, v)?,
            None => Value::zero(),
        };
        let gas = match &options.gas {
            Some(g) => self.compile_single(ctx, g)?,
            None => ctx.ins()?.context(ContextVariable::GasLeft),
        };
        let signature = self.function_signature(function);
        let (status, results) = ctx.ins()?.call_external(
            address,
            &signature,
            values,
            value,
            gas,
            def.returns.len(),
        );
        self.check_status(ctx, status, "call.ok")?;
        Ok(results)
    }

    fn transfer(
        &mut self,
        ctx: &mut CompilationContext,
        base: &Expression,
        amount: &Expression,
        revert_on_failure: bool,
    ) -> Result<Vec<Value>> {
        let address = self.compile_single(ctx, base)?;
        let amount = self.compile_single(ctx, amount)?;
        let (status, _) = ctx.ins()?.call_external(
            address,
            DEPOSIT_FUNCTION,
            Vec::new(),
            amount,
            Value::int(TRANSFER_STIPEND),
            0,
        );
        if revert_on_failure {
            self.check_status(ctx, status, "transfer.ok")?;
            Ok(Vec::new())
        } else {
            Ok(vec![ctx.ins()?.iszero(status)])
        }
    }

    fn create(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        contract: ContractRef,
        arguments: &[Expression],
        options: &CallOptions,
    ) -> Result<Vec<Value>> {
        let name = self.unit.contract(contract).name.clone();
        let sibling = self
            .siblings
            .get(&contract)
            .ok_or_else(|| CodegenError::SiblingNotCompiled {
                node,
                name: name.clone(),
            })?;
        let init_arity = sibling
            .constructor()
            .map_or(0, |init| init.signature.params.len());
        expect_arguments(node, arguments, init_arity)?;

        let values = match self.constructor_of(contract) {
            Some(ctor) => self.call_arguments(ctx, node, ctor, arguments)?,
            None => Vec::new(),
        };
        let value = match &options.value {
            Some(v) => self.compile_single(ctx, v)?,
            None => Value::zero(),
        };
        let (status, address) = ctx.ins()?.create(&name, values, value);
        self.check_status(ctx, status, "create.ok")?;
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
        Ok(vec![address])
    }

    /// `arr.push(x)` on a storage array; evaluates to the new length.
    fn push(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        base: &Expression,
        element: &Expression,
    ) -> Result<Vec<Value>> {
        let TypeName::Array { base: elem, .. } = &base.ty else {
            return Err(CodegenError::type_mismatch(node, "push on a non-array"));
        };
        let root = self.compile_single(ctx, base)?;
        let value = self.compile_single(ctx, element)?;
        let len = ctx.ins()?.storage_load(root.clone());
        let new_len = ctx.ins()?.add(len.clone(), Value::one());
        ctx.ins()?.storage_store(root.clone(), new_len.clone());

        let size = self.storage_size(elem, node)?;
        let data = ctx.ins()?.array_data_slot(root);
        let scaled = scale(ctx, len, size)?;
        let slot = offset(ctx, data, scaled)?;
        self.store(ctx, &LValue::storage(slot, elem), value, &element.ty, node)?;
        Ok(vec![new_len])
    }

    fn new_memory_array(
        &mut self,
        ctx: &mut CompilationContext,
        ty: &TypeName,
        length: &Expression,
    ) -> Result<Value> {
        if !matches!(ty, TypeName::Array { length: None, .. }) {
            return Err(CodegenError::type_mismatch(length.id, "new of a non-dynamic array"));
        }
        let len = self.compile_single(ctx, length)?;
        let cells = offset(ctx, len.clone(), Value::one())?;
        let ptr = ctx.ins()?.allocate_memory(cells);
        ctx.ins()?.memory_store(ptr.clone(), len);
        Ok(ptr)
    }

    fn construct_struct(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        id: StructRef,
        arguments: &[Expression],
    ) -> Result<Value> {
        let members: Vec<TypeName> = self
            .unit
            .struct_def(id)
            .members
            .iter()
            .map(|m| m.ty.with_location(DataLocation::Memory))
            .collect();
        expect_arguments(node, arguments, members.len())?;
        let ptr = ctx
            .ins()?
            .allocate_memory(Value::int(members.len().max(1) as u64));
        for (i, (arg, member)) in arguments.iter().zip(&members).enumerate() {
            let value = self.compile_single(ctx, arg)?;
            let value = self.prepare_value(ctx, value, &arg.ty, member, arg.id)?;
            let address = offset(ctx, ptr.clone(), Value::int(i as u64))?;
            ctx.ins()?.memory_store(address, value);
        }
        Ok(ptr)
    }

    fn compile_builtin_call(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        builtin: BuiltinFunction,
        arguments: &[Expression],
    ) -> Result<Vec<Value>> {
        match builtin {
            BuiltinFunction::Require | BuiltinFunction::Assert => {
                if arguments.is_empty() || arguments.len() > 2 {
                    return Err(CodegenError::ArityMismatch {
                        node,
                        expected: 1,
                        found: arguments.len(),
                    });
                }
                let condition = self.compile_single(ctx, &arguments[0])?;
                // The reason carries no data in the IR, but its side effects run.
                if let Some(reason) = arguments.get(1) {
                    self.compile_expression(ctx, reason)?;
                }
                let failed = match condition.as_constant() {
                    Some(c) => Value::bool(c.is_zero()),
                    None => ctx.ins()?.iszero(condition),
                };
                let (failure, label) = if builtin == BuiltinFunction::Require {
                    (ctx.revert_block()?, "require.ok")
                } else {
                    (ctx.assert_fail_block()?, "assert.ok")
                };
                ctx.fail_if(failed, failure, label)?;
                Ok(Vec::new())
            }
            BuiltinFunction::Revert => {
                let failure = ctx.revert_block()?;
                ctx.jump_and_detach(failure)?;
                Ok(Vec::new())
            }
            BuiltinFunction::GasLeft => {
                expect_arguments(node, arguments, 0)?;
                Ok(vec![ctx.ins()?.context(ContextVariable::GasLeft)])
            }
            BuiltinFunction::SelfDestruct => {
                expect_arguments(node, arguments, 1)?;
                let beneficiary = self.compile_single(ctx, &arguments[0])?;
                ctx.ins()?.builtin(IrBuiltin::SelfDestruct, vec![beneficiary]);
                let values = ctx.return_values();
                ctx.builder.return_values(values)?;
                ctx.start_block("unreachable")?;
                Ok(Vec::new())
            }
            BuiltinFunction::Keccak256
            | BuiltinFunction::AddMod
            | BuiltinFunction::MulMod
            | BuiltinFunction::BlockHash => {
                let (ir, arity) = match builtin {
                    BuiltinFunction::Keccak256 => (IrBuiltin::Keccak256, None),
                    BuiltinFunction::AddMod => (IrBuiltin::AddMod, Some(3)),
                    BuiltinFunction::MulMod => (IrBuiltin::MulMod, Some(3)),
                    _ => (IrBuiltin::BlockHash, Some(1)),
                };
                if let Some(arity) = arity {
                    expect_arguments(node, arguments, arity)?;
                }
                let mut values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    values.push(self.compile_single(ctx, arg)?);
                }
                let result = ctx
                    .ins()?
                    .builtin(ir, values)
                    .ok_or_else(|| CodegenError::type_mismatch(node, "builtin has no result"))?;
                Ok(vec![result])
            }
        }
    }
}
