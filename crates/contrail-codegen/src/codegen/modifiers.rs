use super::context::{CompilationContext, ModifierChain};
use super::lvalue::LValue;
use super::ContractCompiler;
use crate::ast::FunctionRef;
use crate::errors::{CodegenError, Result};
use tracing::trace;

impl<'a> ContractCompiler<'a> {
    /// Lowers the body of `function` with its modifiers expanded inline.
    pub(crate) fn compile_function_body(
        &mut self,
        ctx: &mut CompilationContext<'a>,
        function: FunctionRef,
    ) -> Result<()> {
        let unit = self.unit;
        let def = unit.function(function);
        let body = def.body.as_ref().ok_or_else(|| CodegenError::UnresolvedFunction {
            node: def.id,
            name: def.name.clone(),
        })?;
        let saved = ctx.chain.replace(ModifierChain {
            function,
            owner: def.contract,
            modifiers: &def.modifiers,
            body,
        });
        let saved_depth = ctx.modifier_depth.take();
        let result = self.expand_modifier(ctx, 0);
        ctx.chain = saved;
        ctx.modifier_depth = saved_depth;
        result
    }

    /// Expands modifier `depth` of the current chain, or the function body
    /// once every modifier has been entered.
    ///
    /// Every expansion gets its own rename layer and its own exit block, so
    /// a `return` leaves only the innermost body and the code after `_` in
    /// the enclosing modifier still runs. Each placeholder re-expands the
    /// rest of the chain with fresh local names.
    pub(crate) fn expand_modifier(
        &mut self,
        ctx: &mut CompilationContext<'_>,
        depth: usize,
    ) -> Result<()> {
        let unit = self.unit;
        let Some(chain) = ctx.chain else {
            return Err(CodegenError::type_mismatch(
                self.unit.contract(self.contract).id,
                "modifier expansion outside of a function",
            ));
        };
        let exit = ctx.builder.create_block(if depth == chain.modifiers.len() {
            "body.exit"
        } else {
            "modifier.exit"
        });
        let saved_scope = ctx.scope_contract;
        let saved_depth = ctx.modifier_depth;

        if depth == chain.modifiers.len() {
            trace!(function = %self.unit.function(chain.function).name, "expanding body");
            ctx.renames.push_layer();
            ctx.push_return_target(exit);
            ctx.scope_contract = chain.owner;
            ctx.modifier_depth = None;
            let loops = ctx.take_loops();
            let result = self.compile_block(ctx, chain.body);
            ctx.restore_loops(loops);
            result?;
        } else {
            let invocation = &chain.modifiers[depth];
            let modifier = self.resolve_modifier(&invocation.name, invocation.id)?;
            let def = unit.modifier(modifier);
            if def.parameters.len() != invocation.arguments.len() {
                return Err(CodegenError::ArityMismatch {
                    node: invocation.id,
                    expected: def.parameters.len(),
                    found: invocation.arguments.len(),
                });
            }
            trace!(modifier = %def.name, depth, "expanding modifier");

            // Arguments see the enclosing scope.
            let mut arguments = Vec::with_capacity(invocation.arguments.len());
            for arg in &invocation.arguments {
                arguments.push((self.compile_single(ctx, arg)?, arg.ty.clone()));
            }

            ctx.renames.push_layer();
            for (param, (value, from)) in def.parameters.iter().zip(arguments) {
                let decl = unit.variable(*param);
                let local = ctx.fresh_local(&decl.name);
                ctx.renames.declare(*param, local.clone());
                let target = LValue::Register {
                    local,
                    ty: decl.ty.clone(),
                };
                self.store(ctx, &target, value, &from, invocation.id)?;
            }

            ctx.push_return_target(exit);
            ctx.scope_contract = def.contract;
            ctx.modifier_depth = Some(depth);
            let loops = ctx.take_loops();
            let result = self.compile_block(ctx, &def.body);
            ctx.restore_loops(loops);
            result?;
        }

        ctx.jump_if_open(exit)?;
        ctx.switch_to(exit)?;
        ctx.pop_return_target();
        ctx.renames.pop_layer();
        ctx.scope_contract = saved_scope;
        ctx.modifier_depth = saved_depth;
        Ok(())
    }
}
