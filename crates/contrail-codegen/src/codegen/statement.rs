use super::context::CompilationContext;
use super::expression::align_components;
use super::lvalue::LValue;
use super::ContractCompiler;
use crate::ast::{Block, Expression, NodeId, Statement, StatementKind, VariableRef};
use crate::errors::{CodegenError, Result};

impl ContractCompiler<'_> {
    pub(crate) fn compile_block(&mut self, ctx: &mut CompilationContext, block: &Block) -> Result<()> {
        for statement in &block.statements {
            self.compile_statement(ctx, statement)?;
        }
        Ok(())
    }

    pub(crate) fn compile_statement(
        &mut self,
        ctx: &mut CompilationContext,
        statement: &Statement,
    ) -> Result<()> {
        let node = statement.id;
        match &statement.kind {
            StatementKind::Block(block) => self.compile_block(ctx, block),

            StatementKind::VariableDeclaration {
                declarations,
                initial_value,
            } => self.compile_declaration(ctx, node, declarations, initial_value.as_ref()),

            StatementKind::Expression(expr) => {
                self.compile_expression(ctx, expr)?;
                Ok(())
            }

            StatementKind::If {
                condition,
                true_body,
                false_body,
            } => {
                let cond = self.compile_single(ctx, condition)?;
                let then_block = ctx.builder.create_block("if.then");
                let join = ctx.builder.create_block("if.end");
                let else_block = match false_body {
                    Some(_) => ctx.builder.create_block("if.else"),
                    None => join,
                };
                ctx.builder.branch(cond, then_block, else_block)?;

                ctx.switch_to(then_block)?;
                self.compile_statement(ctx, true_body)?;
                ctx.jump_if_open(join)?;

                if let Some(false_body) = false_body {
                    ctx.switch_to(else_block)?;
                    self.compile_statement(ctx, false_body)?;
                    ctx.jump_if_open(join)?;
                }
                ctx.switch_to(join)
            }

            StatementKind::While {
                condition,
                body,
                is_do_while,
            } => {
                let header = ctx.builder.create_block("loop.cond");
                let body_block = ctx.builder.create_block("loop.body");
                let exit = ctx.builder.create_block("loop.end");
                ctx.builder.jump(if *is_do_while { body_block } else { header })?;

                ctx.switch_to(header)?;
                let cond = self.compile_single(ctx, condition)?;
                ctx.builder.branch(cond, body_block, exit)?;

                ctx.switch_to(body_block)?;
                ctx.push_loop(exit, header);
                self.compile_statement(ctx, body)?;
                ctx.pop_loop();
                ctx.jump_if_open(header)?;

                ctx.switch_to(exit)
            }

            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.compile_statement(ctx, init)?;
                }
                let header = ctx.builder.create_block("for.cond");
                let body_block = ctx.builder.create_block("for.body");
                let step = ctx.builder.create_block("for.step");
                let exit = ctx.builder.create_block("for.end");
                ctx.builder.jump(header)?;

                ctx.switch_to(header)?;
                match condition {
                    Some(condition) => {
                        let cond = self.compile_single(ctx, condition)?;
                        ctx.builder.branch(cond, body_block, exit)?;
                    }
                    None => ctx.builder.jump(body_block)?,
                }

                ctx.switch_to(body_block)?;
                ctx.push_loop(exit, step);
                self.compile_statement(ctx, body)?;
                ctx.pop_loop();
                ctx.jump_if_open(step)?;

                ctx.switch_to(step)?;
                if let Some(update) = update {
                    self.compile_expression(ctx, update)?;
                }
                ctx.jump_if_open(header)?;

                ctx.switch_to(exit)
            }

            StatementKind::Break => {
                let target = ctx
                    .current_loop()
                    .ok_or(CodegenError::BreakOutsideLoop { node })?;
                ctx.jump_and_detach(target.break_block)
            }

            StatementKind::Continue => {
                let target = ctx
                    .current_loop()
                    .ok_or(CodegenError::ContinueOutsideLoop { node })?;
                ctx.jump_and_detach(target.continue_block)
            }

            StatementKind::Return(value) => self.compile_return(ctx, node, value.as_ref()),

            StatementKind::Throw => {
                let failure = ctx.revert_block()?;
                ctx.jump_and_detach(failure)
            }

            StatementKind::Placeholder => {
                let depth = ctx
                    .modifier_depth
                    .ok_or(CodegenError::PlaceholderOutsideModifier { node })?;
                self.expand_modifier(ctx, depth + 1)
            }

            StatementKind::InlineAssembly => Err(CodegenError::unsupported(node, "inline assembly")),
        }
    }

    fn declare_local(&mut self, ctx: &mut CompilationContext, var: VariableRef) -> LValue {
        let decl = self.unit.variable(var);
        let local = ctx.fresh_local(&decl.name);
        ctx.renames.declare(var, local.clone());
        LValue::Register {
            local,
            ty: decl.ty.clone(),
        }
    }

    fn compile_declaration(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        declarations: &[Option<VariableRef>],
        initial_value: Option<&Expression>,
    ) -> Result<()> {
        let Some(init) = initial_value else {
            for var in declarations.iter().flatten() {
                let ty = self.unit.variable(*var).ty.clone();
                let zero = self.default_value(ctx, &ty, node)?;
                let lvalue = self.declare_local(ctx, *var);
                self.store(ctx, &lvalue, zero, &ty, node)?;
            }
            return Ok(());
        };

        // The initializer sees the enclosing scope, not the new names.
        let values = self.compile_expression(ctx, init)?;
        let types = init.ty.components();
        let present: Vec<bool> = declarations.iter().map(Option::is_some).collect();
        let pairing = align_components(&present, values.len(), node)?;
        for (var, source) in declarations.iter().zip(pairing) {
            if let (Some(var), Some(source)) = (var, source) {
                let lvalue = self.declare_local(ctx, *var);
                let from = types
                    .get(source)
                    .cloned()
                    .unwrap_or_else(|| lvalue.ty().clone());
                self.store(ctx, &lvalue, values[source].clone(), &from, node)?;
            }
        }
        Ok(())
    }

    /// Assigns the return variables and leaves the current body: the
    /// function itself at depth zero, otherwise the innermost modifier
    /// layer.
    fn compile_return(
        &mut self,
        ctx: &mut CompilationContext,
        node: NodeId,
        value: Option<&Expression>,
    ) -> Result<()> {
        if let Some(expr) = value {
            let values = self.compile_expression(ctx, expr)?;
            if values.len() != ctx.return_vars.len() {
                return Err(CodegenError::ArityMismatch {
                    node,
                    expected: ctx.return_vars.len(),
                    found: values.len(),
                });
            }
            let types = expr.ty.components();
            let targets = ctx.return_vars.clone();
            for (i, ((local, ty), value)) in targets.into_iter().zip(values).enumerate() {
                let from = types.get(i).cloned().unwrap_or_else(|| ty.clone());
                self.store(ctx, &LValue::Register { local, ty }, value, &from, node)?;
            }
        }
        let target = ctx
            .return_target()
            .ok_or_else(|| CodegenError::type_mismatch(node, "return outside of a function body"))?;
        ctx.jump_and_detach(target)
    }
}
