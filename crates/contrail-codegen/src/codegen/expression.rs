use super::context::CompilationContext;
use super::lvalue::LValue;
use super::operators::{fits, keeps_right_type};
use super::ContractCompiler;
use crate::ast::{
    BinaryOperator, Declaration, Expression, ExpressionKind, Literal, MagicVariable, NodeId,
    TypeName, UnaryOperator,
};
use crate::errors::{CodegenError, Result};
use contrail_core::{BuiltinFunction, ContextVariable, InstBuilder, InstBuilderExt, Value};

/// Pairs left-hand components with right-hand values.
///
/// Equal counts pair up positionally. With fewer components on the left,
/// a trailing empty component aligns them with the start of the right
/// side and a leading empty component with its end. Returns, per left
/// component, the index of the value it receives.
pub(crate) fn align_components(
    present: &[bool],
    available: usize,
    node: NodeId,
) -> Result<Vec<Option<usize>>> {
    let wanted = present.len();
    let mismatch = CodegenError::ArityMismatch {
        node,
        expected: wanted,
        found: available,
    };
    let shift = if wanted == available {
        0
    } else if wanted < available && present.last() == Some(&false) {
        0
    } else if wanted < available && present.first() == Some(&false) {
        available - wanted
    } else {
        return Err(mismatch);
    };
    Ok(present
        .iter()
        .enumerate()
        .map(|(i, keep)| keep.then_some(i + shift))
        .collect())
}

fn magic_member(magic: MagicVariable, member: &str) -> Option<ContextVariable> {
    Some(match (magic, member) {
        (MagicVariable::Msg, "sender") => ContextVariable::MsgSender,
        (MagicVariable::Msg, "value") => ContextVariable::MsgValue,
        (MagicVariable::Msg, "gas") => ContextVariable::GasLeft,
        (MagicVariable::Tx, "origin") => ContextVariable::TxOrigin,
        (MagicVariable::Tx, "gasprice") => ContextVariable::TxGasPrice,
        (MagicVariable::Block, "number") => ContextVariable::BlockNumber,
        (MagicVariable::Block, "timestamp") => ContextVariable::BlockTimestamp,
        (MagicVariable::Block, "coinbase") => ContextVariable::BlockCoinbase,
        (MagicVariable::Block, "difficulty") => ContextVariable::BlockDifficulty,
        (MagicVariable::Block, "gaslimit") => ContextVariable::BlockGasLimit,
        _ => return None,
    })
}

impl ContractCompiler<'_> {
    /// Evaluates `expr` to as many values as its type has components.
    pub(crate) fn compile_expression(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
    ) -> Result<Vec<Value>> {
        match &expr.kind {
            ExpressionKind::Literal(Literal::Bool(b)) => Ok(vec![Value::bool(*b)]),
            ExpressionKind::Literal(Literal::Number(n)) => Ok(vec![Value::int(n.clone())]),

            ExpressionKind::Identifier { declaration, .. } => {
                self.compile_identifier(ctx, expr, *declaration)
            }

            ExpressionKind::Unary {
                op,
                prefix,
                operand,
            } => self.compile_unary(ctx, expr, *op, *prefix, operand),

            ExpressionKind::Binary { op, left, right } if op.is_short_circuit() => {
                Ok(vec![self.compile_short_circuit(ctx, *op, left, right)?])
            }
            ExpressionKind::Binary { op, left, right } => {
                let operand_ty = if op.is_comparison() {
                    if fits(&left.ty, &right.ty) {
                        right.ty.clone()
                    } else {
                        left.ty.clone()
                    }
                } else {
                    expr.ty.clone()
                };
                let l = self.compile_single(ctx, left)?;
                let l = self.convert(ctx, l, &left.ty, &operand_ty)?;
                let r = self.compile_single(ctx, right)?;
                let r = if keeps_right_type(*op) {
                    r
                } else {
                    self.convert(ctx, r, &right.ty, &operand_ty)?
                };
                Ok(vec![self.binary_operation(ctx, *op, l, r, &operand_ty, expr.id)?])
            }

            ExpressionKind::Assignment { op, left, right } => {
                self.compile_assignment(ctx, expr, *op, left, right)
            }

            ExpressionKind::Conditional {
                condition,
                true_expr,
                false_expr,
            } => Ok(vec![self.compile_conditional(
                ctx, expr, condition, true_expr, false_expr,
            )?]),

            ExpressionKind::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let item = item.as_ref().ok_or_else(|| {
                        CodegenError::unsupported(expr.id, "empty tuple component outside a destructuring")
                    })?;
                    values.push(self.compile_single(ctx, item)?);
                }
                Ok(values)
            }

            ExpressionKind::FunctionCall { .. } => self.compile_function_call(ctx, expr),

            ExpressionKind::MemberAccess {
                expression,
                member,
                referenced,
            } => self.compile_member_access(ctx, expr, expression, member, *referenced),

            ExpressionKind::IndexAccess { .. } => {
                let lvalue = self.compile_lvalue(ctx, expr)?;
                Ok(vec![self.load(ctx, &lvalue)?])
            }

            ExpressionKind::New(_) | ExpressionKind::TypeExpression => Err(
                CodegenError::unsupported(expr.id, "type or creation expression used as a value"),
            ),
        }
    }

    /// Evaluates an expression that must produce exactly one value.
    pub(crate) fn compile_single(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
    ) -> Result<Value> {
        let mut values = self.compile_expression(ctx, expr)?;
        if values.len() != 1 {
            return Err(CodegenError::ArityMismatch {
                node: expr.id,
                expected: 1,
                found: values.len(),
            });
        }
        Ok(values.remove(0))
    }

    fn compile_identifier(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        declaration: Declaration,
    ) -> Result<Vec<Value>> {
        match declaration {
            Declaration::Variable(var) => {
                let decl = self.unit.variable(var);
                if decl.is_constant {
                    let init = decl.value.as_ref().ok_or_else(|| {
                        CodegenError::type_mismatch(expr.id, "constant without a value")
                    })?;
                    let value = self.compile_single(ctx, init)?;
                    return Ok(vec![self.convert(ctx, value, &init.ty, &decl.ty)?]);
                }
                let lvalue = self.compile_lvalue(ctx, expr)?;
                Ok(vec![self.load(ctx, &lvalue)?])
            }
            Declaration::Magic(MagicVariable::This) => {
                Ok(vec![ctx.ins()?.context(ContextVariable::ThisAddress)])
            }
            Declaration::Magic(MagicVariable::Now) => {
                Ok(vec![ctx.ins()?.context(ContextVariable::BlockTimestamp)])
            }
            _ => Err(CodegenError::unsupported(
                expr.id,
                "functions, contracts and magic objects as values",
            )),
        }
    }

    fn compile_member_access(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        base: &Expression,
        member: &str,
        referenced: Option<Declaration>,
    ) -> Result<Vec<Value>> {
        if let ExpressionKind::Identifier {
            declaration: Declaration::Magic(magic),
            ..
        } = &base.kind
        {
            if let Some(var) = magic_member(*magic, member) {
                return Ok(vec![ctx.ins()?.context(var)]);
            }
        }

        // `A.x` for a constant or state variable declared in a base.
        if let Some(Declaration::Variable(var)) = referenced {
            let name = self.unit.variable(var).name.clone();
            let mut access = expr.clone();
            access.kind = ExpressionKind::Identifier {
                name,
                declaration: Declaration::Variable(var),
            };
            return self.compile_expression(ctx, &access);
        }

        match (&base.ty, member) {
            (TypeName::Address | TypeName::Contract(_), "balance") => {
                let address = self.compile_single(ctx, base)?;
                let balance = ctx
                    .ins()?
                    .builtin(BuiltinFunction::Balance, vec![address])
                    .ok_or_else(|| CodegenError::type_mismatch(expr.id, "balance has no result"))?;
                Ok(vec![balance])
            }
            (
                TypeName::Array {
                    length: Some(len), ..
                },
                "length",
            ) => Ok(vec![Value::int(*len)]),
            (array @ TypeName::Array { .. }, "length") => {
                let root = self.compile_single(ctx, base)?;
                let len = if array.is_in_storage() {
                    ctx.ins()?.storage_load(root)
                } else {
                    ctx.ins()?.memory_load(root)
                };
                Ok(vec![len])
            }
            (TypeName::Struct { .. }, _) => {
                let lvalue = self.compile_lvalue(ctx, expr)?;
                Ok(vec![self.load(ctx, &lvalue)?])
            }
            _ => Err(CodegenError::unsupported(
                expr.id,
                format!("member '{}' used as a value", member),
            )),
        }
    }

    fn compile_unary(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        op: UnaryOperator,
        prefix: bool,
        operand: &Expression,
    ) -> Result<Vec<Value>> {
        match op {
            UnaryOperator::Not => {
                let v = self.compile_single(ctx, operand)?;
                Ok(vec![ctx.ins()?.iszero(v)])
            }
            UnaryOperator::BitNot => {
                let v = self.compile_single(ctx, operand)?;
                let inverted = ctx.ins()?.not(v);
                Ok(vec![self.mask(ctx, inverted, &expr.ty)?])
            }
            UnaryOperator::Neg => {
                let v = self.compile_single(ctx, operand)?;
                let negated = match v.as_constant() {
                    Some(c) => Value::int(-c.as_bigint()),
                    None => ctx.ins()?.sub(Value::zero(), v),
                };
                Ok(vec![self.mask(ctx, negated, &expr.ty)?])
            }
            UnaryOperator::Inc | UnaryOperator::Dec => {
                let lvalue = self.compile_lvalue(ctx, operand)?;
                let op = if op == UnaryOperator::Inc {
                    BinaryOperator::Add
                } else {
                    BinaryOperator::Sub
                };
                let ty = lvalue.ty().clone();
                let (old, new) = self.update(ctx, &lvalue, op, Value::one(), &ty, expr.id)?;
                Ok(vec![if prefix { new } else { old }])
            }
            UnaryOperator::Delete => {
                let lvalue = self.compile_lvalue(ctx, operand)?;
                self.delete(ctx, &lvalue, expr.id)?;
                Ok(Vec::new())
            }
        }
    }

    /// `a && b` and `a || b`: the right operand only runs when the left
    /// one does not decide the result.
    fn compile_short_circuit(
        &mut self,
        ctx: &mut CompilationContext,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> Result<Value> {
        let is_and = op == BinaryOperator::And;
        let result = ctx.fresh_local(if is_and { "and" } else { "or" });
        let l = self.compile_single(ctx, left)?;
        ctx.ins()?.assign(result.clone(), l.clone());

        let rhs = ctx.builder.create_block(if is_and { "and.rhs" } else { "or.rhs" });
        let join = ctx.builder.create_block(if is_and { "and.end" } else { "or.end" });
        if is_and {
            ctx.builder.branch(l, rhs, join)?;
        } else {
            ctx.builder.branch(l, join, rhs)?;
        }

        ctx.switch_to(rhs)?;
        let r = self.compile_single(ctx, right)?;
        ctx.ins()?.assign(result.clone(), r);
        ctx.jump_if_open(join)?;

        ctx.switch_to(join)?;
        Ok(result)
    }

    fn compile_conditional(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        condition: &Expression,
        true_expr: &Expression,
        false_expr: &Expression,
    ) -> Result<Value> {
        if expr.ty.arity() != 1 {
            return Err(CodegenError::unsupported(expr.id, "conditional producing a tuple"));
        }
        let cond = self.compile_single(ctx, condition)?;
        let result = ctx.fresh_local("cond");
        let then_block = ctx.builder.create_block("cond.true");
        let else_block = ctx.builder.create_block("cond.false");
        let join = ctx.builder.create_block("cond.end");
        ctx.builder.branch(cond, then_block, else_block)?;

        for (block, arm) in [(then_block, true_expr), (else_block, false_expr)] {
            ctx.switch_to(block)?;
            let v = self.compile_single(ctx, arm)?;
            let v = self.prepare_value(ctx, v, &arm.ty, &expr.ty, expr.id)?;
            ctx.ins()?.assign(result.clone(), v);
            ctx.jump_if_open(join)?;
        }

        ctx.switch_to(join)?;
        Ok(result)
    }

    fn compile_assignment(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        op: Option<BinaryOperator>,
        left: &Expression,
        right: &Expression,
    ) -> Result<Vec<Value>> {
        if let Some(op) = op {
            let rhs = self.compile_single(ctx, right)?;
            let lvalue = self.compile_lvalue(ctx, left)?;
            let (_, new) = self.update(ctx, &lvalue, op, rhs, &right.ty, expr.id)?;
            return Ok(vec![new]);
        }

        if let ExpressionKind::Tuple(items) = &left.kind {
            if items.len() != 1 {
                return self.compile_tuple_assignment(ctx, expr, items, right);
            }
        }

        let value = self.compile_single(ctx, right)?;
        let lvalue = self.compile_lvalue(ctx, left)?;
        if lvalue.ty().is_value_type() {
            let ty = lvalue.ty().clone();
            let converted = self.convert(ctx, value, &right.ty, &ty)?;
            self.store(ctx, &lvalue, converted.clone(), &ty, expr.id)?;
            Ok(vec![converted])
        } else {
            self.store(ctx, &lvalue, value, &right.ty, expr.id)?;
            Ok(vec![self.load(ctx, &lvalue)?])
        }
    }

    /// `(a, , b) = rhs`: the right side is evaluated completely before
    /// anything is stored, so swaps work.
    fn compile_tuple_assignment(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
        items: &[Option<Expression>],
        right: &Expression,
    ) -> Result<Vec<Value>> {
        let values = self.compile_expression(ctx, right)?;
        let types = right.ty.components();
        let present: Vec<bool> = items.iter().map(Option::is_some).collect();
        let pairing = align_components(&present, values.len(), expr.id)?;

        let mut targets: Vec<(LValue, usize)> = Vec::new();
        for (item, source) in items.iter().zip(pairing) {
            if let (Some(item), Some(source)) = (item, source) {
                targets.push((self.compile_lvalue(ctx, item)?, source));
            }
        }
        for (lvalue, source) in &targets {
            let from = types.get(*source).cloned().unwrap_or_else(|| lvalue.ty().clone());
            self.store(ctx, lvalue, values[*source].clone(), &from, expr.id)?;
        }
        Ok(Vec::new())
    }
}
