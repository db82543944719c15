use super::context::CompilationContext;
use super::ContractCompiler;
use crate::ast::{BinaryOperator, NodeId, TypeName};
use crate::errors::{CodegenError, Result};
use contrail_core::interp::{sign_extend, truncate};
use contrail_core::{BinaryOp, Constant, InstBuilder, Value};

/// Width and signedness a value of `ty` is normalized to.
fn width(ty: &TypeName) -> Option<(u16, bool)> {
    match ty {
        TypeName::Uint(bits) => Some((*bits, false)),
        TypeName::Int(bits) => Some((*bits, true)),
        TypeName::Address | TypeName::Contract(_) => Some((160, false)),
        TypeName::FixedBytes(n) => Some((u16::from(*n) * 8, false)),
        _ => None,
    }
}

/// Whether every value of `from` is already a valid value of `to`.
pub(crate) fn fits(from: &TypeName, to: &TypeName) -> bool {
    if from == to || matches!(from, TypeName::Bool) {
        return true;
    }
    // Left aligned: any resize moves the bytes.
    if let (TypeName::FixedBytes(m), TypeName::FixedBytes(n)) = (from, to) {
        return m == n;
    }
    match (width(from), width(to)) {
        (Some((m, false)), Some((n, false))) => m <= n,
        (Some((m, false)), Some((n, true))) => m < n,
        (Some((m, true)), Some((n, true))) => m <= n,
        _ => false,
    }
}

fn ir_op(op: BinaryOperator) -> Option<BinaryOp> {
    Some(match op {
        BinaryOperator::Add => BinaryOp::Add,
        BinaryOperator::Sub => BinaryOp::Sub,
        BinaryOperator::Mul => BinaryOp::Mul,
        BinaryOperator::Div => BinaryOp::Div,
        BinaryOperator::Mod => BinaryOp::Mod,
        BinaryOperator::Exp => BinaryOp::Exp,
        BinaryOperator::BitAnd => BinaryOp::And,
        BinaryOperator::BitOr => BinaryOp::Or,
        BinaryOperator::BitXor => BinaryOp::Xor,
        BinaryOperator::Shl => BinaryOp::Shl,
        BinaryOperator::Shr => BinaryOp::Shr,
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::Ne => BinaryOp::Ne,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::Le => BinaryOp::Le,
        BinaryOperator::Ge => BinaryOp::Ge,
        BinaryOperator::And | BinaryOperator::Or => return None,
    })
}

/// Operators whose right operand keeps its own type: shift amounts and
/// exponents are not reduced to the width of the left operand.
pub(crate) fn keeps_right_type(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Shl | BinaryOperator::Shr | BinaryOperator::Exp
    )
}

/// Operators whose result can leave the operand range.
fn may_overflow(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Exp
            | BinaryOperator::Shl
    )
}

impl ContractCompiler<'_> {
    /// Brings `value` back into the range of `ty`: truncation for
    /// unsigned types, sign extension for signed ones. Constants fold.
    pub(crate) fn mask(
        &self,
        ctx: &mut CompilationContext,
        value: Value,
        ty: &TypeName,
    ) -> Result<Value> {
        let Some((bits, signed)) = width(ty) else {
            return Ok(value);
        };
        if let Some(Constant::Int(c)) = value.as_constant() {
            let folded = if signed {
                sign_extend(c, bits)
            } else {
                truncate(c, bits)
            };
            return Ok(Value::int(folded));
        }
        Ok(if signed {
            ctx.ins()?.sign_extend(value, bits)
        } else {
            ctx.ins()?.truncate(value, bits)
        })
    }

    /// Implicit or explicit conversion between value types.
    ///
    /// Widening is free. Narrowing, and any change of signedness that can
    /// change the value, masks to the target. Fixed-size byte arrays are
    /// left aligned, so resizing them shifts.
    pub(crate) fn convert(
        &self,
        ctx: &mut CompilationContext,
        value: Value,
        from: &TypeName,
        to: &TypeName,
    ) -> Result<Value> {
        if !to.is_value_type() || fits(from, to) {
            return Ok(value);
        }
        if let (TypeName::FixedBytes(m), TypeName::FixedBytes(n)) = (from, to) {
            let shift = Value::int((i64::from(*m) - i64::from(*n)).abs() * 8);
            return Ok(if n < m {
                ctx.ins()?.binary(BinaryOp::Shr, value, shift)
            } else {
                ctx.ins()?.binary(BinaryOp::Shl, value, shift)
            });
        }
        if matches!(to, TypeName::Bool) {
            return Ok(value);
        }
        self.mask(ctx, value, to)
    }

    /// Lowers a non-short-circuit binary operator on already evaluated
    /// operands of type `operand_ty`.
    pub(crate) fn binary_operation(
        &self,
        ctx: &mut CompilationContext,
        op: BinaryOperator,
        left: Value,
        right: Value,
        operand_ty: &TypeName,
        node: NodeId,
    ) -> Result<Value> {
        let ir = ir_op(op).ok_or_else(|| {
            CodegenError::type_mismatch(node, "logical operator lowered without short-circuit")
        })?;

        if matches!(op, BinaryOperator::Div | BinaryOperator::Mod) && self.config.division_checks {
            let divisor_is_zero = match right.as_constant() {
                Some(c) => Value::bool(c.is_zero()),
                None => ctx.ins()?.iszero(right.clone()),
            };
            let fail = ctx.assert_fail_block()?;
            ctx.fail_if(divisor_is_zero, fail, "div.ok")?;
        }

        let result = ctx.ins()?.binary(ir, left, right);
        if may_overflow(op) {
            self.mask(ctx, result, operand_ty)
        } else {
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_is_free() {
        assert!(fits(&TypeName::Uint(8), &TypeName::Uint(256)));
        assert!(fits(&TypeName::Uint(8), &TypeName::Int(16)));
        assert!(fits(&TypeName::Int(8), &TypeName::Int(64)));
        assert!(fits(&TypeName::Uint(160), &TypeName::Address));
    }

    #[test]
    fn test_narrowing_and_sign_changes_mask() {
        assert!(!fits(&TypeName::Uint(256), &TypeName::Uint(8)));
        assert!(!fits(&TypeName::Uint(8), &TypeName::Int(8)));
        assert!(!fits(&TypeName::Int(8), &TypeName::Uint(256)));
        assert!(!fits(&TypeName::Uint(256), &TypeName::Address));
    }

    #[test]
    fn test_bytes_resizing_is_never_free() {
        assert!(!fits(&TypeName::FixedBytes(1), &TypeName::FixedBytes(2)));
        assert!(!fits(&TypeName::FixedBytes(4), &TypeName::FixedBytes(2)));
        assert!(fits(&TypeName::FixedBytes(32), &TypeName::FixedBytes(32)));
    }

    #[test]
    fn test_overflowing_operators() {
        assert!(may_overflow(BinaryOperator::Add));
        assert!(may_overflow(BinaryOperator::Shl));
        assert!(!may_overflow(BinaryOperator::BitAnd));
        assert!(!may_overflow(BinaryOperator::Lt));
        assert_eq!(ir_op(BinaryOperator::And), None);
        assert!(keeps_right_type(BinaryOperator::Exp));
        assert!(!keeps_right_type(BinaryOperator::Add));
    }
}
