use super::context::CompilationContext;
use super::operators::keeps_right_type;
use super::ContractCompiler;
use crate::ast::{BinaryOperator, DataLocation, Declaration, Expression, ExpressionKind, NodeId, TypeName};
use crate::errors::{CodegenError, Result};
use contrail_core::{Constant, InstBuilder, InstBuilderExt, Value};

/// An assignable location.
#[derive(Debug, Clone)]
pub(crate) enum LValue {
    /// A local variable, including memory and storage pointers.
    Register { local: Value, ty: TypeName },
    /// A memory cell, e.g. a field of a memory struct.
    Memory { address: Value, ty: TypeName },
    /// A storage object rooted at `slot`.
    Storage { slot: Value, ty: TypeName },
}

impl LValue {
    pub(crate) fn storage(slot: Value, ty: &TypeName) -> Self {
        LValue::Storage {
            slot,
            ty: ty.with_location(DataLocation::Storage),
        }
    }

    pub fn ty(&self) -> &TypeName {
        match self {
            LValue::Register { ty, .. } | LValue::Memory { ty, .. } | LValue::Storage { ty, .. } => ty,
        }
    }
}

/// Assigning `from` into the storage object typed `to` copies storage to
/// storage. Assigning to a storage pointer only aliases.
pub fn should_copy_storage_to_storage(to: &TypeName, from: &TypeName) -> bool {
    to.is_reference() && to.location() == Some(DataLocation::Storage) && from.is_in_storage()
}

pub fn should_copy_memory_to_storage(to: &TypeName, from: &TypeName) -> bool {
    to.is_reference() && to.location() == Some(DataLocation::Storage) && from.is_in_memory()
}

/// Storage values flowing into a memory-typed target are deep-copied.
/// Memory to memory assignments alias.
pub fn should_copy_storage_to_memory(to: &TypeName, from: &TypeName) -> bool {
    to.is_reference() && to.is_in_memory() && from.is_in_storage()
}

fn constant_int(value: &Value) -> Option<num_bigint::BigInt> {
    match value.as_constant() {
        Some(Constant::Int(v)) => Some(v.clone()),
        _ => None,
    }
}

/// `a + b`, folded when both are constants.
pub(crate) fn offset(ctx: &mut CompilationContext, base: Value, by: Value) -> Result<Value> {
    if constant_int(&by).map_or(false, |v| v == 0.into()) {
        return Ok(base);
    }
    if let (Some(a), Some(b)) = (constant_int(&base), constant_int(&by)) {
        return Ok(Value::int(a + b));
    }
    Ok(ctx.ins()?.add(base, by))
}

/// `a * size`, folded for constants and unit sizes.
pub(crate) fn scale(ctx: &mut CompilationContext, index: Value, size: u64) -> Result<Value> {
    if size == 1 {
        return Ok(index);
    }
    if let Some(i) = constant_int(&index) {
        return Ok(Value::int(i * size));
    }
    Ok(ctx.ins()?.mul(index, Value::int(size)))
}

impl ContractCompiler<'_> {
    fn check_bounds(&self, ctx: &mut CompilationContext, index: &Value, length: Value) -> Result<()> {
        if !self.config.bounds_checks {
            return Ok(());
        }
        let out_of_range = match (constant_int(index), constant_int(&length)) {
            (Some(i), Some(len)) => Value::bool(i >= len),
            _ => ctx.ins()?.ge(index.clone(), length),
        };
        let fail = ctx.assert_fail_block()?;
        ctx.fail_if(out_of_range, fail, "index.ok")
    }

    /// Slot of element `index` of the storage array of type `array`
    /// rooted at `base`.
    pub(crate) fn storage_element_slot(
        &mut self,
        ctx: &mut CompilationContext,
        base: Value,
        array: &TypeName,
        index: Value,
        node: NodeId,
    ) -> Result<Value> {
        let TypeName::Array { base: elem, length, .. } = array else {
            return Err(CodegenError::type_mismatch(node, "indexing a non-array"));
        };
        let size = self.storage_size(elem, node)?;
        let start = match length {
            Some(len) => {
                self.check_bounds(ctx, &index, Value::int(*len))?;
                base
            }
            None => {
                let len = ctx.ins()?.storage_load(base.clone());
                self.check_bounds(ctx, &index, len)?;
                ctx.ins()?.array_data_slot(base)
            }
        };
        let scaled = scale(ctx, index, size)?;
        offset(ctx, start, scaled)
    }

    /// Address of element `index` of the memory array at `ptr`. Cell 0
    /// holds the length.
    fn memory_element_address(
        &self,
        ctx: &mut CompilationContext,
        ptr: Value,
        index: Value,
    ) -> Result<Value> {
        let len = ctx.ins()?.memory_load(ptr.clone());
        self.check_bounds(ctx, &index, len)?;
        let first = offset(ctx, ptr, Value::one())?;
        offset(ctx, first, index)
    }

    pub(crate) fn compile_lvalue(
        &mut self,
        ctx: &mut CompilationContext,
        expr: &Expression,
    ) -> Result<LValue> {
        let mismatch = |expected: &str| CodegenError::LValueKindMismatch {
            node: expr.id,
            expected: expected.to_string(),
        };
        match &expr.kind {
            ExpressionKind::Identifier {
                name,
                declaration: Declaration::Variable(var),
            } => {
                let decl = self.unit.variable(*var);
                if decl.is_constant {
                    return Err(mismatch("a mutable variable"));
                }
                if decl.is_state_variable() {
                    let slot = self.slots.get(var).copied().ok_or_else(|| {
                        CodegenError::UnknownVariable {
                            node: expr.id,
                            name: name.clone(),
                        }
                    })?;
                    return Ok(LValue::storage(Value::int(slot), &decl.ty));
                }
                let local = ctx.renames.lookup(*var).cloned().ok_or_else(|| {
                    CodegenError::UnknownVariable {
                        node: expr.id,
                        name: name.clone(),
                    }
                })?;
                Ok(LValue::Register {
                    local,
                    ty: decl.ty.clone(),
                })
            }

            ExpressionKind::IndexAccess { base, index } => {
                let index = index
                    .as_deref()
                    .ok_or_else(|| CodegenError::unsupported(expr.id, "index access without index"))?;
                match &base.ty {
                    TypeName::Mapping { key, value } => {
                        let base_slot = self.compile_single(ctx, base)?;
                        let raw = self.compile_single(ctx, index)?;
                        let key_value = self.convert(ctx, raw, &index.ty, key)?;
                        let slot = ctx.ins()?.mapping_slot(base_slot, key_value);
                        Ok(LValue::storage(slot, value))
                    }
                    array @ TypeName::Array { base: elem, .. } if array.is_in_storage() => {
                        let base_slot = self.compile_single(ctx, base)?;
                        let i = self.compile_single(ctx, index)?;
                        let slot = self.storage_element_slot(ctx, base_slot, array, i, expr.id)?;
                        Ok(LValue::storage(slot, elem))
                    }
                    TypeName::Array { base: elem, .. } => {
                        let ptr = self.compile_single(ctx, base)?;
                        let i = self.compile_single(ctx, index)?;
                        let address = self.memory_element_address(ctx, ptr, i)?;
                        Ok(LValue::Memory {
                            address,
                            ty: elem.with_location(DataLocation::Memory),
                        })
                    }
                    TypeName::FixedBytes(_) => {
                        Err(CodegenError::unsupported(expr.id, "byte index access"))
                    }
                    _ => Err(mismatch("an indexable location")),
                }
            }

            ExpressionKind::MemberAccess {
                expression, member, ..
            } => match &expression.ty {
                TypeName::Struct { id, location } => {
                    let index = self.member_index(*id, member, expr.id)?;
                    let member_ty = self.unit.struct_def(*id).members[index].ty.clone();
                    let base = self.compile_single(ctx, expression)?;
                    if *location == DataLocation::Memory {
                        let address = offset(ctx, base, Value::int(index as u64))?;
                        Ok(LValue::Memory {
                            address,
                            ty: member_ty.with_location(DataLocation::Memory),
                        })
                    } else {
                        let field = self.storage_field_offset(*id, index, expr.id)?;
                        let slot = offset(ctx, base, Value::int(field))?;
                        Ok(LValue::storage(slot, &member_ty))
                    }
                }
                array @ TypeName::Array { length: None, .. }
                    if member == "length" && array.is_in_storage() =>
                {
                    let slot = self.compile_single(ctx, expression)?;
                    Ok(LValue::Storage {
                        slot,
                        ty: TypeName::uint256(),
                    })
                }
                _ => Err(mismatch("a struct member")),
            },

            ExpressionKind::Tuple(items) if items.len() == 1 => match &items[0] {
                Some(inner) => self.compile_lvalue(ctx, inner),
                None => Err(mismatch("a non-empty expression")),
            },

            _ => Err(mismatch("a variable, member or element")),
        }
    }

    /// Reads the current value at `lvalue`. Reference types in storage
    /// evaluate to their root slot.
    pub(crate) fn load(&mut self, ctx: &mut CompilationContext, lvalue: &LValue) -> Result<Value> {
        Ok(match lvalue {
            LValue::Register { local, .. } => ctx.ins()?.copy(local.clone()),
            LValue::Memory { address, .. } => ctx.ins()?.memory_load(address.clone()),
            LValue::Storage { slot, ty } if ty.is_value_type() => {
                ctx.ins()?.storage_load(slot.clone())
            }
            LValue::Storage { slot, .. } => slot.clone(),
        })
    }

    /// Converts `value` of type `from` for a slot typed `to`: masks value
    /// types and deep-copies storage objects headed for memory.
    pub(crate) fn prepare_value(
        &mut self,
        ctx: &mut CompilationContext,
        value: Value,
        from: &TypeName,
        to: &TypeName,
        node: NodeId,
    ) -> Result<Value> {
        if should_copy_storage_to_memory(to, from) {
            let ir = self.ir_type(from, node)?;
            return Ok(ctx.ins()?.copy_storage_to_memory(value, ir));
        }
        if to.is_value_type() {
            return self.convert(ctx, value, from, to);
        }
        Ok(value)
    }

    pub(crate) fn store(
        &mut self,
        ctx: &mut CompilationContext,
        lvalue: &LValue,
        value: Value,
        from: &TypeName,
        node: NodeId,
    ) -> Result<()> {
        match lvalue {
            LValue::Register { local, ty } => {
                let v = self.prepare_value(ctx, value, from, ty, node)?;
                ctx.ins()?.assign(local.clone(), v);
            }
            LValue::Memory { address, ty } => {
                let v = self.prepare_value(ctx, value, from, ty, node)?;
                ctx.ins()?.memory_store(address.clone(), v);
            }
            LValue::Storage { slot, ty } if ty.is_value_type() => {
                let v = self.convert(ctx, value, from, ty)?;
                ctx.ins()?.storage_store(slot.clone(), v);
            }
            LValue::Storage { slot, ty } => {
                let ir = self.ir_type(ty, node)?;
                if should_copy_storage_to_storage(ty, from) {
                    ctx.ins()?.copy_storage_to_storage(slot.clone(), value, ir);
                } else if should_copy_memory_to_storage(ty, from) {
                    ctx.ins()?.copy_memory_to_storage(slot.clone(), value, ir);
                } else {
                    return Err(CodegenError::type_mismatch(
                        node,
                        "cannot assign to a mapping",
                    ));
                }
            }
        }
        Ok(())
    }

    /// `delete x`: resets the location to the zero value of its type.
    pub(crate) fn delete(
        &mut self,
        ctx: &mut CompilationContext,
        lvalue: &LValue,
        node: NodeId,
    ) -> Result<()> {
        match lvalue {
            LValue::Storage { ty, .. } if matches!(ty, TypeName::Mapping { .. }) => {
                Err(CodegenError::unsupported(node, "delete of a whole mapping"))
            }
            LValue::Storage { slot, ty } if ty.is_reference() => {
                // A null source clears the destination.
                let ir = self.ir_type(ty, node)?;
                ctx.ins()?.copy_memory_to_storage(slot.clone(), Value::zero(), ir);
                Ok(())
            }
            LValue::Storage { slot, ty } => {
                let zero = self.default_value(ctx, ty, node)?;
                ctx.ins()?.storage_store(slot.clone(), zero);
                Ok(())
            }
            LValue::Register { local, ty } => {
                let zero = self.default_value(ctx, ty, node)?;
                ctx.ins()?.assign(local.clone(), zero);
                Ok(())
            }
            LValue::Memory { address, ty } => {
                let zero = self.default_value(ctx, ty, node)?;
                ctx.ins()?.memory_store(address.clone(), zero);
                Ok(())
            }
        }
    }

    /// Read-modify-write for `x op= v`, `++x` and friends. Returns the old
    /// and the new value.
    pub(crate) fn update(
        &mut self,
        ctx: &mut CompilationContext,
        lvalue: &LValue,
        op: BinaryOperator,
        rhs: Value,
        rhs_ty: &TypeName,
        node: NodeId,
    ) -> Result<(Value, Value)> {
        let ty = lvalue.ty().clone();
        let old = self.load(ctx, lvalue)?;
        let rhs = if keeps_right_type(op) {
            rhs
        } else {
            self.convert(ctx, rhs, rhs_ty, &ty)?
        };
        let new = self.binary_operation(ctx, op, old.clone(), rhs, &ty, node)?;
        self.store(ctx, lvalue, new.clone(), &ty, node)?;
        Ok((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StructRef;

    fn storage_struct() -> TypeName {
        TypeName::Struct {
            id: StructRef(0),
            location: DataLocation::Storage,
        }
    }

    #[test]
    fn test_copy_predicates() {
        let memory = storage_struct().with_location(DataLocation::Memory);
        let pointer = storage_struct().with_location(DataLocation::StoragePointer);

        assert!(should_copy_storage_to_storage(&storage_struct(), &pointer));
        assert!(should_copy_memory_to_storage(&storage_struct(), &memory));
        assert!(should_copy_storage_to_memory(&memory, &storage_struct()));

        // Pointers alias, memory to memory aliases.
        assert!(!should_copy_storage_to_storage(&pointer, &storage_struct()));
        assert!(!should_copy_storage_to_memory(&memory, &memory));
        assert!(!should_copy_storage_to_storage(&TypeName::Uint(8), &TypeName::Uint(8)));
    }
}
