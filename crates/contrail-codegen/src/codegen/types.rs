use super::context::CompilationContext;
use super::ContractCompiler;
use crate::ast::{DataLocation, NodeId, SourceUnit, StructRef, TypeName};
use crate::errors::{CodegenError, Result};
use contrail_core::{InstBuilder, InstBuilderExt, StructDefinition, StructFieldDef, StructId, Type, Value};

/// ABI-style name of a type as used in function signatures.
pub fn canonical_type_name(unit: &SourceUnit, ty: &TypeName) -> String {
    match ty {
        TypeName::Bool => "bool".to_string(),
        TypeName::Uint(bits) => format!("uint{}", bits),
        TypeName::Int(bits) => format!("int{}", bits),
        TypeName::Address | TypeName::Contract(_) => "address".to_string(),
        TypeName::FixedBytes(n) => format!("bytes{}", n),
        TypeName::Array {
            base,
            length: Some(len),
            ..
        } => format!("{}[{}]", canonical_type_name(unit, base), len),
        TypeName::Array { base, .. } => format!("{}[]", canonical_type_name(unit, base)),
        TypeName::Mapping { key, value } => format!(
            "mapping({}=>{})",
            canonical_type_name(unit, key),
            canonical_type_name(unit, value)
        ),
        TypeName::Struct { id, .. } => {
            let members = unit
                .struct_def(*id)
                .members
                .iter()
                .map(|m| canonical_type_name(unit, &m.ty))
                .collect::<Vec<_>>()
                .join(",");
            format!("({})", members)
        }
        TypeName::Tuple(_) | TypeName::Void => String::new(),
    }
}

fn struct_id(id: StructRef) -> StructId {
    StructId(id.0)
}

impl ContractCompiler<'_> {
    /// Lowers a source type, registering any struct it mentions.
    pub(crate) fn ir_type(&mut self, ty: &TypeName, node: NodeId) -> Result<Type> {
        Ok(match ty {
            TypeName::Bool => Type::Bool,
            TypeName::Uint(bits) => Type::Uint(*bits),
            TypeName::Int(bits) => Type::Int(*bits),
            TypeName::Address => Type::Address,
            TypeName::FixedBytes(n) => Type::FixedBytes(*n),
            TypeName::Contract(c) => Type::Contract(self.unit.contract(*c).name.clone()),
            TypeName::Array { base, length, .. } => {
                Type::Array(Box::new(self.ir_type(base, node)?), *length)
            }
            TypeName::Mapping { key, value } => Type::Mapping(
                Box::new(self.ir_type(key, node)?),
                Box::new(self.ir_type(value, node)?),
            ),
            TypeName::Struct { id, .. } => {
                self.register_struct(*id, node)?;
                Type::Struct(struct_id(*id))
            }
            TypeName::Tuple(_) | TypeName::Void => {
                return Err(CodegenError::type_mismatch(
                    node,
                    "tuple or void used where a value type was expected",
                ))
            }
        })
    }

    fn register_struct(&mut self, id: StructRef, node: NodeId) -> Result<()> {
        let sid = struct_id(id);
        if self.types.get_struct(sid).is_some() {
            return Ok(());
        }
        let def = self.unit.struct_def(id);
        // Registered empty first so recursive members terminate.
        self.types.insert_struct(
            sid,
            StructDefinition {
                name: def.name.clone(),
                fields: Vec::new(),
            },
        );
        let mut fields = Vec::with_capacity(def.members.len());
        for member in &def.members {
            fields.push(StructFieldDef {
                name: member.name.clone(),
                field_type: self.ir_type(&member.ty, node)?,
            });
        }
        self.types.insert_struct(
            sid,
            StructDefinition {
                name: def.name.clone(),
                fields,
            },
        );
        Ok(())
    }

    pub(crate) fn storage_size(&mut self, ty: &TypeName, node: NodeId) -> Result<u64> {
        let ir = self.ir_type(ty, node)?;
        Ok(self.types.storage_size(&ir))
    }

    /// Slot offset of member `index` of a struct laid out in storage.
    pub(crate) fn storage_field_offset(
        &mut self,
        id: StructRef,
        index: usize,
        node: NodeId,
    ) -> Result<u64> {
        self.register_struct(id, node)?;
        self.types
            .storage_field_offset(struct_id(id), index)
            .ok_or_else(|| CodegenError::type_mismatch(node, "struct member out of range"))
    }

    pub(crate) fn member_index(&self, id: StructRef, member: &str, node: NodeId) -> Result<usize> {
        self.unit
            .struct_def(id)
            .members
            .iter()
            .position(|m| m.name == member)
            .ok_or_else(|| {
                CodegenError::type_mismatch(
                    node,
                    format!(
                        "struct {} has no member {}",
                        self.unit.struct_def(id).name,
                        member
                    ),
                )
            })
    }

    /// Value a variable of type `ty` holds before any assignment.
    ///
    /// Memory structs and arrays are freshly allocated, zeroed objects;
    /// nested memory objects are allocated as well. Storage pointers
    /// default to slot zero.
    pub(crate) fn default_value(
        &mut self,
        ctx: &mut CompilationContext,
        ty: &TypeName,
        node: NodeId,
    ) -> Result<Value> {
        match ty {
            TypeName::Bool => Ok(Value::bool(false)),
            TypeName::Struct {
                id,
                location: DataLocation::Memory,
            } => {
                let members: Vec<TypeName> = self
                    .unit
                    .struct_def(*id)
                    .members
                    .iter()
                    .map(|m| m.ty.with_location(DataLocation::Memory))
                    .collect();
                let ptr = ctx
                    .ins()?
                    .allocate_memory(Value::int(members.len().max(1) as u64));
                for (i, member) in members.iter().enumerate() {
                    if member.is_in_memory() {
                        let child = self.default_value(ctx, member, node)?;
                        let address = ctx.ins()?.add(ptr.clone(), Value::int(i as u64));
                        ctx.ins()?.memory_store(address, child);
                    }
                }
                Ok(ptr)
            }
            TypeName::Array {
                base,
                length,
                location: DataLocation::Memory,
            } => {
                let len = length.unwrap_or(0);
                let ptr = ctx.ins()?.allocate_memory(Value::int(len + 1));
                if len > 0 {
                    ctx.ins()?.memory_store(ptr.clone(), Value::int(len));
                }
                if base.is_in_memory() {
                    for i in 1..=len {
                        let child = self.default_value(ctx, base, node)?;
                        let address = ctx.ins()?.add(ptr.clone(), Value::int(i));
                        ctx.ins()?.memory_store(address, child);
                    }
                }
                Ok(ptr)
            }
            _ => Ok(Value::zero()),
        }
    }
}
