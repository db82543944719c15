use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Uint(u16),
    Int(u16),
    Address,
    FixedBytes(u8),
    Array(Box<Type>, Option<u64>),
    Mapping(Box<Type>, Box<Type>),
    Struct(StructId),
    Contract(String),
}

impl Type {
    /// Value types live in a single register, storage slot or memory cell.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::Uint(_)
                | Type::Int(_)
                | Type::Address
                | Type::FixedBytes(_)
                | Type::Contract(_)
        )
    }

    pub fn is_reference(&self) -> bool {
        !self.is_value_type()
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    /// Bit width of an integer-like type, used to mask arithmetic results.
    pub fn bit_width(&self) -> Option<u16> {
        match self {
            Type::Uint(bits) | Type::Int(bits) => Some(*bits),
            Type::Address | Type::Contract(_) => Some(160),
            Type::FixedBytes(n) => Some(*n as u16 * 8),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Uint(bits) => write!(f, "uint{}", bits),
            Type::Int(bits) => write!(f, "int{}", bits),
            Type::Address => write!(f, "address"),
            Type::FixedBytes(n) => write!(f, "bytes{}", n),
            Type::Array(elem, Some(len)) => write!(f, "{}[{}]", elem, len),
            Type::Array(elem, None) => write!(f, "{}[]", elem),
            Type::Mapping(key, value) => write!(f, "mapping({} => {})", key, value),
            Type::Struct(id) => write!(f, "struct_{}", id.0),
            Type::Contract(name) => write!(f, "contract {}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<StructFieldDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructFieldDef {
    pub name: String,
    pub field_type: Type,
}

/// Struct definitions referenced by a contract's IR, plus the storage and
/// memory layout rules every producer and consumer of the IR agrees on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
    pub structs: IndexMap<StructId, StructDefinition>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_struct(&mut self, id: StructId, def: StructDefinition) {
        self.structs.insert(id, def);
    }

    pub fn get_struct(&self, id: StructId) -> Option<&StructDefinition> {
        self.structs.get(&id)
    }

    /// Number of consecutive storage slots a value of `ty` occupies.
    ///
    /// Structs are laid out inline, static arrays hold `len` elements in
    /// place, dynamic arrays and mappings take one slot and hash their
    /// contents elsewhere.
    pub fn storage_size(&self, ty: &Type) -> u64 {
        match ty {
            Type::Struct(id) => self
                .get_struct(*id)
                .map(|def| {
                    def.fields
                        .iter()
                        .map(|field| self.storage_size(&field.field_type))
                        .sum::<u64>()
                        .max(1)
                })
                .unwrap_or(1),
            Type::Array(elem, Some(len)) => len * self.storage_size(elem),
            _ => 1,
        }
    }

    /// Slot offset of the `index`th member of a struct stored in storage.
    pub fn storage_field_offset(&self, id: StructId, index: usize) -> Option<u64> {
        let def = self.get_struct(id)?;
        if index >= def.fields.len() {
            return None;
        }
        Some(
            def.fields[..index]
                .iter()
                .map(|field| self.storage_size(&field.field_type))
                .sum(),
        )
    }

    /// Number of memory cells a freshly allocated object of `ty` needs.
    /// Arrays reserve cell 0 for their length.
    pub fn memory_size(&self, ty: &Type, length: u64) -> u64 {
        match ty {
            Type::Struct(id) => self
                .get_struct(*id)
                .map(|def| def.fields.len() as u64)
                .unwrap_or(0),
            Type::Array(_, Some(len)) => 1 + len,
            Type::Array(_, None) => 1 + length,
            _ => 1,
        }
    }

    pub fn field_index(&self, id: StructId, name: &str) -> Option<usize> {
        self.get_struct(id)?
            .fields
            .iter()
            .position(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.insert_struct(
            StructId(0),
            StructDefinition {
                name: "Inner".into(),
                fields: vec![
                    StructFieldDef {
                        name: "a".into(),
                        field_type: Type::Uint(256),
                    },
                    StructFieldDef {
                        name: "b".into(),
                        field_type: Type::Uint(256),
                    },
                ],
            },
        );
        types.insert_struct(
            StructId(1),
            StructDefinition {
                name: "Outer".into(),
                fields: vec![
                    StructFieldDef {
                        name: "inner".into(),
                        field_type: Type::Struct(StructId(0)),
                    },
                    StructFieldDef {
                        name: "flags".into(),
                        field_type: Type::Array(Box::new(Type::Bool), Some(3)),
                    },
                    StructFieldDef {
                        name: "owner".into(),
                        field_type: Type::Address,
                    },
                ],
            },
        );
        types
    }

    #[test]
    fn nested_structs_are_inlined_in_storage() {
        let types = registry();
        assert_eq!(types.storage_size(&Type::Struct(StructId(1))), 6);
        assert_eq!(types.storage_field_offset(StructId(1), 1), Some(2));
        assert_eq!(types.storage_field_offset(StructId(1), 2), Some(5));
        assert_eq!(types.storage_field_offset(StructId(1), 3), None);
    }

    #[test]
    fn dynamic_containers_take_one_slot() {
        let types = registry();
        let dynamic = Type::Array(Box::new(Type::Struct(StructId(0))), None);
        let mapping = Type::Mapping(Box::new(Type::Address), Box::new(Type::Uint(256)));
        assert_eq!(types.storage_size(&dynamic), 1);
        assert_eq!(types.storage_size(&mapping), 1);
    }

    #[test]
    fn memory_objects_use_one_cell_per_member() {
        let types = registry();
        assert_eq!(types.memory_size(&Type::Struct(StructId(1)), 0), 3);
        assert_eq!(
            types.memory_size(&Type::Array(Box::new(Type::Uint(8)), None), 4),
            5
        );
    }

    #[test]
    fn canonical_names() {
        let ty = Type::Mapping(
            Box::new(Type::Address),
            Box::new(Type::Array(Box::new(Type::Int(8)), Some(2))),
        );
        assert_eq!(ty.to_string(), "mapping(address => int8[2])");
    }
}
