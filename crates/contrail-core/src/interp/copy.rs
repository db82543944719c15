//! Deep copies between storage and memory, following the layout rules of
//! [`TypeRegistry`].

use super::state::{keccak_words, State};
use super::VmError;
use crate::types::{Type, TypeRegistry};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

const MAX_COPY_LENGTH: u64 = 1 << 20;

fn length(value: &BigInt) -> Result<u64, VmError> {
    value
        .to_u64()
        .filter(|len| *len <= MAX_COPY_LENGTH)
        .ok_or_else(|| VmError::Runtime(format!("array length {} too large to copy", value)))
}

fn missing_struct(ty: &Type) -> VmError {
    VmError::Runtime(format!("unknown struct in {}", ty))
}

impl State {
    pub fn copy_storage_to_storage(
        &mut self,
        types: &TypeRegistry,
        dest: &BigInt,
        src: &BigInt,
        ty: &Type,
    ) -> Result<(), VmError> {
        if dest == src {
            return Ok(());
        }
        match ty {
            Type::Mapping(..) => {}
            Type::Struct(id) => {
                let def = types.get_struct(*id).ok_or_else(|| missing_struct(ty))?;
                for (index, field) in def.fields.iter().enumerate() {
                    let offset = types
                        .storage_field_offset(*id, index)
                        .ok_or_else(|| missing_struct(ty))?;
                    self.copy_storage_to_storage(
                        types,
                        &(dest + offset),
                        &(src + offset),
                        &field.field_type,
                    )?;
                }
            }
            Type::Array(elem, Some(len)) => {
                let size = types.storage_size(elem);
                for i in 0..*len {
                    let offset = i * size;
                    self.copy_storage_to_storage(types, &(dest + offset), &(src + offset), elem)?;
                }
            }
            Type::Array(elem, None) => {
                let len = length(&self.sload(src))?;
                let old_len = length(&self.sload(dest))?;
                self.sstore(dest.clone(), BigInt::from(len));
                let size = types.storage_size(elem);
                let dest_data = keccak_words(&[dest.clone()]);
                let src_data = keccak_words(&[src.clone()]);
                for i in 0..len {
                    let offset = i * size;
                    self.copy_storage_to_storage(
                        types,
                        &(&dest_data + offset),
                        &(&src_data + offset),
                        elem,
                    )?;
                }
                for i in len..old_len {
                    self.clear_storage(types, &(&dest_data + i * size), elem)?;
                }
            }
            _ => {
                let value = self.sload(src);
                self.sstore(dest.clone(), value);
            }
        }
        Ok(())
    }

    /// Copies the memory object at `src` into storage at `dest`. For value
    /// types `src` is the value itself. A null source clears the destination.
    pub fn copy_memory_to_storage(
        &mut self,
        types: &TypeRegistry,
        dest: &BigInt,
        src: &BigInt,
        ty: &Type,
    ) -> Result<(), VmError> {
        if ty.is_value_type() {
            self.sstore(dest.clone(), src.clone());
            return Ok(());
        }
        if src.is_zero() {
            return self.clear_storage(types, dest, ty);
        }
        match ty {
            Type::Mapping(..) => {}
            Type::Struct(id) => {
                let def = types.get_struct(*id).ok_or_else(|| missing_struct(ty))?;
                for (index, field) in def.fields.iter().enumerate() {
                    let offset = types
                        .storage_field_offset(*id, index)
                        .ok_or_else(|| missing_struct(ty))?;
                    let cell = self.mload(&(src + index))?;
                    self.copy_memory_to_storage(types, &(dest + offset), &cell, &field.field_type)?;
                }
            }
            Type::Array(elem, Some(len)) => {
                let size = types.storage_size(elem);
                for i in 0..*len {
                    let cell = self.mload(&(src + 1 + i))?;
                    self.copy_memory_to_storage(types, &(dest + i * size), &cell, elem)?;
                }
            }
            Type::Array(elem, None) => {
                let len = length(&self.mload(src)?)?;
                let old_len = length(&self.sload(dest))?;
                self.sstore(dest.clone(), BigInt::from(len));
                let size = types.storage_size(elem);
                let data = keccak_words(&[dest.clone()]);
                for i in 0..len {
                    let cell = self.mload(&(src + 1 + i))?;
                    self.copy_memory_to_storage(types, &(&data + i * size), &cell, elem)?;
                }
                for i in len..old_len {
                    self.clear_storage(types, &(&data + i * size), elem)?;
                }
            }
            _ => self.sstore(dest.clone(), src.clone()),
        }
        Ok(())
    }

    /// Materializes the storage object at `src` as a fresh memory object and
    /// returns its address. For value types the loaded value is returned.
    pub fn copy_storage_to_memory(
        &mut self,
        types: &TypeRegistry,
        src: &BigInt,
        ty: &Type,
    ) -> Result<BigInt, VmError> {
        match ty {
            Type::Mapping(..) => Ok(BigInt::zero()),
            Type::Struct(id) => {
                let def = types.get_struct(*id).ok_or_else(|| missing_struct(ty))?;
                let ptr = self.allocate(&BigInt::from(def.fields.len()))?;
                for (index, field) in def.fields.iter().enumerate() {
                    let offset = types
                        .storage_field_offset(*id, index)
                        .ok_or_else(|| missing_struct(ty))?;
                    let cell = self.copy_storage_to_memory(types, &(src + offset), &field.field_type)?;
                    self.mstore(&(&ptr + index), cell)?;
                }
                Ok(ptr)
            }
            Type::Array(elem, Some(len)) => {
                let size = types.storage_size(elem);
                self.copy_elements_to_memory(types, src.clone(), *len, size, elem)
            }
            Type::Array(elem, None) => {
                let len = length(&self.sload(src))?;
                let size = types.storage_size(elem);
                let data = keccak_words(&[src.clone()]);
                self.copy_elements_to_memory(types, data, len, size, elem)
            }
            _ => Ok(self.sload(src)),
        }
    }

    fn copy_elements_to_memory(
        &mut self,
        types: &TypeRegistry,
        first_slot: BigInt,
        len: u64,
        size: u64,
        elem: &Type,
    ) -> Result<BigInt, VmError> {
        let ptr = self.allocate(&BigInt::from(len + 1))?;
        self.mstore(&ptr, BigInt::from(len))?;
        for i in 0..len {
            let cell = self.copy_storage_to_memory(types, &(&first_slot + i * size), elem)?;
            self.mstore(&(&ptr + 1 + i), cell)?;
        }
        Ok(ptr)
    }

    pub fn clear_storage(
        &mut self,
        types: &TypeRegistry,
        dest: &BigInt,
        ty: &Type,
    ) -> Result<(), VmError> {
        match ty {
            Type::Mapping(..) => {}
            Type::Struct(id) => {
                let def = types.get_struct(*id).ok_or_else(|| missing_struct(ty))?;
                for (index, field) in def.fields.iter().enumerate() {
                    let offset = types
                        .storage_field_offset(*id, index)
                        .ok_or_else(|| missing_struct(ty))?;
                    self.clear_storage(types, &(dest + offset), &field.field_type)?;
                }
            }
            Type::Array(elem, Some(len)) => {
                let size = types.storage_size(elem);
                for i in 0..*len {
                    self.clear_storage(types, &(dest + i * size), elem)?;
                }
            }
            Type::Array(elem, None) => {
                let len = length(&self.sload(dest))?;
                let size = types.storage_size(elem);
                let data = keccak_words(&[dest.clone()]);
                for i in 0..len {
                    self.clear_storage(types, &(&data + i * size), elem)?;
                }
                self.sstore(dest.clone(), BigInt::zero());
            }
            _ => self.sstore(dest.clone(), BigInt::zero()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StructDefinition, StructFieldDef, StructId};

    fn point_types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.insert_struct(
            StructId(0),
            StructDefinition {
                name: "Point".into(),
                fields: vec![
                    StructFieldDef {
                        name: "x".into(),
                        field_type: Type::Uint(256),
                    },
                    StructFieldDef {
                        name: "tags".into(),
                        field_type: Type::Array(Box::new(Type::Uint(8)), None),
                    },
                ],
            },
        );
        types
    }

    #[test]
    fn storage_memory_round_trip_of_nested_struct() {
        let types = point_types();
        let ty = Type::Struct(StructId(0));
        let mut state = State::default();
        state.memory.clear();

        let tags = state.allocate(&BigInt::from(3)).unwrap();
        state.mstore(&tags, BigInt::from(2)).unwrap();
        state.mstore(&(&tags + 1), BigInt::from(11)).unwrap();
        state.mstore(&(&tags + 2), BigInt::from(12)).unwrap();
        let point = state.allocate(&BigInt::from(2)).unwrap();
        state.mstore(&point, BigInt::from(42)).unwrap();
        state.mstore(&(&point + 1), tags).unwrap();

        state
            .copy_memory_to_storage(&types, &BigInt::from(5), &point, &ty)
            .unwrap();
        assert_eq!(state.sload(&BigInt::from(5)), BigInt::from(42));
        assert_eq!(state.sload(&BigInt::from(6)), BigInt::from(2));
        let data = keccak_words(&[BigInt::from(6)]);
        assert_eq!(state.sload(&(&data + 1)), BigInt::from(12));

        let copy = state
            .copy_storage_to_memory(&types, &BigInt::from(5), &ty)
            .unwrap();
        assert_eq!(state.mload(&copy).unwrap(), BigInt::from(42));
        let tags_copy = state.mload(&(&copy + 1)).unwrap();
        assert_eq!(state.mload(&tags_copy).unwrap(), BigInt::from(2));
        assert_eq!(state.mload(&(&tags_copy + 2)).unwrap(), BigInt::from(12));
    }

    #[test]
    fn null_source_clears_destination() {
        let types = point_types();
        let ty = Type::Struct(StructId(0));
        let mut state = State::default();
        state.sstore(BigInt::from(0), BigInt::from(9));
        state.sstore(BigInt::from(1), BigInt::from(1));
        let data = keccak_words(&[BigInt::from(1)]);
        state.sstore(data.clone(), BigInt::from(3));

        state
            .copy_memory_to_storage(&types, &BigInt::from(0), &BigInt::zero(), &ty)
            .unwrap();
        assert!(state.storage.is_empty());
    }

    #[test]
    fn shrinking_dynamic_array_clears_tail() {
        let types = TypeRegistry::new();
        let ty = Type::Array(Box::new(Type::Uint(256)), None);
        let mut state = State::default();
        let dest_data = keccak_words(&[BigInt::from(1)]);
        state.sstore(BigInt::from(1), BigInt::from(2));
        state.sstore(dest_data.clone(), BigInt::from(7));
        state.sstore(&dest_data + 1, BigInt::from(8));

        let src_data = keccak_words(&[BigInt::from(2)]);
        state.sstore(BigInt::from(2), BigInt::from(1));
        state.sstore(src_data, BigInt::from(5));

        state
            .copy_storage_to_storage(&types, &BigInt::from(1), &BigInt::from(2), &ty)
            .unwrap();
        assert_eq!(state.sload(&BigInt::from(1)), BigInt::from(1));
        assert_eq!(state.sload(&dest_data), BigInt::from(5));
        assert_eq!(state.sload(&(&dest_data + 1)), BigInt::zero());
    }
}
