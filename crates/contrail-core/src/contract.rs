use crate::function::Function;
use crate::types::{Type, TypeRegistry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub functions: IndexMap<String, Function>,
    pub storage_layout: StorageLayout,
    pub types: TypeRegistry,
    /// Sibling contracts this contract instantiates with `new`.
    pub dependencies: Vec<String>,
    pub metadata: ContractMetadata,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: IndexMap::new(),
            storage_layout: StorageLayout::default(),
            types: TypeRegistry::new(),
            dependencies: Vec::new(),
            metadata: ContractMetadata::default(),
        }
    }

    pub fn add_function(&mut self, mut function: Function) {
        function.analyze_metadata();
        self.functions
            .insert(function.signature.name.clone(), function);
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn constructor(&self) -> Option<&Function> {
        self.functions.values().find(|f| f.metadata.is_constructor)
    }

    pub fn block_count(&self) -> usize {
        self.functions.values().map(|f| f.body.blocks.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractMetadata {
    /// Inheritance linearization, most derived first.
    pub linearization: Vec<String>,
    pub is_abstract: bool,
    pub has_external_calls: bool,
    pub has_selfdestruct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageLayout {
    pub slots: Vec<StorageSlot>,
}

impl StorageLayout {
    pub fn add_variable(&mut self, name: impl Into<String>, ty: Type, slot: u64, size: u64) {
        self.slots.push(StorageSlot {
            slot,
            size,
            var_type: ty,
            name: name.into(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&StorageSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// First slot after every allocated variable.
    pub fn next_free_slot(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.slot + s.size)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSlot {
    pub slot: u64,
    pub size: u64,
    pub var_type: Type,
    /// Qualified as `Contract.variable`.
    pub name: String,
}
