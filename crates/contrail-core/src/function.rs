use crate::block::{BasicBlock, BlockId};
use crate::types::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub signature: FunctionSignature,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub body: FunctionBody,
    pub metadata: FunctionMetadata,
}

impl Function {
    pub fn new(signature: FunctionSignature) -> Self {
        Self {
            signature,
            visibility: Visibility::Private,
            mutability: Mutability::NonPayable,
            body: FunctionBody::new(),
            metadata: FunctionMetadata::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn entry_block(&self) -> BlockId {
        self.body.entry_block()
    }

    pub fn instruction_count(&self) -> usize {
        self.body
            .blocks
            .values()
            .map(|block| block.instructions.len())
            .sum()
    }

    pub fn analyze_metadata(&mut self) {
        let (calls_external, modifies_state) = self
            .body
            .blocks
            .values()
            .flat_map(|block| &block.instructions)
            .fold((false, false), |(ext, state), inst| {
                (
                    ext || inst.is_external_call(),
                    state || inst.is_state_changing(),
                )
            });

        self.metadata.calls_external = calls_external;
        self.metadata.modifies_state = modifies_state;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub returns: Vec<Type>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: Type) -> Self {
        Self {
            name: name.into(),
            param_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_externally_callable(&self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionBody {
    pub entry_block: BlockId,
    pub blocks: IndexMap<BlockId, BasicBlock>,
    next_block_id: u32,
}

impl FunctionBody {
    pub fn new() -> Self {
        let entry_block = BlockId(0);
        let mut blocks = IndexMap::new();
        blocks.insert(entry_block, BasicBlock::new(entry_block, "entry"));

        Self {
            entry_block,
            blocks,
            next_block_id: 1,
        }
    }

    pub fn create_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id, label));
        id
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(&id)
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry_block
    }
}

impl Default for FunctionBody {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub is_constructor: bool,
    pub is_fallback: bool,
    pub is_accessor: bool,
    pub calls_external: bool,
    pub modifies_state: bool,
    /// Source-level name, e.g. `transfer` for `transfer(address,uint256)`.
    pub source_name: Option<String>,
    /// Contract whose declaration produced this function.
    pub defined_in: Option<String>,
}
