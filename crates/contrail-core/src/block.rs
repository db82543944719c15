use crate::instructions::Instruction;
use crate::values::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: Vec::new(),
            terminator: Terminator::Invalid,
        }
    }

    pub fn add_instruction(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    pub fn set_terminator(&mut self, term: Terminator) {
        self.terminator = term;
    }

    pub fn is_terminated(&self) -> bool {
        !matches!(self.terminator, Terminator::Invalid)
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator.successors()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Jump(BlockId),
    Branch {
        condition: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Vec<Value>),
    /// Abort and roll back; the value is the status code.
    Revert(Value),
    /// Failed assertion or invalid operation.
    Panic,
    /// Not yet terminated. Never present in a built function.
    Invalid,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_)
            | Terminator::Revert(_)
            | Terminator::Panic
            | Terminator::Invalid => vec![],
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Terminator::Branch { condition, .. } => vec![condition],
            Terminator::Return(values) => values.iter().collect(),
            Terminator::Revert(status) => vec![status],
            _ => Vec::new(),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Terminator::Return(_))
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, Terminator::Revert(_) | Terminator::Panic)
    }
}
