use crate::types::Type;
use crate::values::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instruction {
    Assign {
        result: Value,
        value: Value,
    },
    Binary {
        result: Value,
        op: BinaryOp,
        left: Value,
        right: Value,
    },
    Unary {
        result: Value,
        op: UnaryOp,
        operand: Value,
    },
    /// `result = value mod 2^bits`, read as unsigned.
    Truncate {
        result: Value,
        value: Value,
        bits: u16,
    },
    /// Reads the low `bits` of `value` as a two's complement integer.
    SignExtend {
        result: Value,
        value: Value,
        bits: u16,
    },

    MemoryLoad {
        result: Value,
        address: Value,
    },
    MemoryStore {
        address: Value,
        value: Value,
    },
    AllocateMemory {
        result: Value,
        size: Value,
    },

    StorageLoad {
        result: Value,
        slot: Value,
    },
    StorageStore {
        slot: Value,
        value: Value,
    },
    /// Slot holding `base[key]` for a mapping rooted at `base`.
    MappingSlot {
        result: Value,
        base: Value,
        key: Value,
    },
    /// First element slot of the dynamic array whose length lives at `base`.
    ArrayDataSlot {
        result: Value,
        base: Value,
    },

    StorageToStorageCopy {
        dest: Value,
        src: Value,
        ty: Type,
    },
    MemoryToStorageCopy {
        dest: Value,
        src: Value,
        ty: Type,
    },
    StorageToMemoryCopy {
        result: Value,
        src: Value,
        ty: Type,
    },

    Call {
        results: Vec<Value>,
        function: String,
        args: Vec<Value>,
    },
    CallExternal {
        status: Value,
        results: Vec<Value>,
        address: Value,
        function: String,
        args: Vec<Value>,
        value: Value,
        gas: Value,
    },
    Create {
        status: Value,
        result: Value,
        contract: String,
        args: Vec<Value>,
        value: Value,
    },
    Builtin {
        results: Vec<Value>,
        function: BuiltinFunction,
        args: Vec<Value>,
    },
    GetContext {
        result: Value,
        var: ContextVariable,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Exp => "exp",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "le",
            BinaryOp::Ge => "ge",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    IsZero,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("not"),
            UnaryOp::IsZero => f.write_str("iszero"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFunction {
    Keccak256,
    AddMod,
    MulMod,
    BlockHash,
    Balance,
    SelfDestruct,
}

impl BuiltinFunction {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Keccak256 => "keccak256",
            BuiltinFunction::AddMod => "addmod",
            BuiltinFunction::MulMod => "mulmod",
            BuiltinFunction::BlockHash => "blockhash",
            BuiltinFunction::Balance => "balance",
            BuiltinFunction::SelfDestruct => "selfdestruct",
        }
    }

    pub fn result_count(&self) -> usize {
        match self {
            BuiltinFunction::SelfDestruct => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextVariable {
    MsgSender,
    MsgValue,
    TxOrigin,
    TxGasPrice,
    BlockNumber,
    BlockTimestamp,
    BlockCoinbase,
    BlockDifficulty,
    BlockGasLimit,
    GasLeft,
    ThisAddress,
}

impl ContextVariable {
    pub fn name(&self) -> &'static str {
        match self {
            ContextVariable::MsgSender => "msg.sender",
            ContextVariable::MsgValue => "msg.value",
            ContextVariable::TxOrigin => "tx.origin",
            ContextVariable::TxGasPrice => "tx.gasprice",
            ContextVariable::BlockNumber => "block.number",
            ContextVariable::BlockTimestamp => "block.timestamp",
            ContextVariable::BlockCoinbase => "block.coinbase",
            ContextVariable::BlockDifficulty => "block.difficulty",
            ContextVariable::BlockGasLimit => "block.gaslimit",
            ContextVariable::GasLeft => "gasleft",
            ContextVariable::ThisAddress => "this",
        }
    }
}

impl Instruction {
    pub fn results(&self) -> Vec<&Value> {
        match self {
            Instruction::Assign { result, .. }
            | Instruction::Binary { result, .. }
            | Instruction::Unary { result, .. }
            | Instruction::Truncate { result, .. }
            | Instruction::SignExtend { result, .. }
            | Instruction::MemoryLoad { result, .. }
            | Instruction::AllocateMemory { result, .. }
            | Instruction::StorageLoad { result, .. }
            | Instruction::MappingSlot { result, .. }
            | Instruction::ArrayDataSlot { result, .. }
            | Instruction::StorageToMemoryCopy { result, .. }
            | Instruction::GetContext { result, .. } => vec![result],
            Instruction::Call { results, .. } | Instruction::Builtin { results, .. } => {
                results.iter().collect()
            }
            Instruction::CallExternal {
                status, results, ..
            } => std::iter::once(status).chain(results.iter()).collect(),
            Instruction::Create { status, result, .. } => vec![status, result],
            Instruction::MemoryStore { .. }
            | Instruction::StorageStore { .. }
            | Instruction::StorageToStorageCopy { .. }
            | Instruction::MemoryToStorageCopy { .. } => Vec::new(),
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Instruction::Assign { value, .. }
            | Instruction::Truncate { value, .. }
            | Instruction::SignExtend { value, .. } => vec![value],
            Instruction::Binary { left, right, .. } => vec![left, right],
            Instruction::Unary { operand, .. } => vec![operand],
            Instruction::MemoryLoad { address, .. } => vec![address],
            Instruction::MemoryStore { address, value } => vec![address, value],
            Instruction::AllocateMemory { size, .. } => vec![size],
            Instruction::StorageLoad { slot, .. } => vec![slot],
            Instruction::StorageStore { slot, value } => vec![slot, value],
            Instruction::MappingSlot { base, key, .. } => vec![base, key],
            Instruction::ArrayDataSlot { base, .. } => vec![base],
            Instruction::StorageToStorageCopy { dest, src, .. }
            | Instruction::MemoryToStorageCopy { dest, src, .. } => vec![dest, src],
            Instruction::StorageToMemoryCopy { src, .. } => vec![src],
            Instruction::Call { args, .. } | Instruction::Builtin { args, .. } => {
                args.iter().collect()
            }
            Instruction::CallExternal {
                address,
                args,
                value,
                gas,
                ..
            } => std::iter::once(address)
                .chain(args.iter())
                .chain([value, gas])
                .collect(),
            Instruction::Create { args, value, .. } => {
                args.iter().chain(std::iter::once(value)).collect()
            }
            Instruction::GetContext { .. } => Vec::new(),
        }
    }

    pub fn is_state_changing(&self) -> bool {
        matches!(
            self,
            Instruction::StorageStore { .. }
                | Instruction::StorageToStorageCopy { .. }
                | Instruction::MemoryToStorageCopy { .. }
                | Instruction::CallExternal { .. }
                | Instruction::Create { .. }
                | Instruction::Builtin {
                    function: BuiltinFunction::SelfDestruct,
                    ..
                }
        )
    }

    pub fn is_external_call(&self) -> bool {
        matches!(
            self,
            Instruction::CallExternal { .. } | Instruction::Create { .. }
        )
    }
}
