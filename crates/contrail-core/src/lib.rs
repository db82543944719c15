/*! Core IR types and builders for the contrail contract compiler.
 *
 * The code generator lowers contracts into a control-flow graph of register-machine blocks whose
 * integers are unbounded; every width and sign is enforced by explicit masking instructions. This
 * crate holds that object graph, the cursor-style builder that produces it, the verifier that
 * checks it is well formed, and a small reference VM that executes it.
 */

pub mod analysis;
pub mod block;
pub mod builder;
pub mod contract;
pub mod function;
pub mod instructions;
pub mod interp;
pub mod ir_persist;
pub mod types;
pub mod values;

pub use block::{BasicBlock, BlockId, Terminator};
pub use builder::{FunctionBuilder, FunctionInstBuilder, InstBuilder, InstBuilderBase, InstBuilderExt};
pub use contract::{Contract, ContractMetadata, StorageLayout, StorageSlot};
pub use function::{Function, FunctionBody, FunctionSignature, Mutability, Parameter, Visibility};
pub use instructions::{BinaryOp, BuiltinFunction, ContextVariable, Instruction, UnaryOp};
pub use types::{StructDefinition, StructFieldDef, StructId, Type, TypeRegistry};
pub use values::{Constant, Value};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
    #[error("Builder error: {0}")]
    BuilderError(String),
    #[error("Function not found: {0}")]
    FunctionNotFound(String),
    #[error("Verification failed in {function}: {message}")]
    Verification { function: String, message: String },
}

pub type Result<T> = std::result::Result<T, IrError>;

#[cfg(test)]
mod tests;
