/*! Code generation from resolved contract ASTs to contrail IR.
 *
 * The input is a [`ast::SourceUnit`] whose names are resolved and whose expressions carry their
 * static types. Each contract is lowered together with everything it inherits: storage is laid
 * out, modifiers are expanded inline around the function bodies they wrap, virtual calls are
 * bound to the most-derived override and every source-level failure becomes an explicit revert
 * or panic block.
 *
 * ```ignore
 * let unit = SourceUnitBuilder::new() ... .finish();
 * let contracts = compile_source_unit(&unit, &CodegenConfig::default())?;
 * ```
 */

pub mod ast;
pub mod codegen;
pub mod config;
pub mod errors;

pub use ast::SourceUnitBuilder;
pub use codegen::{compile_contract, compile_source_unit, CompiledContracts, REVERT_STATUS};
pub use config::CodegenConfig;
pub use errors::{CodegenError, Result};
