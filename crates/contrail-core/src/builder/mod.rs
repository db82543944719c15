/*! Cursor-style API for constructing IR functions.
 *
 * A `FunctionBuilder` owns the function under construction and a cursor pointing at the current
 * block. Instructions are appended through `ins()`, which numbers temporaries and refuses to write
 * into a block that has already been terminated.
 */

pub mod function_builder;
pub mod inst_builder;
pub mod ir_context;

pub use function_builder::{FunctionBuilder, FunctionInstBuilder};
pub use inst_builder::{InstBuilder, InstBuilderBase, InstBuilderExt};
pub use ir_context::TempTracker;
