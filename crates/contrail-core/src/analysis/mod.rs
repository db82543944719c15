/*! Control-flow queries and structural verification over built IR. */

pub mod cfg;
pub mod verify;

pub use cfg::ControlFlowGraph;
pub use verify::{verify_contract, verify_function};
