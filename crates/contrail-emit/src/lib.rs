/*! Turn contrail IR into readable text.
 *
 * The rendering is deterministic: functions, blocks and storage slots are printed in the order the
 * code generator produced them, so two compiles of the same source produce byte-identical text.
 */

pub mod config;
pub mod contrail_emitter;
pub mod emitter;

pub use config::EmitterConfig;
pub use contrail_emitter::ContrailEmitter;
pub use emitter::{EmitContext, EmitHelper, EmitResult, Emitter, Tint};
