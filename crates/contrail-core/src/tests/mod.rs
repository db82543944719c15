/*! Test coverage for the IR builder, verifier and reference VM.
 *
 * Functions here are assembled by hand through `FunctionBuilder`, then either verified or executed,
 * so the core can be checked without going through the code generator.
 */

mod interp_tests;
mod verify_tests;
