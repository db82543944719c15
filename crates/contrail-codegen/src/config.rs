use serde::{Deserialize, Serialize};

/// Switches for the runtime checks the code generator inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Divisions and modulos by zero jump to the assertion-failure block.
    pub division_checks: bool,
    /// Array index accesses are checked against the length.
    pub bounds_checks: bool,
    /// Public state variables get accessor functions.
    pub generate_accessors: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            division_checks: true,
            bounds_checks: true,
            generate_accessors: true,
        }
    }
}

impl CodegenConfig {
    /// No runtime checks and no accessors; mostly useful for reading IR.
    pub fn unchecked() -> Self {
        Self {
            division_checks: false,
            bounds_checks: false,
            generate_accessors: false,
        }
    }
}
