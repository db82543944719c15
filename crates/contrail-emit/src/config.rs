use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub use_colors: bool,
    pub indent_width: usize,
    /// Print the storage slot table before the functions.
    pub show_storage_layout: bool,
    /// Annotate parameters and copies with their types.
    pub show_types: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: false,
            indent_width: 4,
            show_storage_layout: true,
            show_types: true,
        }
    }
}

impl EmitterConfig {
    pub fn colored() -> Self {
        Self {
            use_colors: true,
            ..Self::default()
        }
    }
}
