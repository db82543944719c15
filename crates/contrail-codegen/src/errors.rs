use crate::ast::NodeId;
use contrail_core::IrError;
use thiserror::Error;

/// Fatal compile diagnostics. Each names the offending node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("{node}: could not resolve function '{name}'")]
    UnresolvedFunction { node: NodeId, name: String },

    #[error("{node}: modifier '{name}' not found")]
    ModifierNotFound { node: NodeId, name: String },

    #[error("{node}: expression is not assignable as {expected}")]
    LValueKindMismatch { node: NodeId, expected: String },

    #[error("{node}: expected {expected} values, found {found}")]
    ArityMismatch {
        node: NodeId,
        expected: usize,
        found: usize,
    },

    #[error("{node}: 'break' outside of a loop")]
    BreakOutsideLoop { node: NodeId },

    #[error("{node}: 'continue' outside of a loop")]
    ContinueOutsideLoop { node: NodeId },

    #[error("{node}: placeholder outside of a modifier body")]
    PlaceholderOutsideModifier { node: NodeId },

    #[error("{node}: unsupported feature: {feature}")]
    UnsupportedFeature { node: NodeId, feature: String },

    #[error("{node}: unknown variable '{name}'")]
    UnknownVariable { node: NodeId, name: String },

    #[error("{node}: contract '{name}' must be compiled before it can be created")]
    SiblingNotCompiled { node: NodeId, name: String },

    #[error("{node}: linearization of '{contract}' is impossible")]
    InheritanceLinearization { node: NodeId, contract: String },

    #[error("{node}: type mismatch: {message}")]
    TypeMismatch { node: NodeId, message: String },

    #[error(transparent)]
    Ir(#[from] IrError),
}

impl CodegenError {
    pub fn unsupported(node: NodeId, feature: impl Into<String>) -> Self {
        CodegenError::UnsupportedFeature {
            node,
            feature: feature.into(),
        }
    }

    pub fn type_mismatch(node: NodeId, message: impl Into<String>) -> Self {
        CodegenError::TypeMismatch {
            node,
            message: message.into(),
        }
    }

    /// The node the diagnostic points at, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            CodegenError::UnresolvedFunction { node, .. }
            | CodegenError::ModifierNotFound { node, .. }
            | CodegenError::LValueKindMismatch { node, .. }
            | CodegenError::ArityMismatch { node, .. }
            | CodegenError::BreakOutsideLoop { node }
            | CodegenError::ContinueOutsideLoop { node }
            | CodegenError::PlaceholderOutsideModifier { node }
            | CodegenError::UnsupportedFeature { node, .. }
            | CodegenError::UnknownVariable { node, .. }
            | CodegenError::SiblingNotCompiled { node, .. }
            | CodegenError::InheritanceLinearization { node, .. }
            | CodegenError::TypeMismatch { node, .. } => Some(*node),
            CodegenError::Ir(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
