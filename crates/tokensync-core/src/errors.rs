use crate::{Diagnostic, Severity};
use thiserror::Error;
use tokensync_store::VariableStoreError;

/// Failure that aborts a whole import or export with no partial result.
#[derive(Debug, Error)]
pub enum TokenSyncError {
    #[error("document parse error: {0}")]
    DocumentParse(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] VariableStoreError),
}

/// Failure scoped to a single token or variable; always becomes a [`Diagnostic`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ItemError {
    #[error("invalid color format: '{0}'")]
    InvalidColorFormat(String),
    #[error("invalid number: '{0}'")]
    InvalidNumber(String),
    #[error("unsupported leaf type '{token_type}'")]
    UnsupportedLeafType { token_type: String },
    #[error("alias target '{target}' never resolved")]
    AliasTargetUnresolved { target: String },
    #[error("variable {0} not found")]
    VariableNotFound(String),
    #[error("collection {0} not found")]
    CollectionNotFound(String),
    #[error("expected a {expected} value, found {found}")]
    ValueShapeMismatch { expected: String, found: String },
    #[error("store failure: {0}")]
    Store(String),
}

impl ItemError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidColorFormat(_) => "invalid_color_format",
            Self::InvalidNumber(_) => "invalid_number",
            Self::UnsupportedLeafType { .. } => "unsupported_leaf_type",
            Self::AliasTargetUnresolved { .. } => "alias_target_unresolved",
            Self::VariableNotFound(_) => "variable_not_found",
            Self::CollectionNotFound(_) => "collection_not_found",
            Self::ValueShapeMismatch { .. } => "value_shape_mismatch",
            Self::Store(_) => "store_failure",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Store(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.code(), self.severity(), self.to_string())
    }
}

impl From<VariableStoreError> for ItemError {
    fn from(error: VariableStoreError) -> Self {
        match error {
            VariableStoreError::NotFound {
                resource: "variable",
                id,
            } => Self::VariableNotFound(id),
            VariableStoreError::NotFound {
                resource: "collection",
                id,
            } => Self::CollectionNotFound(id),
            other => Self::Store(other.to_string()),
        }
    }
}
