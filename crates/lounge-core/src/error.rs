//! Error taxonomy for the ODM engine.

use lounge_store::StoreError;

/// Bad model declaration. Raised while building a schema or registry and
/// never recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field {field} is declared more than once")]
    DuplicateField { field: String },

    #[error("field name must not be empty")]
    EmptyFieldName,

    #[error("field {field} is reserved for the document key")]
    ReservedField { field: String },

    #[error("field {field} has unknown type marker {marker:?}")]
    UnknownTypeMarker { field: String, marker: String },

    #[error("invalid declaration for {field}: {reason}")]
    InvalidDeclaration { field: String, reason: String },

    #[error("model {0} is registered more than once")]
    DuplicateModel(String),

    #[error("model {model} references unregistered model {target}")]
    UnknownModel { model: String, target: String },
}

/// A field value breaks a rule. Blocks the save before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{model}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        model: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("{model}.{field}: {message}")]
    Rule {
        model: String,
        field: String,
        message: String,
    },
}

impl ValidationError {
    /// Build a rule violation for use inside custom validators.
    pub fn rule(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError::Rule {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by save, fetch, populate and remove.
#[derive(Debug, thiserror::Error)]
pub enum OdmError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Store I/O failure, surfaced verbatim. `key` names the document whose
    /// operation failed when the store reported one.
    #[error("store error{}: {source}", .key.as_deref().map(|k| format!(" on {k}")).unwrap_or_default())]
    Store {
        key: Option<String>,
        #[source]
        source: StoreError,
    },

    /// A stored document does not fit its model's attribute tree.
    #[error("cannot decode {key}.{field}: {reason}")]
    Decode {
        key: String,
        field: String,
        reason: String,
    },

    #[error("unknown model: {0}")]
    UnknownModel(String),
}

impl OdmError {
    /// Key of the document the failure concerns, if known.
    pub fn key(&self) -> Option<&str> {
        match self {
            OdmError::Store { key, .. } => key.as_deref(),
            OdmError::Decode { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl From<StoreError> for OdmError {
    fn from(source: StoreError) -> Self {
        OdmError::Store {
            key: source.key().map(str::to_string),
            source,
        }
    }
}

/// Result type for ODM operations.
pub type Result<T> = std::result::Result<T, OdmError>;
