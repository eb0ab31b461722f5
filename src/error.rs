//! Errors and diagnostics for the type-graph compiler.
//!
//! Two severities, mirrored in two types:
//! - `Error`: fatal configuration problems; generation (or the runtime walk)
//!   aborts with one of these.
//! - `Diagnostic`: non-fatal findings accumulated on the generation report;
//!   the offending type is skipped and everything else still compiles.

use serde::Serialize;
use thiserror::Error;

// ------------------------------- Fatal ------------------------------------ //

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown type reference '{name}'")]
    UnknownType { name: String },

    #[error("duplicate type reference '{name}' in generation input")]
    DuplicateTypeRef { name: String },

    #[error("no converter named '{name}' is registered")]
    UnknownConverter { name: String },

    #[error("the converter '{converter}' is not compatible with the type '{type_name}'")]
    IncompatibleConverter { converter: String, type_name: String },

    #[error("the converter factory '{factory}' cannot return a null or factory value")]
    InvalidFactoryResult { factory: String },

    #[error("no descriptor available for type '{type_name}'")]
    NoMetadata { type_name: String },

    #[error("type '{type_name}' has no parameterless creator")]
    NoCreator { type_name: String },

    #[error("expected {expected} for type '{type_name}'")]
    TypeMismatch {
        type_name: String,
        expected: &'static str,
    },
}

// ----------------------------- Diagnostics -------------------------------- //

/// Non-fatal findings; first-definition-wins and skip-and-continue semantics
/// are decided by the walker, this is just the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A reachable type has no supported shape; no unit was produced for it
    /// and dependents substitute a null-descriptor sentinel.
    TypeNotSupported { type_name: String },
    /// Two distinct types mapped to the same generated identifier; the first
    /// definition stands, the later one was discarded.
    DuplicateTypeName { ident: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::TypeNotSupported { type_name } => {
                write!(f, "type '{type_name}' is not supported by generation; it was skipped")
            }
            Diagnostic::DuplicateTypeName { ident } => {
                write!(f, "duplicate generated identifier '{ident}'; the first definition was kept")
            }
        }
    }
}
