//! Error types for conversion sessions and option access.

use std::fmt;

use thiserror::Error;

use crate::flat::Kind;
use crate::options::OptionType;

/// Model element an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Objective(usize),
    Constraint(usize),
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Objective(index) => write!(f, "objective #{index}"),
            Element::Constraint(index) => write!(f, "constraint #{index}"),
        }
    }
}

/// Errors raised by option registration and access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("Unknown solver option \"{name}\"")]
    UnknownOption { name: String },

    #[error("Option \"{name}\" is already registered")]
    DuplicateOption { name: String },

    #[error("Option \"{name}\" is not of type \"{found}\" (declared as \"{expected}\")")]
    OptionTypeMismatch {
        name: String,
        expected: OptionType,
        found: OptionType,
    },

    #[error("Invalid value \"{value}\" for option \"{name}\"")]
    InvalidOptionValue { name: String, value: String },

    #[error("Cannot access option \"{name}\": {message}")]
    Access { name: String, message: String },
}

impl OptionError {
    pub fn code(&self) -> &'static str {
        match self {
            OptionError::UnknownOption { .. } => "OPTION_UNKNOWN",
            OptionError::DuplicateOption { .. } => "OPTION_DUPLICATE",
            OptionError::OptionTypeMismatch { .. } => "OPTION_TYPE_MISMATCH",
            OptionError::InvalidOptionValue { .. } => "OPTION_INVALID_VALUE",
            OptionError::Access { .. } => "OPTION_ACCESS",
        }
    }
}

/// Errors surfaced by a [`crate::session::Session`].
///
/// Every variant names the backend it came from.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{backend}: {element} of kind {kind} is not supported")]
    UnsupportedConstruct {
        backend: String,
        element: Element,
        kind: Kind,
    },

    #[error("{backend}: cannot {operation} in state {state}")]
    LifecycleViolation {
        backend: String,
        state: &'static str,
        operation: &'static str,
    },

    #[error("{backend}: cannot {operation}, the modification phase was aborted")]
    ModificationAborted {
        backend: String,
        operation: &'static str,
    },

    #[error("{backend}: {operation} failed: {message}")]
    NativeFailure {
        backend: String,
        operation: &'static str,
        message: String,
    },

    #[error("{backend}: {source}")]
    Option {
        backend: String,
        #[source]
        source: OptionError,
    },
}

impl ConvertError {
    pub fn code(&self) -> &'static str {
        match self {
            ConvertError::UnsupportedConstruct { .. } => "UNSUPPORTED_CONSTRUCT",
            ConvertError::LifecycleViolation { .. } => "LIFECYCLE_VIOLATION",
            ConvertError::ModificationAborted { .. } => "MODIFICATION_ABORTED",
            ConvertError::NativeFailure { .. } => "NATIVE_FAILURE",
            ConvertError::Option { source, .. } => source.code(),
        }
    }

    pub fn backend(&self) -> &str {
        match self {
            ConvertError::UnsupportedConstruct { backend, .. }
            | ConvertError::LifecycleViolation { backend, .. }
            | ConvertError::ModificationAborted { backend, .. }
            | ConvertError::NativeFailure { backend, .. }
            | ConvertError::Option { backend, .. } => backend,
        }
    }
}
