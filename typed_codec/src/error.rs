use std::num::TryFromIntError;
use std::string::FromUtf8Error;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // A type handed to an adapter lacks a capability the adapter requires.
    // Raised while the adapter (or a record definition) is being created.
    #[error("'{found}' has to be {expected}")]
    TypeConstraint { found: String, expected: String },
    // The value passed to build is not exactly the type the adapter was created for.
    #[error("'{value}' has to be of type {expected} {path}")]
    EncodeType {
        value: String,
        expected: String,
        path: String,
    },
    #[error("expected {expected} but got {found} {path}")]
    Const {
        expected: String,
        found: String,
        path: String,
    },
    #[error("size cannot be determined: {reason} {path}")]
    SizeIndeterminate { reason: String, path: String },
    // There was insufficient data to successfully parse the value.
    // The parameter indicates how many more bytes were required.
    #[error("insufficient data, {0} more bytes required")]
    InsufficientData(usize),
    #[error("expected end of stream, {0} bytes remain")]
    NotTerminated(usize),
    #[error("integer out of range: {0}")]
    IntTooLarge(#[from] TryFromIntError),
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    #[error("no value for field '{name}' {path}")]
    MissingField { name: String, path: String },
    #[error("expected {expected}, found {found}")]
    ValueType { expected: String, found: String },
    #[error("expected {expected} elements, found {found} {path}")]
    Count {
        expected: usize,
        found: usize,
        path: String,
    },
    #[error("cannot evaluate expression: {0}")]
    Expression(String),
    #[error("{record}: {reason}")]
    Construction { record: String, reason: String },

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn type_constraint(found: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeConstraint {
            found: found.into(),
            expected: expected.into(),
        }
    }

    pub fn value_type(expected: impl Into<String>, found: impl std::fmt::Debug) -> Self {
        Self::ValueType {
            expected: expected.into(),
            found: format!("{:?}", found),
        }
    }

    pub fn construction(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            record: record.into(),
            reason: reason.into(),
        }
    }

    pub fn is_type_constraint(&self) -> bool {
        matches!(self, Self::TypeConstraint { .. })
    }

    pub fn is_encode_type(&self) -> bool {
        matches!(self, Self::EncodeType { .. })
    }

    /// Size queries fail with this when a field's length is only known at
    /// parse/build time. Callers treat it as "size unknown".
    pub fn is_size_indeterminate(&self) -> bool {
        matches!(self, Self::SizeIndeterminate { .. })
    }
}
