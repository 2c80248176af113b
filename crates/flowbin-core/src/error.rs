//! Module: error
//! Responsibility: structured failure taxonomy shared by field lists and both engines.
//! Does not own: recovery policy; callers decide whether to destroy or rebuild an engine.
//! Boundary: every public fallible operation in this crate returns `GroupError`.

use std::{fmt, io};
use thiserror::Error as ThisError;

///
/// GroupError
///
/// Structured grouping failure with a stable class and origin.
/// Resource classes (`Io`, `Corruption`, `Source`) leave the reporting engine
/// usable only for `destroy`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct GroupError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Underlying I/O failure, when one caused this error.
    #[source]
    pub source: Option<io::Error>,
}

impl GroupError {
    /// Construct a GroupError without an underlying I/O cause.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            source: None,
        }
    }

    /// Construct a configuration error for a specific origin.
    pub(crate) fn configuration(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, origin, message)
    }

    /// Construct a lifecycle (call-order) error for a specific origin.
    pub(crate) fn lifecycle(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Lifecycle, origin, message)
    }

    /// Construct an I/O error carrying its cause.
    pub(crate) fn io(origin: ErrorOrigin, message: impl Into<String>, err: io::Error) -> Self {
        Self {
            source: Some(err),
            ..Self::new(ErrorClass::Io, origin, message)
        }
    }

    /// Construct a run-file I/O error.
    pub(crate) fn run_file_io(message: impl Into<String>, err: io::Error) -> Self {
        Self::io(ErrorOrigin::RunFile, message, err)
    }

    /// Construct a run-file corruption error.
    pub(crate) fn run_file_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::RunFile, message)
    }

    /// Construct a failure reported by a caller-owned flow source.
    pub(crate) fn source_read(message: impl Into<String>, err: io::Error) -> Self {
        Self {
            source: Some(err),
            ..Self::new(ErrorClass::Source, ErrorOrigin::PresortedEngine, message)
        }
    }

    /// Return whether this error poisons the engine that produced it.
    #[must_use]
    pub const fn is_resource(&self) -> bool {
        matches!(
            self.class,
            ErrorClass::Io | ErrorClass::Corruption | ErrorClass::Source
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<FieldError> for GroupError {
    fn from(err: FieldError) -> Self {
        Self::configuration(ErrorOrigin::FieldList, err.to_string())
    }
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    Configuration,
    Lifecycle,
    Io,
    Corruption,
    Source,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Lifecycle => "lifecycle",
            Self::Io => "io",
            Self::Corruption => "corruption",
            Self::Source => "source",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorOrigin {
    FieldList,
    HashEngine,
    PresortedEngine,
    RunFile,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FieldList => "field_list",
            Self::HashEngine => "hash_engine",
            Self::PresortedEngine => "presorted_engine",
            Self::RunFile => "run_file",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// FieldError
///
/// Failures local to one field list.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FieldError {
    #[error("caller field must have a non-zero width")]
    ZeroWidth,

    #[error("initial value is {actual} bytes but the field is {expected} bytes wide")]
    InitialValueWidth { expected: usize, actual: usize },

    #[error("field entry {index} belongs to a different field list")]
    ForeignEntry { index: usize },

    #[error("buffer of {actual} bytes is too short for field list of {expected} bytes")]
    BufferTooShort { expected: usize, actual: usize },
}

///
/// TESTS
///
