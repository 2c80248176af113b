use flowbin_core::error::{ErrorClass, GroupError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<GroupError> for Error {
    fn from(err: GroupError) -> Self {
        let kind = match err.class {
            ErrorClass::Configuration => ErrorKind::Configuration,
            ErrorClass::Lifecycle => ErrorKind::Usage,
            ErrorClass::Io | ErrorClass::Corruption | ErrorClass::Source => ErrorKind::Resource,
        };
        let message = match &err.source {
            Some(cause) => format!("{}: {cause}", err.message),
            None => err.message.clone(),
        };

        Self::new(kind, err.origin.into(), message)
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Fields or limits are invalid; fix the configuration and retry.
    Configuration,

    /// An operation was called out of order.
    Usage,

    /// Temporary storage or a flow source failed. The engine only accepts `destroy`.
    Resource,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    FieldList,
    Engine,
    Storage,
    Config,
}

impl From<flowbin_core::error::ErrorOrigin> for ErrorOrigin {
    fn from(origin: flowbin_core::error::ErrorOrigin) -> Self {
        use flowbin_core::error::ErrorOrigin as CoreOrigin;

        match origin {
            CoreOrigin::FieldList => Self::FieldList,
            CoreOrigin::HashEngine | CoreOrigin::PresortedEngine => Self::Engine,
            CoreOrigin::RunFile => Self::Storage,
            CoreOrigin::Config => Self::Config,
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FieldList => "field_list",
            Self::Engine => "engine",
            Self::Storage => "storage",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use flowbin_core::error::ErrorOrigin as CoreOrigin;
    use std::io;

    #[test]
    fn resource_classes_collapse_into_one_kind() {
        for class in [ErrorClass::Io, ErrorClass::Corruption, ErrorClass::Source] {
            let err = Error::from(GroupError::new(class, CoreOrigin::RunFile, "boom"));

            assert_eq!(err.kind, ErrorKind::Resource);
            assert_eq!(err.origin, ErrorOrigin::Storage);
        }
    }

    #[test]
    fn io_cause_is_folded_into_the_message() {
        let mut core = GroupError::new(ErrorClass::Io, CoreOrigin::HashEngine, "spill failed");
        core.source = Some(io::Error::new(io::ErrorKind::NotFound, "no such directory"));

        let err = Error::from(core);

        assert_eq!(err.origin, ErrorOrigin::Engine);
        assert_eq!(err.to_string(), "spill failed: no such directory");
    }
}
