//! Error types for the runtime system
//!
//! Every fallible core operation returns [`Error`]. Its [`ErrorKind`] is the
//! stable, append-only status taxonomy: codes are never renumbered or reused.

use std::collections::TryReserveError;
use std::fmt;

/// Stable error classification with fixed numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generic,
    OutOfMemory,
    InvalidArgument,
    InternalInvariantViolation,
    PluginError,
    PluginSearchPathError,
}

impl ErrorKind {
    /// All kinds, in code order
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Generic,
        ErrorKind::OutOfMemory,
        ErrorKind::InvalidArgument,
        ErrorKind::InternalInvariantViolation,
        ErrorKind::PluginError,
        ErrorKind::PluginSearchPathError,
    ];

    /// Numeric status code. Success is 0, every error is negative.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Generic => -1,
            ErrorKind::OutOfMemory => -2,
            ErrorKind::InvalidArgument => -3,
            ErrorKind::InternalInvariantViolation => -4,
            ErrorKind::PluginError => -5,
            ErrorKind::PluginSearchPathError => -6,
        }
    }

    /// Look up a kind by its numeric code
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Symbolic name of the kind
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Generic => "ERR",
            ErrorKind::OutOfMemory => "ERR_MALLOC",
            ErrorKind::InvalidArgument => "ERR_ARG",
            ErrorKind::InternalInvariantViolation => "ERR_BUG",
            ErrorKind::PluginError => "ERR_PLUGIN",
            ErrorKind::PluginSearchPathError => "ERR_DECODERS_DIR",
        }
    }

    /// Human-readable description of the kind
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Generic => "generic/unspecified error",
            ErrorKind::OutOfMemory => "memory allocation error",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::InternalInvariantViolation => "internal error",
            ErrorKind::PluginError => "decoder logic error",
            ErrorKind::PluginSearchPathError => "invalid decoder search path",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Error type for all core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error("Allocation failed: {0}")]
    OutOfMemory(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Bug(String),

    #[error("Decoder logic error: {0}")]
    Plugin(String),

    #[error("Decoder search path error: {0}")]
    SearchPath(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Generic(_) => ErrorKind::Generic,
            Error::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Bug(_) => ErrorKind::InternalInvariantViolation,
            Error::Plugin(_) => ErrorKind::PluginError,
            Error::SearchPath(_) => ErrorKind::PluginSearchPathError,
        }
    }

    /// Numeric status code of this error
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    pub(crate) fn arg(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

impl From<TryReserveError> for Error {
    fn from(e: TryReserveError) -> Self {
        Error::OutOfMemory(e.to_string())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by decoder logic hooks
#[derive(Debug, thiserror::Error)]
pub enum LogicError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl LogicError {
    /// Convenience constructor for provider-side failures
    pub fn msg(msg: impl Into<String>) -> Self {
        LogicError::Failed(msg.into())
    }
}

/// Result type for decoder logic hooks
pub type LogicResult<T = ()> = std::result::Result<T, LogicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::Generic.code(), -1);
        assert_eq!(ErrorKind::OutOfMemory.code(), -2);
        assert_eq!(ErrorKind::InvalidArgument.code(), -3);
        assert_eq!(ErrorKind::InternalInvariantViolation.code(), -4);
        assert_eq!(ErrorKind::PluginError.code(), -5);
        assert_eq!(ErrorKind::PluginSearchPathError.code(), -6);
    }

    #[test]
    fn test_from_code_roundtrips_every_kind() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(-7), None);
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(Error::arg("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(Error::Plugin("x".into()).code(), -5);
        assert_eq!(
            Error::Bug("x".into()).kind().name(),
            "ERR_BUG"
        );
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_memory() {
        let mut v: Vec<u8> = Vec::new();
        let err: Error = v.try_reserve(usize::MAX).unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    }
}
