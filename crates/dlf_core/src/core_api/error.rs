use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    Serialization,
    NotFound,
    Ambiguous,
    OutOfRange,
    UnknownCurrency,
    InvalidEnum,
    InvalidTier,
}

/// Coarse grouping of error codes, for callers that only need to know
/// which kind of failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Address,
    Validation,
    Io,
}

impl CoreErrorCode {
    pub fn category(&self) -> ErrorCategory {
        match *self {
            Self::Parse => ErrorCategory::Parse,
            Self::NotFound | Self::Ambiguous | Self::InvalidTier => ErrorCategory::Address,
            Self::OutOfRange | Self::UnknownCurrency | Self::InvalidEnum => ErrorCategory::Validation,
            Self::Io | Self::Serialization => ErrorCategory::Io,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}
