use std::backtrace::Backtrace;
use std::num::{ParseFloatError, ParseIntError};
use std::sync::Arc;

use super::exception::ErrorCodeBacktrace;
use super::ErrorCode;

#[derive(thiserror::Error)]
enum OtherErrors {
    AnyHow { error: anyhow::Error },
}

impl std::fmt::Display for OtherErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtherErrors::AnyHow { error } => write!(f, "{}", error),
        }
    }
}

impl std::fmt::Debug for OtherErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OtherErrors::AnyHow { error } => write!(f, "{:?}", error),
        }
    }
}

impl From<anyhow::Error> for ErrorCode {
    fn from(error: anyhow::Error) -> Self {
        ErrorCode::create(
            1001,
            format!("{}, source: {:?}", error, error.source()),
            Some(Box::new(OtherErrors::AnyHow { error })),
            Some(ErrorCodeBacktrace::Origin(Arc::new(Backtrace::capture()))),
        )
    }
}

/// Transport-level failures (connect, timeout) are transient; everything else reqwest reports
/// (bad body, redirect loop, ...) is a bug on one side of the wire.
impl From<reqwest::Error> for ErrorCode {
    fn from(error: reqwest::Error) -> Self {
        let code = if error.is_connect() || error.is_timeout() || error.is_request() {
            ErrorCode::broker_unavailable_code()
        } else {
            ErrorCode::unknown_exception_code()
        };
        ErrorCode::create(
            code,
            error.to_string(),
            Some(Box::new(error)),
            Some(ErrorCodeBacktrace::Origin(Arc::new(Backtrace::capture()))),
        )
    }
}

impl From<serde_json::Error> for ErrorCode {
    fn from(error: serde_json::Error) -> Self {
        ErrorCode::IllegalArgument(format!("invalid json: {}", error))
    }
}

impl From<toml::de::Error> for ErrorCode {
    fn from(error: toml::de::Error) -> Self {
        ErrorCode::ConfigurationException(format!("invalid toml: {}", error))
    }
}

impl From<chrono::ParseError> for ErrorCode {
    fn from(error: chrono::ParseError) -> Self {
        ErrorCode::IllegalArgument(format!("invalid timestamp: {}", error))
    }
}

impl From<ParseIntError> for ErrorCode {
    fn from(error: ParseIntError) -> Self {
        ErrorCode::from_std_error(error)
    }
}

impl From<ParseFloatError> for ErrorCode {
    fn from(error: ParseFloatError) -> Self {
        ErrorCode::from_std_error(error)
    }
}

impl From<std::io::Error> for ErrorCode {
    fn from(error: std::io::Error) -> Self {
        ErrorCode::from_std_error(error)
    }
}
