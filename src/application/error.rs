use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::LoadError,
    domain::error::DomainError,
    infra::{
        engine::{EngineError, PoolError},
        error::InfraError,
    },
};

/// Failure classes a caller can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    InvalidOption,
    PoolExhausted,
    RenderTimeout,
    RenderFailure,
    InternalFault,
}

impl ErrorKind {
    /// Stable wire code.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidOption => "INVALID_OPTION",
            Self::PoolExhausted => "POOL_EXHAUSTED",
            Self::RenderTimeout => "RENDER_TIMEOUT",
            Self::RenderFailure => "RENDER_ERROR",
            Self::InternalFault => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::InvalidOption => 422,
            Self::PoolExhausted => 503,
            Self::RenderTimeout => 504,
            Self::RenderFailure | Self::InternalFault => 500,
        }
    }

    /// Label used for the `result` dimension of render metrics.
    pub fn metric_label(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidOption => "invalid_option",
            Self::PoolExhausted => "pool_exhausted",
            Self::RenderTimeout => "timeout",
            Self::RenderFailure => "render_error",
            Self::InternalFault => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct RenderError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl RenderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    fn with_source(kind: ErrorKind, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalFault, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.message.clone(),
        }
    }
}

impl From<DomainError> for RenderError {
    fn from(error: DomainError) -> Self {
        let kind = match &error {
            DomainError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DomainError::InvalidOption { .. } => ErrorKind::InvalidOption,
            DomainError::Invariant { .. } => ErrorKind::InternalFault,
        };
        Self::with_source(kind, error)
    }
}

impl From<EngineError> for RenderError {
    fn from(error: EngineError) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::RenderTimeout
        } else {
            ErrorKind::RenderFailure
        };
        Self::with_source(kind, error)
    }
}

impl From<PoolError> for RenderError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Engine(engine) => engine.into(),
            PoolError::Exhausted { .. } => Self::with_source(ErrorKind::PoolExhausted, error),
            PoolError::Closed => Self::with_source(ErrorKind::InternalFault, error),
        }
    }
}

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Errors that end the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        Self::Render(error.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(error))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn domain_errors_map_to_client_kinds() {
        let err = RenderError::from(DomainError::invalid_input("text must not be empty"));
        assert_eq!(err.code(), "INVALID_INPUT");
        assert_eq!(err.http_status(), 400);

        let err = RenderError::from(DomainError::invalid_option("font_size", "out of range"));
        assert_eq!(err.kind(), ErrorKind::InvalidOption);
        assert_eq!(err.http_status(), 422);
        assert!(err.message().contains("font_size"));
    }

    #[test]
    fn engine_and_pool_errors_map_to_server_kinds() {
        let err = RenderError::from(EngineError::timeout(Duration::from_millis(50)));
        assert_eq!(err.code(), "RENDER_TIMEOUT");
        assert_eq!(err.http_status(), 504);

        let err = RenderError::from(PoolError::Engine(EngineError::capture("blank")));
        assert_eq!(err.code(), "RENDER_ERROR");

        let err = RenderError::from(PoolError::Exhausted { waited_ms: 10 });
        assert_eq!(err.code(), "POOL_EXHAUSTED");
        assert_eq!(err.http_status(), 503);
        assert!(err.source.is_some());
    }

    #[test]
    fn body_carries_code_and_message() {
        let body = RenderError::invalid_input("batch has no items").body();
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            serde_json::json!({"code": "INVALID_INPUT", "message": "batch has no items"})
        );
    }
}
