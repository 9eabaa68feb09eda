//! Dispatch failure taxonomy.
//!
//! [`DispatchFailure`] is recoverable and feeds the fallback chain.
//! [`DispatchError`] is what is left once the chain gives up.

use axum::http::StatusCode;

/// Numeric failure codes shared with the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NotFound = 1,
    CacheDirNotWritable = 8,
    Other = 16,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Why a single dispatch attempt did not reach a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchFailure {
    #[error("no controller registered as {controller:?}")]
    HandlerNotFound { controller: String },

    #[error("controller {controller} has no action {action:?}")]
    ActionNotFound { controller: String, action: String },

    #[error("{controller}/{action} takes {required} to {total} parameters, {supplied} supplied")]
    ArityMismatch {
        controller: String,
        action: String,
        required: usize,
        total: usize,
        supplied: usize,
    },
}

impl DispatchFailure {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchFailure::HandlerNotFound { .. } => "handler_not_found",
            DispatchFailure::ActionNotFound { .. } => "action_not_found",
            DispatchFailure::ArityMismatch { .. } => "arity_mismatch",
        }
    }
}

/// Error returned by an action while it runs.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The controller does not implement an action it declared.
    #[error("action {0:?} is not implemented")]
    UnknownAction(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

pub const NOT_FOUND_MESSAGE: &str = "The page you requested could not be found.";

/// Terminal failure of a request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Dispatch failed and no error controller is configured.
    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        cause: DispatchFailure,
    },

    /// Dispatch failed and so did the error controller's `notFound` action.
    #[error("{message} ({route} also failed: {fallback})")]
    FallbackExhausted {
        message: String,
        route: String,
        primary: DispatchFailure,
        #[source]
        fallback: DispatchFailure,
    },

    /// The action ran and returned an error.
    #[error("{controller}/{action} failed: {source}")]
    Handler {
        controller: String,
        action: String,
        #[source]
        source: HandlerError,
    },
}

impl DispatchError {
    pub fn not_found(cause: DispatchFailure) -> Self {
        DispatchError::NotFound {
            message: NOT_FOUND_MESSAGE.to_string(),
            cause,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::NotFound { .. } | DispatchError::FallbackExhausted { .. } => {
                ErrorCode::NotFound
            }
            DispatchError::Handler { .. } => ErrorCode::Other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = DispatchError::not_found(DispatchFailure::HandlerNotFound {
            controller: "Blog".into(),
        });
        assert_eq!(err.code().as_u32(), 1);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), NOT_FOUND_MESSAGE);
    }

    #[test]
    fn handler_error_is_500() {
        let err = DispatchError::Handler {
            controller: "Blog".into(),
            action: "show".into(),
            source: HandlerError::msg("database down"),
        };
        assert_eq!(err.code(), ErrorCode::Other);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("database down"));
    }

    #[test]
    fn arity_message_is_readable() {
        let failure = DispatchFailure::ArityMismatch {
            controller: "Blog".into(),
            action: "show".into(),
            required: 1,
            total: 2,
            supplied: 3,
        };
        assert_eq!(failure.kind(), "arity_mismatch");
        assert_eq!(
            failure.to_string(),
            "Blog/show takes 1 to 2 parameters, 3 supplied"
        );
    }
}
