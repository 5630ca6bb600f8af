use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { message: String },

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("Workspace I/O failed")]
    Workspace(#[source] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Failures while running an external tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while waiting for {tool}")]
    Wait {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status})")]
    NonZeroExit {
        tool: &'static str,
        status: String,
        /// Tail of stderr (or stdout) for logs; never sent to clients.
        diagnostics: String,
    },

    #[error("{tool} did not produce an output PDF")]
    MissingOutput { tool: &'static str },

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: &'static str, after: Duration },
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } | ServiceError::FileTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Tool(ToolError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Tool(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Workspace(_) | ServiceError::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable error kind reported to clients and used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation { .. } | ServiceError::FileTooLarge { .. } => {
                "validation_error"
            }
            ServiceError::Tool(ToolError::Timeout { .. }) => "timeout",
            ServiceError::Tool(_) => "tool_failure",
            ServiceError::Workspace(_) | ServiceError::Config { .. } => "internal_error",
        }
    }

    /// Message safe to show to a client. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServiceError::Workspace(_) | ServiceError::Config { .. } => {
                "Internal error while processing the document".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(kind = self.kind(), error = ?self, "Request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "Request rejected");
        }

        let response = ErrorResponse {
            kind: self.kind(),
            message: self.public_message(),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
