use thiserror::Error;

/// Fallback message when a failed response carries no readable error body.
pub const FALLBACK_ERROR_MESSAGE: &str = "API request failed";

/// Message used when an action needs a current chat session and none is loaded.
pub const NO_ACTIVE_SESSION_MESSAGE: &str = "no active session";

/// Failure of the durable key-value store that holds the bearer token.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

/// Every failure surfaced by the gateway and the stores.
///
/// `Display` always yields the human-readable message, which is what the
/// stores record in their `error` field.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// HTTP 401. The token has already been cleared when this is returned.
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{}", NO_ACTIVE_SESSION_MESSAGE)]
    NoActiveSession,

    #[error("Token storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_server_message_only() {
        let err = ApiError::Api {
            status: 400,
            code: Some("VALIDATION_ERROR".to_string()),
            message: "username is too short".to_string(),
            details: None,
        };
        assert_eq!(err.to_string(), "username is too short");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn no_active_session_has_fixed_message() {
        assert_eq!(ApiError::NoActiveSession.to_string(), "no active session");
        assert_eq!(ApiError::NoActiveSession.status(), None);
    }

    #[test]
    fn unauthorized_reports_401() {
        let err = ApiError::Unauthorized {
            message: "invalid token".to_string(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
    }
}
