//! Error types for the Grove system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroveError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("Not found {entity} of id {id}")]
    NotFound { entity: String, id: String },

    #[error("{reason}")]
    Forbidden { reason: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Event publication failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GroveResult<T> = Result<T, GroveError>;

/// Caller-facing classification of a [`GroveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Forbidden,
    Conflict,
    ServiceUnavailable,
    Internal,
}

impl ErrorKind {
    /// HTTP status an outer surface would map this kind to.
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ServiceUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

impl GroveError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Database(_)
            | Self::Cache(_)
            | Self::Publish(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to a caller. Internal failures collapse
    /// to a generic text; the detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            ErrorKind::ServiceUnavailable => "Service unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for GroveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_variants_share_one_kind() {
        assert_eq!(GroveError::Database("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(GroveError::Publish("x".into()).kind(), ErrorKind::Internal);
        assert_eq!(GroveError::Cache("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn public_message_hides_internal_detail() {
        let err = GroveError::Database("connection refused at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.kind().status_code(), 500);

        let err = GroveError::not_found("group", "42");
        assert_eq!(err.public_message(), "Not found group of id 42");
        assert_eq!(err.kind().status_code(), 404);
    }
}
