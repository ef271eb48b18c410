//! Authorization error types.

use grove_core::error::GroveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("You are not allowed to perform this action!")]
    NotAllowed,

    #[error("Only administrators can perform this action")]
    AdminRequired,

    #[error("The token does not grant {0} access to groups")]
    MissingScope(&'static str),

    #[error("You are not allowed to access this group")]
    PrivateGroup,
}

impl From<AuthError> for GroveError {
    fn from(err: AuthError) -> Self {
        GroveError::Forbidden {
            reason: err.to_string(),
        }
    }
}
