//! The caller on whose behalf an operation runs.

use grove_core::identity::UserRef;
use serde::{Deserialize, Serialize};

/// Decoded token claims relevant to authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub is_machine: bool,
    pub user_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl AuthContext {
    pub fn machine<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self {
            is_machine: true,
            user_id: None,
            roles: Vec::new(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn user<S: Into<String>>(user_id: impl Into<String>, roles: impl IntoIterator<Item = S>) -> Self {
        Self {
            is_machine: false,
            user_id: Some(user_id.into()),
            roles: roles.into_iter().map(Into::into).collect(),
            scopes: Vec::new(),
        }
    }

    /// Value recorded in `createdBy`/`updatedBy`. Machine writes carry
    /// no audit identity.
    pub fn audit_id(&self) -> Option<String> {
        if self.is_machine {
            None
        } else {
            self.user_id.clone()
        }
    }

    /// The acting user as a graph reference, for human actors.
    pub fn user_ref(&self) -> Option<UserRef> {
        if self.is_machine {
            return None;
        }
        self.user_id.as_deref().map(UserRef::parse)
    }
}

/// Privilege class of an [`AuthContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Machine,
    Admin,
    User,
}

impl Actor {
    /// Machines and administrators bypass group-scoped checks.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Machine | Self::Admin)
    }
}
