//! Mixed-identity resolution.
//!
//! Groups are addressed either by their UUID or by the legacy numeric id
//! carried over from the previous system; users by legacy id or by a
//! universal UID. Callers parse raw input once and hand the typed key to
//! the engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a group as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Id(Uuid),
    Legacy(String),
}

impl GroupKey {
    /// UUID-shaped input is a primary id, anything else a legacy id.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Legacy(raw.to_string()),
        }
    }
}

impl From<Uuid> for GroupKey {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Legacy(old_id) => f.write_str(old_id),
        }
    }
}

/// Identifier of a user: legacy id or universal UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserRef {
    Legacy(String),
    Universal(Uuid),
}

impl UserRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(uid) => Self::Universal(uid),
            Err(_) => Self::Legacy(raw.to_string()),
        }
    }

    pub fn legacy_id(&self) -> Option<&str> {
        match self {
            Self::Legacy(id) => Some(id),
            Self::Universal(_) => None,
        }
    }

    pub fn universal_uid(&self) -> Option<Uuid> {
        match self {
            Self::Universal(uid) => Some(*uid),
            Self::Legacy(_) => None,
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(id) => f.write_str(id),
            Self::Universal(uid) => write!(f, "{uid}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_input_is_primary_id() {
        let id = Uuid::new_v4();
        assert_eq!(GroupKey::parse(&id.to_string()), GroupKey::Id(id));
        assert_eq!(GroupKey::parse("20000145"), GroupKey::Legacy("20000145".into()));
    }

    #[test]
    fn user_ref_classification() {
        let uid = Uuid::new_v4();
        assert_eq!(UserRef::parse(&uid.to_string()), UserRef::Universal(uid));
        assert_eq!(UserRef::parse(" 8547899 ").legacy_id(), Some("8547899"));
        assert_eq!(UserRef::parse("8547899").universal_uid(), None);
    }
}
