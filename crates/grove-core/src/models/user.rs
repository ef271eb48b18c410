//! User domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserRef;

/// A user node. Users are created the first time a group references
/// them and carry only the identifier they were referenced by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "universalUID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub universal_uid: Option<Uuid>,
}

impl User {
    pub fn from_ref(user: &UserRef) -> Self {
        match user {
            UserRef::Legacy(id) => Self {
                id: Some(id.clone()),
                universal_uid: None,
            },
            UserRef::Universal(uid) => Self {
                id: None,
                universal_uid: Some(*uid),
            },
        }
    }

    pub fn matches(&self, user: &UserRef) -> bool {
        match user {
            UserRef::Legacy(id) => self.id.as_deref() == Some(id.as_str()),
            UserRef::Universal(uid) => self.universal_uid == Some(*uid),
        }
    }

    /// Key under which membership edges address this node: the legacy id
    /// when present, the universal UID otherwise.
    pub fn node_key(&self) -> String {
        match (&self.id, self.universal_uid) {
            (Some(id), _) => id.clone(),
            (None, Some(uid)) => uid.to_string(),
            (None, None) => String::new(),
        }
    }
}
