//! Membership (containment edge) domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GroveError;
use crate::identity::UserRef;
use crate::models::group::Group;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    Group,
    User,
}

impl MembershipType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }
}

impl FromStr for MembershipType {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "user" => Ok(Self::User),
            other => Err(GroveError::bad_request(format!(
                "Invalid membership type: {other}"
            ))),
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group-local roles a user can hold on its membership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupRoleName {
    GroupManager,
    GroupAdmin,
}

impl GroupRoleName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GroupManager => "groupManager",
            Self::GroupAdmin => "groupAdmin",
        }
    }
}

impl FromStr for GroupRoleName {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groupManager" => Ok(Self::GroupManager),
            "groupAdmin" => Ok(Self::GroupAdmin),
            other => Err(GroveError::bad_request(format!(
                "Invalid group role: {other}"
            ))),
        }
    }
}

impl fmt::Display for GroupRoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRole {
    pub role: GroupRoleName,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// The `Contains` edge from a group to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub membership_type: MembershipType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<GroupRole>,
}

impl Membership {
    pub fn has_role(&self, role: GroupRoleName) -> bool {
        self.roles.iter().any(|r| r.role == role)
    }

    pub fn has_any_role(&self, roles: &[GroupRoleName]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

/// Target of a membership edge, after identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Group(Uuid),
    User(UserRef),
}

impl MemberRef {
    pub fn membership_type(&self) -> MembershipType {
        match self {
            Self::Group(_) => MembershipType::Group,
            Self::User(_) => MembershipType::User,
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "{id}"),
            Self::User(user) => write!(f, "{user}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MemberNode {
    Group(Group),
    User(User),
}

/// A direct member of a group together with its edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub group_id: Uuid,
    pub membership: Membership,
    pub member: MemberNode,
}
