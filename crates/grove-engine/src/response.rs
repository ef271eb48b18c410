//! Results returned by engine operations.

use chrono::{DateTime, Utc};
use grove_core::models::membership::{GroupRoleName, MembershipType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of a listing. `result` is empty past the last page while
/// `total` still counts every match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub result: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// A newly created membership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResult {
    pub id: Uuid,
    pub group_id: Uuid,
    pub old_id: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(rename = "universalUID", default, skip_serializing_if = "Option::is_none")]
    pub universal_uid: Option<Uuid>,
    /// Legacy id of a group member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_old_id: Option<String>,
    pub membership_type: MembershipType,
}

/// A removed membership edge. For group members `member_id` is the
/// member's legacy id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMembership {
    pub group_id: Uuid,
    pub name: String,
    pub old_id: Option<String>,
    pub member_id: Option<String>,
    #[serde(rename = "universalUID", default, skip_serializing_if = "Option::is_none")]
    pub universal_uid: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItem {
    pub member_id: String,
    pub status: BulkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Per-member outcome of a bulk operation, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub group_id: String,
    pub members: Vec<BulkItem>,
}

impl BulkResult {
    pub fn failures(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.status == BulkStatus::Failed)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCount {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberCount {
    pub id: Uuid,
    pub old_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityCheck {
    pub check: bool,
}

/// A group role held by a user, flattened out of its membership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRoleEntry {
    pub group_id: Uuid,
    pub role: GroupRoleName,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}
