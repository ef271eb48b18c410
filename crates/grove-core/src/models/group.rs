//! Group domain model.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GroveError, GroveResult};

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 150;
pub const DESCRIPTION_MIN_LEN: usize = 3;
pub const DESCRIPTION_MAX_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    #[default]
    Active,
    InActive,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::InActive => "inactive",
        }
    }
}

impl FromStr for GroupStatus {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::InActive),
            other => Err(GroveError::bad_request(format!(
                "Invalid group status: {other}"
            ))),
        }
    }
}

/// A node of the containment graph. Groups contain users and other
/// groups; `name` is unique across the whole graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    /// Legacy numeric identity. Groups without one are not yet visible
    /// to search and cannot receive members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub private_group: bool,
    pub self_register: bool,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sso_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Group {
    /// The legacy id, treating an empty string as absent.
    pub fn legacy_id(&self) -> Option<&str> {
        self.old_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.status == GroupStatus::Active
    }

    /// Canonical ordering of group listings: legacy id ascending, groups
    /// without one last, name as tie-breaker.
    pub fn legacy_order(a: &Group, b: &Group) -> Ordering {
        match (a.legacy_id(), b.legacy_id()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.name.cmp(&b.name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private_group: bool,
    #[serde(default)]
    pub self_register: bool,
    pub domain: Option<String>,
    pub sso_id: Option<String>,
    pub organization_id: Option<String>,
    pub status: Option<GroupStatus>,
}

impl CreateGroup {
    pub fn validate(&self) -> GroveResult<()> {
        validate_fields(&self.name, self.description.as_deref())
    }
}

/// Full replacement of a group's mutable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub private_group: bool,
    #[serde(default)]
    pub self_register: bool,
    pub domain: Option<String>,
    pub sso_id: Option<String>,
    pub organization_id: Option<String>,
    pub status: Option<GroupStatus>,
    pub old_id: Option<String>,
}

impl UpdateGroup {
    pub fn validate(&self) -> GroveResult<()> {
        validate_fields(&self.name, self.description.as_deref())
    }
}

/// Partial update. Only legacy id assignment is supported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchGroup {
    pub old_id: Option<String>,
}

impl PatchGroup {
    pub fn validate(&self) -> GroveResult<()> {
        match self.old_id.as_deref().map(str::trim) {
            Some(old_id) if !old_id.is_empty() => Ok(()),
            _ => Err(GroveError::bad_request("\"oldId\" is required")),
        }
    }
}

fn validate_fields(name: &str, description: Option<&str>) -> GroveResult<()> {
    let len = name.trim().chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(GroveError::bad_request(format!(
            "\"name\" length must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"
        )));
    }
    if let Some(description) = description {
        let len = description.chars().count();
        if !(DESCRIPTION_MIN_LEN..=DESCRIPTION_MAX_LEN).contains(&len) {
            return Err(GroveError::bad_request(format!(
                "\"description\" length must be between {DESCRIPTION_MIN_LEN} and {DESCRIPTION_MAX_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// A group with its expanded neighbourhood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTree {
    #[serde(flatten)]
    pub group: Group,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_groups: Option<Vec<GroupTree>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_groups: Option<Vec<GroupTree>>,
    /// Ids of every group reached by a sub-group expansion, root included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten_group_id_tree: Option<Vec<Uuid>>,
}

impl GroupTree {
    pub fn leaf(group: Group) -> Self {
        Self {
            group,
            sub_groups: None,
            parent_groups: None,
            flatten_group_id_tree: None,
        }
    }
}

/// Fields a caller may project a group response down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    Id,
    CreatedAt,
    CreatedBy,
    UpdatedAt,
    UpdatedBy,
    Name,
    Description,
    PrivateGroup,
    SelfRegister,
    Domain,
    OrganizationId,
    OldId,
}

impl GroupField {
    pub const ALL: [GroupField; 12] = [
        Self::Id,
        Self::CreatedAt,
        Self::CreatedBy,
        Self::UpdatedAt,
        Self::UpdatedBy,
        Self::Name,
        Self::Description,
        Self::PrivateGroup,
        Self::SelfRegister,
        Self::Domain,
        Self::OrganizationId,
        Self::OldId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CreatedAt => "createdAt",
            Self::CreatedBy => "createdBy",
            Self::UpdatedAt => "updatedAt",
            Self::UpdatedBy => "updatedBy",
            Self::Name => "name",
            Self::Description => "description",
            Self::PrivateGroup => "privateGroup",
            Self::SelfRegister => "selfRegister",
            Self::Domain => "domain",
            Self::OrganizationId => "organizationId",
            Self::OldId => "oldId",
        }
    }

    /// Parse a comma separated field list such as `"id,name,oldId"`.
    /// Unknown and repeated names are rejected.
    pub fn parse_list(raw: &str) -> GroveResult<Vec<GroupField>> {
        let mut fields = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let field: GroupField = name.parse()?;
            if fields.contains(&field) {
                return Err(GroveError::bad_request(format!(
                    "Duplicate field: {name}"
                )));
            }
            fields.push(field);
        }
        Ok(fields)
    }
}

impl FromStr for GroupField {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| GroveError::bad_request(format!("Field name {s} is not allowed")))
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing rendering of a group: an optional field projection and
/// the visibility of `status` applied on top of a [`GroupTree`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_register: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sso_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GroupStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_groups: Option<Vec<GroupTree>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_groups: Option<Vec<GroupTree>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten_group_id_tree: Option<Vec<Uuid>>,
}

impl GroupView {
    /// Render `tree`. With `fields`, only the listed attributes survive;
    /// the expansion lists are always kept. `status` is dropped unless
    /// `include_status`.
    pub fn project(tree: GroupTree, fields: Option<&[GroupField]>, include_status: bool) -> Self {
        let keep = |field: GroupField| fields.is_none_or(|fs| fs.contains(&field));
        let GroupTree {
            group,
            sub_groups,
            parent_groups,
            flatten_group_id_tree,
        } = tree;

        Self {
            id: keep(GroupField::Id).then_some(group.id),
            old_id: group.old_id.filter(|_| keep(GroupField::OldId)),
            name: keep(GroupField::Name).then_some(group.name),
            description: group.description.filter(|_| keep(GroupField::Description)),
            private_group: keep(GroupField::PrivateGroup).then_some(group.private_group),
            self_register: keep(GroupField::SelfRegister).then_some(group.self_register),
            domain: keep(GroupField::Domain).then_some(group.domain),
            sso_id: fields.is_none().then_some(group.sso_id),
            organization_id: keep(GroupField::OrganizationId).then_some(group.organization_id),
            status: (include_status && fields.is_none()).then_some(group.status),
            created_at: keep(GroupField::CreatedAt).then_some(group.created_at),
            created_by: group.created_by.filter(|_| keep(GroupField::CreatedBy)),
            updated_at: group.updated_at.filter(|_| keep(GroupField::UpdatedAt)),
            updated_by: group.updated_by.filter(|_| keep(GroupField::UpdatedBy)),
            sub_groups,
            parent_groups,
            flatten_group_id_tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(old_id: Option<&str>, name: &str) -> Group {
        Group {
            id: Uuid::new_v4(),
            old_id: old_id.map(str::to_string),
            name: name.to_string(),
            description: Some("sample group".into()),
            private_group: false,
            self_register: true,
            domain: String::new(),
            sso_id: String::new(),
            organization_id: "org-1".into(),
            status: GroupStatus::Active,
            created_at: Utc::now(),
            created_by: Some("admin".into()),
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn field_list_rejects_unknown_and_duplicates() {
        let fields = GroupField::parse_list("id, name,oldId").unwrap();
        assert_eq!(fields, vec![GroupField::Id, GroupField::Name, GroupField::OldId]);

        let err = GroupField::parse_list("id,password").unwrap_err();
        assert!(matches!(err, GroveError::BadRequest { .. }));

        let err = GroupField::parse_list("name,name").unwrap_err();
        assert!(matches!(err, GroveError::BadRequest { .. }));
    }

    #[test]
    fn projection_keeps_expansions() {
        let mut tree = GroupTree::leaf(sample(Some("1"), "root"));
        tree.sub_groups = Some(vec![GroupTree::leaf(sample(Some("2"), "child"))]);

        let view = GroupView::project(tree, Some(&[GroupField::Name]), true);
        assert_eq!(view.name.as_deref(), Some("root"));
        assert!(view.id.is_none());
        assert!(view.status.is_none());
        assert_eq!(view.sub_groups.map(|s| s.len()), Some(1));
    }

    #[test]
    fn status_hidden_from_non_admins() {
        let tree = GroupTree::leaf(sample(Some("1"), "root"));
        assert!(GroupView::project(tree.clone(), None, false).status.is_none());
        assert_eq!(
            GroupView::project(tree, None, true).status,
            Some(GroupStatus::Active)
        );
    }

    #[test]
    fn legacy_order_puts_unassigned_last() {
        let mut groups = vec![
            sample(None, "a"),
            sample(Some("20"), "b"),
            sample(Some("10"), "c"),
        ];
        groups.sort_by(Group::legacy_order);
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    #[test]
    fn name_and_description_bounds() {
        let mut input = CreateGroup {
            name: "ab".into(),
            ..Default::default()
        };
        assert!(input.validate().is_err());
        input.name = "abc".into();
        assert!(input.validate().is_ok());
        input.description = Some("x".into());
        assert!(input.validate().is_err());
    }

    #[test]
    fn status_round_trips_lowercase() {
        let json = serde_json::to_string(&GroupStatus::InActive).unwrap();
        assert_eq!(json, "\"inactive\"");
        assert_eq!("active".parse::<GroupStatus>().unwrap(), GroupStatus::Active);
    }
}
