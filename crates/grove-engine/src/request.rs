//! Caller-supplied inputs of engine operations.

use grove_core::error::{GroveError, GroveResult};
use grove_core::identity::{GroupKey, UserRef};
use grove_core::models::group::{GroupField, GroupStatus};
use grove_core::models::membership::{MemberRef, MembershipType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which neighbourhood of a group to expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expansion {
    None,
    SubGroups { one_level: bool },
    ParentGroups { one_level: bool },
}

impl Expansion {
    /// Every distinct expansion; one cache entry may exist per variant.
    pub const ALL: [Expansion; 5] = [
        Self::None,
        Self::SubGroups { one_level: false },
        Self::SubGroups { one_level: true },
        Self::ParentGroups { one_level: false },
        Self::ParentGroups { one_level: true },
    ];

    /// Sub groups expand recursively unless told otherwise, parent
    /// groups one level.
    pub fn resolve(
        include_sub_groups: bool,
        include_parent_group: bool,
        one_level: Option<bool>,
    ) -> GroveResult<Self> {
        match (include_sub_groups, include_parent_group) {
            (true, true) => Err(GroveError::bad_request(
                "includeSubGroups and includeParentGroup can not be both true",
            )),
            (true, false) => Ok(Self::SubGroups {
                one_level: one_level.unwrap_or(false),
            }),
            (false, true) => Ok(Self::ParentGroups {
                one_level: one_level.unwrap_or(true),
            }),
            (false, false) => Ok(Self::None),
        }
    }

    /// Canonical JSON of the criteria this expansion stands for. Keys
    /// serialize in sorted order.
    pub fn criteria(self) -> serde_json::Value {
        let (sub, parent, one_level) = match self {
            Self::None => (false, false, false),
            Self::SubGroups { one_level } => (true, false, one_level),
            Self::ParentGroups { one_level } => (false, true, one_level),
        };
        serde_json::json!({
            "includeParentGroup": parent,
            "includeSubGroups": sub,
            "oneLevel": one_level,
        })
    }
}

fn check_page(page: Option<u64>, per_page: Option<u64>, default_per_page: u64) -> GroveResult<(u64, u64)> {
    let page = page.unwrap_or(1);
    let per_page = per_page.unwrap_or(default_per_page);
    if page < 1 {
        return Err(GroveError::bad_request("\"page\" must be larger than or equal to 1"));
    }
    if per_page < 1 {
        return Err(GroveError::bad_request("\"perPage\" must be larger than or equal to 1"));
    }
    Ok((page, per_page))
}

/// Group search criteria.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    pub old_id: Option<String>,
    pub name: Option<String>,
    pub sso_id: Option<String>,
    pub organization_id: Option<String>,
    pub self_register: Option<bool>,
    pub private_group: Option<bool>,
    pub status: Option<GroupStatus>,
    pub member_id: Option<String>,
    #[serde(rename = "universalUID")]
    pub universal_uid: Option<Uuid>,
    pub membership_type: Option<MembershipType>,
    pub include_sub_groups: bool,
    pub include_parent_group: bool,
    pub one_level: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Member a search is restricted to, before group identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemberFilter {
    Group(GroupKey),
    User(UserRef),
}

impl SearchCriteria {
    pub fn expansion(&self) -> GroveResult<Expansion> {
        Expansion::resolve(self.include_sub_groups, self.include_parent_group, self.one_level)
    }

    pub fn pagination(&self, default_per_page: u64) -> GroveResult<(u64, u64)> {
        check_page(self.page, self.per_page, default_per_page)
    }

    pub(crate) fn member_filter(&self) -> GroveResult<Option<MemberFilter>> {
        match (&self.member_id, self.universal_uid, self.membership_type) {
            (None, None, None) => Ok(None),
            (Some(_), Some(_), _) => Err(GroveError::bad_request(
                "memberId and universalUID can not be used together",
            )),
            (Some(member_id), None, Some(MembershipType::Group)) => {
                Ok(Some(MemberFilter::Group(GroupKey::parse(member_id))))
            }
            (Some(member_id), None, Some(MembershipType::User)) => {
                Ok(Some(MemberFilter::User(UserRef::Legacy(member_id.trim().to_string()))))
            }
            (None, Some(uid), Some(MembershipType::User)) => {
                Ok(Some(MemberFilter::User(UserRef::Universal(uid))))
            }
            (None, Some(_), Some(MembershipType::Group)) => Err(GroveError::bad_request(
                "universalUID can only be used with membershipType user",
            )),
            (None, None, Some(_)) => Err(GroveError::bad_request(
                "membershipType requires memberId or universalUID",
            )),
            (_, _, None) => Err(GroveError::bad_request(
                "memberId and universalUID require membershipType",
            )),
        }
    }
}

/// Options of a single group read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetCriteria {
    pub include_sub_groups: bool,
    pub include_parent_group: bool,
    pub one_level: Option<bool>,
    /// Comma separated [`GroupField`] names.
    pub fields: Option<String>,
    pub skip_cache: bool,
}

impl GetCriteria {
    pub fn sub_groups() -> Self {
        Self {
            include_sub_groups: true,
            ..Self::default()
        }
    }

    pub fn parent_groups() -> Self {
        Self {
            include_parent_group: true,
            ..Self::default()
        }
    }

    pub fn expansion(&self) -> GroveResult<Expansion> {
        Expansion::resolve(self.include_sub_groups, self.include_parent_group, self.one_level)
    }

    pub fn fields(&self) -> GroveResult<Option<Vec<GroupField>>> {
        self.fields.as_deref().map(GroupField::parse_list).transpose()
    }
}

/// Member to add to a group: exactly one of `member_id` and
/// `universal_uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSpec {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(rename = "universalUID", default)]
    pub universal_uid: Option<Uuid>,
    pub membership_type: MembershipType,
}

/// A member to add, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemberIdentity {
    Group(GroupKey),
    User(UserRef),
}

impl MemberSpec {
    pub fn group(id: impl ToString) -> Self {
        Self {
            member_id: Some(id.to_string()),
            universal_uid: None,
            membership_type: MembershipType::Group,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            member_id: Some(id.into()),
            universal_uid: None,
            membership_type: MembershipType::User,
        }
    }

    pub fn universal(uid: Uuid) -> Self {
        Self {
            member_id: None,
            universal_uid: Some(uid),
            membership_type: MembershipType::User,
        }
    }

    /// The identifier as the caller gave it.
    pub fn display_id(&self) -> String {
        match (&self.member_id, self.universal_uid) {
            (Some(id), _) => id.clone(),
            (None, Some(uid)) => uid.to_string(),
            (None, None) => String::new(),
        }
    }

    pub(crate) fn identity(&self) -> GroveResult<MemberIdentity> {
        match (&self.member_id, self.universal_uid, self.membership_type) {
            (Some(_), Some(_), _) => Err(GroveError::bad_request(
                "Only one of memberId and universalUID may be given",
            )),
            (None, None, _) => Err(GroveError::bad_request(
                "memberId or universalUID is required",
            )),
            (Some(id), None, _) if id.trim().is_empty() => {
                Err(GroveError::bad_request("\"memberId\" is not allowed to be empty"))
            }
            (Some(id), None, MembershipType::Group) => Ok(MemberIdentity::Group(GroupKey::parse(id))),
            (Some(id), None, MembershipType::User) => {
                Ok(MemberIdentity::User(UserRef::Legacy(id.trim().to_string())))
            }
            (None, Some(uid), MembershipType::User) => {
                Ok(MemberIdentity::User(UserRef::Universal(uid)))
            }
            (None, Some(_), MembershipType::Group) => Err(GroveError::bad_request(
                "universalUID can only be used with membershipType user",
            )),
        }
    }
}

/// Existing member to remove or look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberTarget {
    /// UUID-shaped ids address groups, anything else a user's legacy id.
    MemberId(String),
    Universal(Uuid),
}

impl MemberTarget {
    pub fn member_ref(&self) -> MemberRef {
        match self {
            Self::MemberId(raw) => match Uuid::parse_str(raw.trim()) {
                Ok(id) => MemberRef::Group(id),
                Err(_) => MemberRef::User(UserRef::Legacy(raw.trim().to_string())),
            },
            Self::Universal(uid) => MemberRef::User(UserRef::Universal(*uid)),
        }
    }

    pub fn display_id(&self) -> String {
        match self {
            Self::MemberId(raw) => raw.clone(),
            Self::Universal(uid) => uid.to_string(),
        }
    }
}

/// Paging of member and role listings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageCriteria {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageCriteria {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn pagination(&self, default_per_page: u64) -> GroveResult<(u64, u64)> {
        check_page(self.page, self.per_page, default_per_page)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CountCriteria {
    pub include_sub_groups: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberCountCriteria {
    pub include_sub_groups: bool,
    #[serde(rename = "universalUID")]
    pub universal_uid: Option<Uuid>,
    pub organization_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_defaults() {
        assert_eq!(
            Expansion::resolve(true, false, None).unwrap(),
            Expansion::SubGroups { one_level: false }
        );
        assert_eq!(
            Expansion::resolve(false, true, None).unwrap(),
            Expansion::ParentGroups { one_level: true }
        );
        assert_eq!(Expansion::resolve(false, false, Some(true)).unwrap(), Expansion::None);
        assert!(matches!(
            Expansion::resolve(true, true, None),
            Err(GroveError::BadRequest { .. })
        ));
    }

    #[test]
    fn search_member_filter_needs_type_and_one_id() {
        let mut criteria = SearchCriteria {
            member_id: Some("8547899".into()),
            ..SearchCriteria::default()
        };
        assert!(criteria.member_filter().is_err());

        criteria.membership_type = Some(MembershipType::User);
        assert_eq!(
            criteria.member_filter().unwrap(),
            Some(MemberFilter::User(UserRef::Legacy("8547899".into())))
        );

        criteria.universal_uid = Some(Uuid::new_v4());
        assert!(criteria.member_filter().is_err());

        let criteria = SearchCriteria {
            membership_type: Some(MembershipType::Group),
            ..SearchCriteria::default()
        };
        assert!(criteria.member_filter().is_err());
    }

    #[test]
    fn member_spec_identity() {
        let id = Uuid::new_v4();
        assert_eq!(
            MemberSpec::group(id).identity().unwrap(),
            MemberIdentity::Group(GroupKey::Id(id))
        );
        assert_eq!(
            MemberSpec::universal(id).identity().unwrap(),
            MemberIdentity::User(UserRef::Universal(id))
        );

        let both = MemberSpec {
            member_id: Some("1".into()),
            universal_uid: Some(id),
            membership_type: MembershipType::User,
        };
        assert!(both.identity().is_err());
    }

    #[test]
    fn member_target_classification() {
        let id = Uuid::new_v4();
        assert_eq!(
            MemberTarget::MemberId(id.to_string()).member_ref(),
            MemberRef::Group(id)
        );
        assert_eq!(
            MemberTarget::MemberId("42".into()).member_ref(),
            MemberRef::User(UserRef::Legacy("42".into()))
        );
    }

    #[test]
    fn zero_page_is_rejected() {
        assert!(PageCriteria::new(0, 10).pagination(20).is_err());
        assert_eq!(PageCriteria::default().pagination(20).unwrap(), (1, 20));
    }
}
