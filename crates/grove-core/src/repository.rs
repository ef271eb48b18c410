//! Graph store port.
//!
//! Reads go through an un-transacted [`GraphRead`] session; every
//! mutation runs on a [`GraphTx`] that is committed or rolled back as a
//! whole. All operations are async.

use uuid::Uuid;

use crate::error::GroveResult;
use crate::identity::UserRef;
use crate::models::group::{Group, GroupStatus};
use crate::models::membership::{GroupRole, MemberRecord, MemberRef, Membership};
use crate::models::user::User;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub const DEFAULT_PER_PAGE: u64 = 20;

    /// One-based page numbering; both arguments are clamped to 1.
    pub fn page(page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        Self {
            offset: (page - 1).saturating_mul(per_page),
            limit: per_page,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::page(1, Self::DEFAULT_PER_PAGE)
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Attribute filters for group searches.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub old_id: Option<String>,
    /// Case-insensitive substring match.
    pub name: Option<String>,
    /// Case-insensitive equality.
    pub sso_id: Option<String>,
    /// Case-insensitive equality.
    pub organization_id: Option<String>,
    pub self_register: Option<bool>,
    pub private_group: Option<bool>,
    pub status: Option<GroupStatus>,
    /// Only groups that directly contain this member.
    pub member: Option<MemberRef>,
    /// Only groups that carry a legacy id.
    pub require_old_id: bool,
}

impl GroupFilter {
    /// Evaluate the attribute predicates. `member` is not considered; it
    /// needs an edge lookup.
    pub fn matches_attributes(&self, group: &Group) -> bool {
        if self.require_old_id && group.legacy_id().is_none() {
            return false;
        }
        if let Some(old_id) = &self.old_id {
            if group.old_id.as_ref() != Some(old_id) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !group.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(sso_id) = &self.sso_id {
            if !group.sso_id.eq_ignore_ascii_case(sso_id) {
                return false;
            }
        }
        if let Some(organization_id) = &self.organization_id {
            if !group.organization_id.eq_ignore_ascii_case(organization_id) {
                return false;
            }
        }
        if self.self_register.is_some_and(|v| v != group.self_register) {
            return false;
        }
        if self.private_group.is_some_and(|v| v != group.private_group) {
            return false;
        }
        if self.status.is_some_and(|s| s != group.status) {
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub trait GraphRead: Send + Sync {
    fn find_group(&self, id: Uuid) -> impl Future<Output = GroveResult<Option<Group>>> + Send;
    fn find_group_by_old_id(
        &self,
        old_id: &str,
    ) -> impl Future<Output = GroveResult<Option<Group>>> + Send;
    fn find_group_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = GroveResult<Option<Group>>> + Send;
    /// Matching groups ordered by [`Group::legacy_order`].
    fn search_groups(
        &self,
        filter: &GroupFilter,
        pagination: Pagination,
    ) -> impl Future<Output = GroveResult<PaginatedResult<Group>>> + Send;
    /// Unpaginated variant of [`GraphRead::search_groups`].
    fn list_groups(
        &self,
        filter: &GroupFilter,
    ) -> impl Future<Output = GroveResult<Vec<Group>>> + Send;
    /// Direct group-type members of `id`, in legacy order.
    fn child_groups(&self, id: Uuid) -> impl Future<Output = GroveResult<Vec<Group>>> + Send;
    /// Groups that directly contain the group `id`, in legacy order.
    fn parent_groups(&self, id: Uuid) -> impl Future<Output = GroveResult<Vec<Group>>> + Send;
    /// Groups that directly contain the given member, in legacy order.
    fn containing_groups(
        &self,
        member: &MemberRef,
    ) -> impl Future<Output = GroveResult<Vec<Group>>> + Send;
    fn find_user(&self, user: &UserRef) -> impl Future<Output = GroveResult<Option<User>>> + Send;
    /// The edge from `group_id` to `member`, if any.
    fn find_membership(
        &self,
        group_id: Uuid,
        member: &MemberRef,
    ) -> impl Future<Output = GroveResult<Option<Membership>>> + Send;
    /// User nodes directly contained in `group_id`.
    fn direct_user_members(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = GroveResult<Vec<User>>> + Send;
    fn list_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = GroveResult<PaginatedResult<MemberRecord>>> + Send;
    /// Every user-type edge pointing at `user`, with the owning group.
    fn user_memberships(
        &self,
        user: &UserRef,
    ) -> impl Future<Output = GroveResult<Vec<(Group, Membership)>>> + Send;
    /// Whether `to` is reachable from `from` along group-to-group edges.
    fn path_exists(&self, from: Uuid, to: Uuid) -> impl Future<Output = GroveResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

pub trait GraphTx: GraphRead {
    fn create_group(&mut self, group: &Group) -> impl Future<Output = GroveResult<()>> + Send;
    fn update_group(&mut self, group: &Group) -> impl Future<Output = GroveResult<()>> + Send;
    /// Remove the node together with every edge touching it.
    fn delete_group(&mut self, id: Uuid) -> impl Future<Output = GroveResult<()>> + Send;
    fn create_user(&mut self, user: &User) -> impl Future<Output = GroveResult<()>> + Send;
    fn create_membership(
        &mut self,
        group_id: Uuid,
        member: &MemberRef,
        membership: &Membership,
    ) -> impl Future<Output = GroveResult<()>> + Send;
    fn delete_membership(
        &mut self,
        group_id: Uuid,
        member: &MemberRef,
    ) -> impl Future<Output = GroveResult<()>> + Send;
    fn set_membership_roles(
        &mut self,
        membership_id: Uuid,
        roles: &[GroupRole],
    ) -> impl Future<Output = GroveResult<()>> + Send;
    fn commit(self) -> impl Future<Output = GroveResult<()>> + Send;
    fn rollback(self) -> impl Future<Output = GroveResult<()>> + Send;
}

pub trait GraphStore: Send + Sync {
    type Session: GraphRead;
    type Tx: GraphTx;

    fn session(&self) -> Self::Session;
    fn begin(&self) -> impl Future<Output = GroveResult<Self::Tx>> + Send;
}
