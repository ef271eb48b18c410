//! Containment edges: adding and removing members, member listings,
//! distinct-member counts and ancestor queries.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use grove_auth::{Access, AuthContext, AuthorizationPolicy};
use grove_core::cache::Cache;
use grove_core::error::{GroveError, GroveResult};
use grove_core::events::EventPublisher;
use grove_core::identity::{GroupKey, UserRef};
use grove_core::models::group::{Group, GroupStatus};
use grove_core::models::membership::{
    MemberNode, MemberRecord, MemberRef, Membership, MembershipType,
};
use grove_core::models::user::User;
use grove_core::repository::{GraphRead, GraphStore, GraphTx, GroupFilter, Pagination};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::CacheCoordinator;
use crate::config::EngineConfig;
use crate::events;
use crate::request::{
    CountCriteria, MemberCountCriteria, MemberIdentity, MemberSpec, MemberTarget, PageCriteria,
};
use crate::resolve::{designates, find_group, resolve_group};
use crate::response::{
    BulkItem, BulkResult, BulkStatus, DeletedMembership, GroupMemberCount, MemberCount,
    MembershipResult, Page, ValidityCheck,
};
use crate::traversal;
use crate::tx::finish;

fn bulk_item(member_id: String, outcome: GroveResult<()>) -> BulkItem {
    match outcome {
        Ok(()) => BulkItem {
            member_id,
            status: BulkStatus::Success,
            message: None,
        },
        Err(e) => BulkItem {
            member_id,
            status: BulkStatus::Failed,
            message: Some(e.public_message()),
        },
    }
}

pub struct MembershipGraph<S, C, P> {
    store: Arc<S>,
    cache: Arc<CacheCoordinator<C>>,
    publisher: Arc<P>,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<EngineConfig>,
}

impl<S, C, P> MembershipGraph<S, C, P>
where
    S: GraphStore,
    C: Cache,
    P: EventPublisher,
{
    pub fn new(
        store: Arc<S>,
        cache: Arc<CacheCoordinator<C>>,
        publisher: Arc<P>,
        policy: Arc<AuthorizationPolicy>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            policy,
            config,
        }
    }

    /// Add a user or group to `key`. The `member.add` event is published
    /// before commit; a publication failure rolls the edge back.
    pub async fn add_member(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        spec: &MemberSpec,
    ) -> GroveResult<MembershipResult> {
        self.policy.require_scope(ctx, Access::Write)?;
        let identity = spec.identity()?;
        debug!(group = %key, member = %spec.display_id(), "Adding member");

        let mut tx = self.store.begin().await?;
        let result = self.add_member_in(&mut tx, ctx, key, identity).await;
        let (group, added) = finish(tx, result).await?;
        if spec.membership_type == MembershipType::Group {
            self.cache
                .evict_with_ancestors(&self.store.session(), &group, self.config.max_traversal_depth)
                .await;
        }
        info!(group_id = %group.id, membership_id = %added.id, "Member added");
        Ok(added)
    }

    async fn add_member_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        key: &GroupKey,
        identity: MemberIdentity,
    ) -> GroveResult<(Group, MembershipResult)> {
        // 1. Parent group, which must carry a legacy id.
        let group = resolve_group(&*tx, key, self.policy.is_privileged(ctx)).await?;
        if group.legacy_id().is_none() {
            return Err(GroveError::forbidden(
                "Parent group is not ready yet, try after sometime",
            ));
        }

        // 2. Authorization.
        let user_member = match &identity {
            MemberIdentity::User(user) => Some(user),
            MemberIdentity::Group(_) => None,
        };
        self.policy
            .authorize_member_change(&*tx, ctx, &group, user_member)
            .await?;

        // 3. Member validation. All reads happen before the first write.
        let mut child = None;
        let mut missing_user = None;
        let member = match identity {
            MemberIdentity::Group(child_key) => {
                if designates(&child_key, &group) {
                    return Err(GroveError::bad_request("A group can not add to itself."));
                }
                let found = find_group(&*tx, &child_key)
                    .await?
                    .ok_or_else(|| GroveError::not_found("Group", child_key.to_string()))?;
                if group.private_group && !found.private_group {
                    return Err(GroveError::conflict(
                        "Parent group is private, the child group must be private too.",
                    ));
                }
                let member = MemberRef::Group(found.id);
                child = Some(found);
                member
            }
            MemberIdentity::User(user) => {
                if tx.find_user(&user).await?.is_none() {
                    missing_user = Some(User::from_ref(&user));
                }
                MemberRef::User(user)
            }
        };

        // 4. Uniqueness of the edge.
        if tx.find_membership(group.id, &member).await?.is_some() {
            return Err(GroveError::conflict("The member is already in the group"));
        }

        // 5. Acyclicity: the new parent must not be reachable from the child.
        if let Some(child) = &child {
            if tx.path_exists(child.id, group.id).await? {
                return Err(GroveError::conflict("There is cyclical group reference"));
            }
        }

        // 6. Writes.
        if let Some(user) = &missing_user {
            tx.create_user(user).await?;
        }
        let membership = Membership {
            id: Uuid::new_v4(),
            membership_type: member.membership_type(),
            created_at: Utc::now(),
            created_by: ctx.audit_id(),
            roles: Vec::new(),
        };
        tx.create_membership(group.id, &member, &membership).await?;

        let result = MembershipResult {
            id: membership.id,
            group_id: group.id,
            old_id: group.old_id.clone(),
            name: group.name.clone(),
            created_at: membership.created_at,
            created_by: membership.created_by.clone(),
            member_id: match &member {
                MemberRef::Group(id) => Some(id.to_string()),
                MemberRef::User(user) => user.legacy_id().map(str::to_string),
            },
            universal_uid: match &member {
                MemberRef::User(user) => user.universal_uid(),
                MemberRef::Group(_) => None,
            },
            member_old_id: child.as_ref().and_then(|c| c.old_id.clone()),
            membership_type: membership.membership_type,
        };
        self.publisher
            .publish(&self.config.topics.member_add, events::member_added(&result)?)
            .await?;
        Ok((group, result))
    }

    /// Remove the edge from `key` to `target`.
    pub async fn delete_member(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        target: &MemberTarget,
    ) -> GroveResult<DeletedMembership> {
        self.policy.require_scope(ctx, Access::Write)?;
        let member = target.member_ref();
        debug!(group = %key, member = %member, "Deleting member");

        let mut tx = self.store.begin().await?;
        let result = self.delete_member_in(&mut tx, ctx, key, &member).await;
        let (group, deleted) = finish(tx, result).await?;
        if matches!(member, MemberRef::Group(_)) {
            self.cache
                .evict_with_ancestors(&self.store.session(), &group, self.config.max_traversal_depth)
                .await;
        }
        info!(group_id = %group.id, member = %member, "Member deleted");
        Ok(deleted)
    }

    async fn delete_member_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        key: &GroupKey,
        member: &MemberRef,
    ) -> GroveResult<(Group, DeletedMembership)> {
        let group = resolve_group(&*tx, key, self.policy.is_privileged(ctx)).await?;
        let user_member = match member {
            MemberRef::User(user) => Some(user),
            MemberRef::Group(_) => None,
        };
        self.policy
            .authorize_member_change(&*tx, ctx, &group, user_member)
            .await?;

        if tx.find_membership(group.id, member).await?.is_none() {
            return Err(GroveError::not_found("Membership", member.to_string()));
        }
        let (member_id, universal_uid) = match member {
            MemberRef::Group(id) => {
                let old_id = tx.find_group(*id).await?.and_then(|g| g.old_id);
                (old_id, None)
            }
            MemberRef::User(UserRef::Legacy(id)) => (Some(id.clone()), None),
            MemberRef::User(UserRef::Universal(uid)) => {
                let user = tx.find_user(&UserRef::Universal(*uid)).await?;
                (user.and_then(|u| u.id), Some(*uid))
            }
        };

        tx.delete_membership(group.id, member).await?;
        let deleted = DeletedMembership {
            group_id: group.id,
            name: group.name.clone(),
            old_id: group.old_id.clone(),
            member_id,
            universal_uid,
        };
        self.publisher
            .publish(&self.config.topics.member_delete, events::member_deleted(&deleted)?)
            .await?;
        Ok((group, deleted))
    }

    /// Add every member in its own transaction, concurrently.
    pub async fn bulk_add(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        members: &[MemberSpec],
    ) -> BulkResult {
        let outcomes = join_all(members.iter().map(|spec| self.add_member(ctx, key, spec))).await;
        let members = members
            .iter()
            .zip(outcomes)
            .map(|(spec, outcome)| bulk_item(spec.display_id(), outcome.map(|_| ())))
            .collect();
        BulkResult {
            group_id: key.to_string(),
            members,
        }
    }

    /// Remove every member in its own transaction, concurrently.
    pub async fn bulk_delete(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        members: &[MemberTarget],
    ) -> BulkResult {
        let outcomes =
            join_all(members.iter().map(|target| self.delete_member(ctx, key, target))).await;
        let members = members
            .iter()
            .zip(outcomes)
            .map(|(target, outcome)| bulk_item(target.display_id(), outcome.map(|_| ())))
            .collect();
        BulkResult {
            group_id: key.to_string(),
            members,
        }
    }

    /// Direct members of a group with their edges, oldest first.
    pub async fn get_members(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        criteria: &PageCriteria,
    ) -> GroveResult<Page<MemberRecord>> {
        self.policy.require_scope(ctx, Access::Read)?;
        let (page, per_page) = criteria.pagination(self.config.default_per_page)?;

        let session = self.store.session();
        let group = resolve_group(&session, key, self.policy.is_privileged(ctx)).await?;
        self.policy.authorize_read(&session, ctx, &group).await?;

        let found = session
            .list_members(group.id, Pagination::page(page, per_page))
            .await?;
        Ok(Page {
            result: found.items,
            page,
            per_page,
            total: found.total,
        })
    }

    pub async fn get_member(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        target: &MemberTarget,
    ) -> GroveResult<MemberRecord> {
        self.policy.require_scope(ctx, Access::Read)?;

        let session = self.store.session();
        let group = resolve_group(&session, key, self.policy.is_privileged(ctx)).await?;
        self.policy.authorize_read(&session, ctx, &group).await?;

        let member = target.member_ref();
        let not_in_group = || GroveError::not_found("Membership", member.to_string());
        let membership = session
            .find_membership(group.id, &member)
            .await?
            .ok_or_else(not_in_group)?;
        let node = match &member {
            MemberRef::Group(id) => session.find_group(*id).await?.map(MemberNode::Group),
            MemberRef::User(user) => session.find_user(user).await?.map(MemberNode::User),
        };
        Ok(MemberRecord {
            group_id: group.id,
            membership,
            member: node.ok_or_else(not_in_group)?,
        })
    }

    /// Distinct users of a group, optionally through its sub groups.
    pub async fn count_members(
        &self,
        key: &GroupKey,
        criteria: &CountCriteria,
    ) -> GroveResult<MemberCount> {
        let session = self.store.session();
        let group = resolve_group(&session, key, true).await?;
        let count = self
            .count_users(&session, &group, criteria.include_sub_groups)
            .await?;
        Ok(MemberCount { count })
    }

    async fn count_users(
        &self,
        session: &S::Session,
        group: &Group,
        include_sub_groups: bool,
    ) -> GroveResult<u64> {
        if include_sub_groups {
            traversal::count_descendant_users(session, group.id, self.config.max_traversal_depth)
                .await
        } else {
            let users: BTreeSet<String> = session
                .direct_user_members(group.id)
                .await?
                .iter()
                .map(User::node_key)
                .collect();
            Ok(users.len() as u64)
        }
    }

    /// Member counts of every active group carrying a legacy id, ordered
    /// by legacy id.
    pub async fn list_groups_member_count(
        &self,
        criteria: &MemberCountCriteria,
    ) -> GroveResult<Vec<GroupMemberCount>> {
        let session = self.store.session();
        let filter = GroupFilter {
            organization_id: criteria.organization_id.clone(),
            status: Some(GroupStatus::Active),
            require_old_id: true,
            ..GroupFilter::default()
        };
        let mut groups = session.list_groups(&filter).await?;

        if let Some(uid) = criteria.universal_uid {
            let member = MemberRef::User(UserRef::Universal(uid));
            let containing: BTreeSet<Uuid> = if criteria.include_sub_groups {
                traversal::ancestor_groups(&session, &member, self.config.max_traversal_depth)
                    .await?
                    .iter()
                    .map(|g| g.id)
                    .collect()
            } else {
                session
                    .containing_groups(&member)
                    .await?
                    .iter()
                    .map(|g| g.id)
                    .collect()
            };
            groups.retain(|g| containing.contains(&g.id));
        }

        let mut counts = Vec::with_capacity(groups.len());
        for group in groups {
            let count = self
                .count_users(&session, &group, criteria.include_sub_groups)
                .await?;
            if let Some(old_id) = group.legacy_id() {
                counts.push(GroupMemberCount {
                    id: group.id,
                    old_id: old_id.to_string(),
                    count,
                });
            }
        }
        counts.sort_by(|a, b| a.old_id.cmp(&b.old_id));
        Ok(counts)
    }

    /// Active ancestor groups of a member that carry a legacy id, sorted
    /// and de-duplicated. Legacy ids are returned unless `uuid`.
    pub async fn list_member_groups(
        &self,
        ctx: &AuthContext,
        target: &MemberTarget,
        uuid: bool,
    ) -> GroveResult<Vec<String>> {
        self.policy.require_scope(ctx, Access::Read)?;
        let ancestors = self.ancestor_groups(&target.member_ref()).await?;
        let ids: BTreeSet<String> = ancestors
            .iter()
            .filter_map(|g| {
                if uuid {
                    Some(g.id.to_string())
                } else {
                    g.legacy_id().map(str::to_string)
                }
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Whether the group with legacy id `old_id` is an ancestor of the
    /// member.
    pub async fn group_validity_check(
        &self,
        target: &MemberTarget,
        old_id: &str,
    ) -> GroveResult<ValidityCheck> {
        let ancestors = self.ancestor_groups(&target.member_ref()).await?;
        Ok(ValidityCheck {
            check: ancestors.iter().any(|g| g.legacy_id() == Some(old_id)),
        })
    }

    async fn ancestor_groups(&self, member: &MemberRef) -> GroveResult<Vec<Group>> {
        let session = self.store.session();
        let mut ancestors =
            traversal::ancestor_groups(&session, member, self.config.max_traversal_depth).await?;
        ancestors.retain(|g| g.is_active() && g.legacy_id().is_some());
        Ok(ancestors)
    }
}
