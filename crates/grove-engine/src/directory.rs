//! Group lifecycle: search, read, create, update, patch, delete, and
//! sub-group management.

use std::sync::Arc;

use chrono::Utc;
use grove_auth::{Access, AuthContext, AuthorizationPolicy};
use grove_core::cache::Cache;
use grove_core::error::{GroveError, GroveResult};
use grove_core::events::EventPublisher;
use grove_core::identity::GroupKey;
use grove_core::models::group::{
    CreateGroup, Group, GroupStatus, GroupTree, GroupView, PatchGroup, UpdateGroup,
};
use grove_core::models::membership::{MemberRef, Membership, MembershipType};
use grove_core::repository::{GraphRead, GraphStore, GraphTx, GroupFilter, Pagination};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CacheCoordinator;
use crate::config::EngineConfig;
use crate::events;
use crate::request::{Expansion, GetCriteria, MemberFilter, SearchCriteria};
use crate::resolve::{find_group, resolve_group};
use crate::response::Page;
use crate::traversal::{self, Direction, GroupHierarchy};
use crate::tx::finish;

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn build_group(data: CreateGroup, created_by: Option<String>) -> Group {
    Group {
        id: Uuid::new_v4(),
        old_id: None,
        name: data.name,
        description: data.description,
        private_group: data.private_group,
        self_register: data.self_register,
        domain: data.domain.unwrap_or_default(),
        sso_id: data.sso_id.unwrap_or_default(),
        organization_id: data.organization_id.unwrap_or_default(),
        status: data.status.unwrap_or_default(),
        created_at: Utc::now(),
        created_by,
        updated_at: None,
        updated_by: None,
    }
}

async fn ensure_name_free<R: GraphRead>(reader: &R, name: &str, owner: Option<Uuid>) -> GroveResult<()> {
    match reader.find_group_by_name(name).await? {
        Some(existing) if Some(existing.id) != owner => Err(GroveError::conflict(format!(
            "The group name {name} is already used"
        ))),
        _ => Ok(()),
    }
}

/// A private group may only contain private groups, whichever side of
/// the edge changes its flag.
async fn ensure_privacy_contained<R: GraphRead>(
    reader: &R,
    id: Uuid,
    private_group: bool,
) -> GroveResult<()> {
    if private_group {
        if reader.child_groups(id).await?.iter().any(|c| !c.private_group) {
            return Err(GroveError::conflict(
                "The group contains public sub groups and can not become private.",
            ));
        }
    } else if reader.parent_groups(id).await?.iter().any(|p| p.private_group) {
        return Err(GroveError::conflict(
            "The group belongs to a private group and must stay private.",
        ));
    }
    Ok(())
}

/// Expand `group` per `expansion` into a tree.
pub(crate) async fn load_tree<R: GraphRead>(
    reader: &R,
    group: Group,
    expansion: Expansion,
    max_depth: usize,
) -> GroveResult<GroupTree> {
    let (direction, one_level) = match expansion {
        Expansion::None => return Ok(GroupTree::leaf(group)),
        Expansion::SubGroups { one_level } => (Direction::Down, one_level),
        Expansion::ParentGroups { one_level } => (Direction::Up, one_level),
    };
    let hierarchy = GroupHierarchy::expand(reader, group, direction, one_level, max_depth).await?;
    Ok(hierarchy.into_tree())
}

pub struct GroupDirectory<S, C, P> {
    store: Arc<S>,
    cache: Arc<CacheCoordinator<C>>,
    publisher: Arc<P>,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<EngineConfig>,
}

impl<S, C, P> GroupDirectory<S, C, P>
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

    /// Search groups that carry a legacy id, ordered by legacy id.
    /// Non-privileged callers only see active groups, without `status`.
    pub async fn search(
        &self,
        ctx: &AuthContext,
        criteria: &SearchCriteria,
    ) -> GroveResult<Page<GroupView>> {
        self.policy.require_scope(ctx, Access::Read)?;
        let expansion = criteria.expansion()?;
        let (page, per_page) = criteria.pagination(self.config.default_per_page)?;
        let member_filter = criteria.member_filter()?;
        let privileged = self.policy.is_privileged(ctx);
        debug!(page, per_page, "Searching groups");

        let session = self.store.session();
        let member = match member_filter {
            None => None,
            Some(MemberFilter::User(user)) => Some(MemberRef::User(user)),
            Some(MemberFilter::Group(key)) => match find_group(&session, &key).await? {
                Some(group) => Some(MemberRef::Group(group.id)),
                None => {
                    return Ok(Page {
                        result: Vec::new(),
                        page,
                        per_page,
                        total: 0,
                    });
                }
            },
        };

        let filter = GroupFilter {
            old_id: criteria.old_id.clone(),
            name: criteria.name.clone(),
            sso_id: criteria.sso_id.clone(),
            organization_id: criteria.organization_id.clone(),
            self_register: criteria.self_register,
            private_group: criteria.private_group,
            status: if privileged {
                criteria.status
            } else {
                Some(GroupStatus::Active)
            },
            member,
            require_old_id: true,
        };
        let found = session
            .search_groups(&filter, Pagination::page(page, per_page))
            .await?;

        let mut result = Vec::with_capacity(found.items.len());
        for group in found.items {
            let tree = load_tree(&session, group, expansion, self.config.max_traversal_depth).await?;
            result.push(GroupView::project(tree, None, privileged));
        }
        Ok(Page {
            result,
            page,
            per_page,
            total: found.total,
        })
    }

    /// Read one group, served from the cache unless `skip_cache`.
    pub async fn get(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        criteria: &GetCriteria,
    ) -> GroveResult<GroupView> {
        self.policy.require_scope(ctx, Access::Read)?;
        let expansion = criteria.expansion()?;
        let fields = criteria.fields()?;
        let privileged = self.policy.is_privileged(ctx);

        let session = self.store.session();
        let group = resolve_group(&session, key, privileged).await?;
        self.policy.authorize_read(&session, ctx, &group).await?;

        let cached = if criteria.skip_cache {
            None
        } else {
            self.cache.lookup(&group, expansion).await
        };
        let tree = match cached {
            Some(tree) => tree,
            None => {
                let tree =
                    load_tree(&session, group, expansion, self.config.max_traversal_depth).await?;
                self.cache.store(&tree, expansion).await;
                tree
            }
        };
        Ok(GroupView::project(tree, fields.as_deref(), privileged))
    }

    pub async fn create(&self, ctx: &AuthContext, data: CreateGroup) -> GroveResult<Group> {
        self.policy.require_privileged(ctx, Access::Write)?;
        data.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.create_in(&mut tx, ctx, data).await;
        let group = finish(tx, result).await?;
        info!(group_id = %group.id, name = %group.name, "Group created");
        Ok(group)
    }

    async fn create_in(&self, tx: &mut S::Tx, ctx: &AuthContext, data: CreateGroup) -> GroveResult<Group> {
        ensure_name_free(&*tx, &data.name, None).await?;
        let group = build_group(data, ctx.audit_id());
        tx.create_group(&group).await?;
        self.publisher
            .publish(&self.config.topics.group_create, events::group_created(&group)?)
            .await?;
        Ok(group)
    }

    /// Replace every mutable field of a group.
    pub async fn update(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        data: UpdateGroup,
    ) -> GroveResult<Group> {
        self.policy.require_privileged(ctx, Access::Write)?;
        data.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.update_in(&mut tx, ctx, key, data).await;
        let (before, after) = finish(tx, result).await?;
        self.cache
            .evict(after.id, &[before.legacy_id(), after.legacy_id()])
            .await;
        self.evict_ancestors(&after).await;
        info!(group_id = %after.id, "Group updated");
        Ok(after)
    }

    async fn update_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        key: &GroupKey,
        data: UpdateGroup,
    ) -> GroveResult<(Group, Group)> {
        let before = resolve_group(&*tx, key, true).await?;
        if data.name != before.name {
            ensure_name_free(&*tx, &data.name, Some(before.id)).await?;
        }
        if data.private_group != before.private_group {
            ensure_privacy_contained(&*tx, before.id, data.private_group).await?;
        }
        let after = Group {
            id: before.id,
            old_id: none_if_empty(data.old_id),
            name: data.name,
            description: data.description,
            private_group: data.private_group,
            self_register: data.self_register,
            domain: data.domain.unwrap_or_default(),
            sso_id: data.sso_id.unwrap_or_default(),
            organization_id: data.organization_id.unwrap_or_default(),
            status: data.status.unwrap_or(before.status),
            created_at: before.created_at,
            created_by: before.created_by.clone(),
            updated_at: Some(Utc::now()),
            updated_by: ctx.audit_id(),
        };
        tx.update_group(&after).await?;
        self.publisher
            .publish(
                &self.config.topics.group_update,
                events::group_updated(&after, &before.name)?,
            )
            .await?;
        Ok((before, after))
    }

    /// Assign a group's legacy id, then refresh its cached sub-group
    /// expansion.
    pub async fn patch(
        &self,
        ctx: &AuthContext,
        key: &GroupKey,
        data: PatchGroup,
    ) -> GroveResult<Group> {
        self.policy.require_privileged(ctx, Access::Write)?;
        data.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.patch_in(&mut tx, ctx, key, data).await;
        let (before, after) = finish(tx, result).await?;
        self.cache
            .evict(after.id, &[before.legacy_id(), after.legacy_id()])
            .await;
        self.evict_ancestors(&after).await;
        self.refresh(&after).await;
        info!(group_id = %after.id, old_id = ?after.old_id, "Group patched");
        Ok(after)
    }

    async fn patch_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        key: &GroupKey,
        data: PatchGroup,
    ) -> GroveResult<(Group, Group)> {
        let before = resolve_group(&*tx, key, true).await?;
        let after = Group {
            old_id: none_if_empty(data.old_id.map(|o| o.trim().to_string())),
            updated_at: Some(Utc::now()),
            updated_by: ctx.audit_id(),
            ..before.clone()
        };
        tx.update_group(&after).await?;
        self.publisher
            .publish(
                &self.config.topics.group_update,
                events::group_updated(&after, &before.name)?,
            )
            .await?;
        Ok((before, after))
    }

    async fn evict_ancestors(&self, group: &Group) {
        self.cache
            .evict_with_ancestors(&self.store.session(), group, self.config.max_traversal_depth)
            .await;
    }

    /// Re-read `group` with sub groups expanded and cache the result.
    async fn refresh(&self, group: &Group) {
        let session = self.store.session();
        let expansion = Expansion::SubGroups { one_level: false };
        let fresh = match find_group(&session, &GroupKey::Id(group.id)).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => return,
            Err(e) => {
                warn!(group_id = %group.id, error = %e, "Cache refresh failed");
                return;
            }
        };
        match load_tree(&session, fresh, expansion, self.config.max_traversal_depth).await {
            Ok(tree) => self.cache.store(&tree, expansion).await,
            Err(e) => warn!(group_id = %group.id, error = %e, "Cache refresh failed"),
        }
    }

    /// Delete a group and every descendant left without another parent.
    pub async fn delete(&self, ctx: &AuthContext, key: &GroupKey) -> GroveResult<Group> {
        self.policy.require_privileged(ctx, Access::Write)?;

        let mut tx = self.store.begin().await?;
        let result = self.delete_in(&mut tx, key).await;
        let (deleted, ancestors) = finish(tx, result).await?;
        self.cache.evict_all(&deleted).await;
        self.cache.evict_all(&ancestors).await;
        info!(count = deleted.len(), "Groups deleted");
        deleted
            .into_iter()
            .next()
            .ok_or_else(|| GroveError::Internal("empty delete cascade".into()))
    }

    async fn delete_in(
        &self,
        tx: &mut S::Tx,
        key: &GroupKey,
    ) -> GroveResult<(Vec<Group>, Vec<Group>)> {
        let root = resolve_group(&*tx, key, true).await?;
        let ancestors = traversal::ancestor_groups(
            &*tx,
            &MemberRef::Group(root.id),
            self.config.max_traversal_depth,
        )
        .await?;
        let deleted = traversal::cascade_set(&*tx, root, self.config.max_traversal_depth).await?;
        debug!(count = deleted.len(), "Delete cascade computed");
        for group in &deleted {
            tx.delete_group(group.id).await?;
        }
        self.publisher
            .publish(
                &self.config.topics.group_delete,
                events::groups_deleted(&deleted)?,
            )
            .await?;
        Ok((deleted, ancestors))
    }

    /// Create a group directly under `parent_key`.
    pub async fn create_sub_group(
        &self,
        ctx: &AuthContext,
        parent_key: &GroupKey,
        data: CreateGroup,
    ) -> GroveResult<Group> {
        self.policy.require_scope(ctx, Access::Write)?;
        data.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.create_sub_group_in(&mut tx, ctx, parent_key, data).await;
        let (parent, sub_group) = finish(tx, result).await?;
        self.evict_ancestors(&parent).await;
        info!(parent_id = %parent.id, group_id = %sub_group.id, "Sub group created");
        Ok(sub_group)
    }

    async fn create_sub_group_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        parent_key: &GroupKey,
        data: CreateGroup,
    ) -> GroveResult<(Group, Group)> {
        // 1. Parent and authorization.
        let parent = resolve_group(&*tx, parent_key, self.policy.is_privileged(ctx)).await?;
        self.policy.authorize_sub_group_change(&*tx, ctx, &parent).await?;

        // 2. Validation against the current graph.
        ensure_name_free(&*tx, &data.name, None).await?;
        if parent.private_group && !data.private_group {
            return Err(GroveError::conflict(
                "Parent group is private, the sub group must be private too.",
            ));
        }

        // 3. Group node and containment edge.
        let sub_group = build_group(data, ctx.audit_id());
        let membership = Membership {
            id: Uuid::new_v4(),
            membership_type: MembershipType::Group,
            created_at: Utc::now(),
            created_by: ctx.audit_id(),
            roles: Vec::new(),
        };
        tx.create_group(&sub_group).await?;
        tx.create_membership(parent.id, &MemberRef::Group(sub_group.id), &membership)
            .await?;

        self.publisher
            .publish(
                &self.config.topics.subgroup_create,
                events::subgroup_created(membership.id, parent.id, &sub_group)?,
            )
            .await?;
        Ok((parent, sub_group))
    }

    /// Detach `sub_key` from `parent_key` and delete it with its
    /// cascade. Returns the parent.
    pub async fn delete_sub_group(
        &self,
        ctx: &AuthContext,
        parent_key: &GroupKey,
        sub_key: &GroupKey,
    ) -> GroveResult<Group> {
        self.policy.require_scope(ctx, Access::Write)?;

        let mut tx = self.store.begin().await?;
        let result = self.delete_sub_group_in(&mut tx, ctx, parent_key, sub_key).await;
        let (parent, deleted) = finish(tx, result).await?;
        self.evict_ancestors(&parent).await;
        self.cache.evict_all(&deleted).await;
        info!(parent_id = %parent.id, count = deleted.len(), "Sub group deleted");
        Ok(parent)
    }

    async fn delete_sub_group_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        parent_key: &GroupKey,
        sub_key: &GroupKey,
    ) -> GroveResult<(Group, Vec<Group>)> {
        let privileged = self.policy.is_privileged(ctx);
        let parent = resolve_group(&*tx, parent_key, privileged).await?;
        self.policy.authorize_sub_group_change(&*tx, ctx, &parent).await?;
        let sub_group = resolve_group(&*tx, sub_key, privileged).await?;

        let edge = MemberRef::Group(sub_group.id);
        if tx.find_membership(parent.id, &edge).await?.is_none() {
            return Err(GroveError::bad_request(format!(
                "The group {} is not a sub group of {}",
                sub_group.id, parent.id
            )));
        }
        let deleted =
            traversal::cascade_set(&*tx, sub_group, self.config.max_traversal_depth).await?;

        tx.delete_membership(parent.id, &edge).await?;
        for group in &deleted {
            tx.delete_group(group.id).await?;
        }
        self.publisher
            .publish(
                &self.config.topics.subgroup_delete,
                events::subgroup_deleted(parent.id, &deleted)?,
            )
            .await?;
        Ok((parent, deleted))
    }

    /// One-row query used as a liveness probe of the store.
    pub async fn probe(&self) -> GroveResult<u64> {
        let found = self
            .store
            .session()
            .search_groups(&GroupFilter::default(), Pagination::page(1, 1))
            .await?;
        Ok(found.total)
    }
}
