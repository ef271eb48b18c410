//! Group-local roles held on user membership edges.

use std::sync::Arc;

use chrono::Utc;
use grove_auth::{Access, AuthContext, AuthError, AuthorizationPolicy};
use grove_core::error::{GroveError, GroveResult};
use grove_core::events::EventPublisher;
use grove_core::identity::{GroupKey, UserRef};
use grove_core::models::membership::{GroupRole, GroupRoleName, MemberRef, Membership};
use grove_core::repository::{GraphRead, GraphStore, GraphTx, Pagination};
use tracing::info;

use crate::config::EngineConfig;
use crate::events;
use crate::request::PageCriteria;
use crate::resolve::resolve_group;
use crate::response::{GroupRoleEntry, Page};
use crate::tx::finish;

pub struct GroupRoles<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
    policy: Arc<AuthorizationPolicy>,
    config: Arc<EngineConfig>,
}

impl<S, P> GroupRoles<S, P>
where
    S: GraphStore,
    P: EventPublisher,
{
    pub fn new(
        store: Arc<S>,
        publisher: Arc<P>,
        policy: Arc<AuthorizationPolicy>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            publisher,
            policy,
            config,
        }
    }

    /// Roles a user holds across all groups, ordered by group id then
    /// role. Users may list their own roles; anyone else needs privilege.
    pub async fn list_roles(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        criteria: &PageCriteria,
    ) -> GroveResult<Page<GroupRoleEntry>> {
        self.policy.require_scope(ctx, Access::Read)?;
        let user = UserRef::Legacy(user_id.to_string());
        if !self.policy.is_privileged(ctx) && !self.policy.is_self_reference(ctx, &user) {
            return Err(AuthError::NotAllowed.into());
        }
        let (page, per_page) = criteria.pagination(self.config.default_per_page)?;

        let mut entries: Vec<GroupRoleEntry> = self
            .store
            .session()
            .user_memberships(&user)
            .await?
            .into_iter()
            .flat_map(|(group, membership)| {
                membership.roles.into_iter().map(move |role| GroupRoleEntry {
                    group_id: group.id,
                    role: role.role,
                    created_at: role.created_at,
                    created_by: role.created_by,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.group_id
                .cmp(&b.group_id)
                .then_with(|| a.role.as_str().cmp(b.role.as_str()))
        });

        let total = entries.len() as u64;
        let window = Pagination::page(page, per_page);
        let result = entries
            .into_iter()
            .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(Page {
            result,
            page,
            per_page,
            total,
        })
    }

    /// Grant `role` on the user's existing membership of the group.
    pub async fn add_role(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        key: &GroupKey,
        role: GroupRoleName,
    ) -> GroveResult<Membership> {
        self.policy.require_privileged(ctx, Access::Write)?;

        let mut tx = self.store.begin().await?;
        let result = self.change_role_in(&mut tx, ctx, user_id, key, role, true).await;
        let membership = finish(tx, result).await?;
        info!(membership_id = %membership.id, role = %role, "Group role added");
        Ok(membership)
    }

    pub async fn delete_role(
        &self,
        ctx: &AuthContext,
        user_id: &str,
        key: &GroupKey,
        role: GroupRoleName,
    ) -> GroveResult<Membership> {
        self.policy.require_privileged(ctx, Access::Write)?;

        let mut tx = self.store.begin().await?;
        let result = self.change_role_in(&mut tx, ctx, user_id, key, role, false).await;
        let membership = finish(tx, result).await?;
        info!(membership_id = %membership.id, role = %role, "Group role deleted");
        Ok(membership)
    }

    async fn change_role_in(
        &self,
        tx: &mut S::Tx,
        ctx: &AuthContext,
        user_id: &str,
        key: &GroupKey,
        role: GroupRoleName,
        grant: bool,
    ) -> GroveResult<Membership> {
        let group = resolve_group(&*tx, key, true).await?;
        let user = UserRef::Legacy(user_id.to_string());
        if tx.find_user(&user).await?.is_none() {
            return Err(GroveError::not_found("User", user_id));
        }
        let Some(mut membership) = tx
            .find_membership(group.id, &MemberRef::User(user))
            .await?
        else {
            return Err(GroveError::bad_request(format!(
                "Not found relation between member {user_id} and group {}",
                group.id
            )));
        };

        let topic = if grant {
            if membership.has_role(role) {
                return Err(GroveError::conflict(format!(
                    "The group role {role} of member {user_id} is already in group {}",
                    group.id
                )));
            }
            membership.roles.push(GroupRole {
                role,
                created_at: Utc::now(),
                created_by: ctx.audit_id(),
            });
            &self.config.topics.role_add
        } else {
            if !membership.has_role(role) {
                return Err(GroveError::bad_request(format!(
                    "Not found group role {role} of member {user_id} in group {}",
                    group.id
                )));
            }
            membership.roles.retain(|r| r.role != role);
            &self.config.topics.role_delete
        };

        tx.set_membership_roles(membership.id, &membership.roles).await?;
        self.publisher
            .publish(topic, events::role_changed(membership.id, user_id, group.id, role))
            .await?;
        Ok(membership)
    }
}
