//! Authorization decisions for graph reads and mutations.
//!
//! Machines and administrators are privileged. Everyone else derives
//! group-scoped privilege from the roles on their own direct membership
//! edge into the group in question; nothing is inherited through the
//! hierarchy.

use grove_core::error::GroveResult;
use grove_core::identity::UserRef;
use grove_core::models::group::Group;
use grove_core::models::membership::{GroupRoleName, MemberRef};
use grove_core::repository::GraphRead;
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::context::{Actor, AuthContext};
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

pub struct AuthorizationPolicy {
    config: AuthConfig,
}

impl AuthorizationPolicy {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn actor(&self, ctx: &AuthContext) -> Actor {
        if ctx.is_machine {
            Actor::Machine
        } else if ctx
            .roles
            .iter()
            .any(|role| role.eq_ignore_ascii_case(&self.config.admin_role))
        {
            Actor::Admin
        } else {
            Actor::User
        }
    }

    /// Human administrator. Machines are privileged but not admins.
    pub fn is_admin(&self, ctx: &AuthContext) -> bool {
        self.actor(ctx) == Actor::Admin
    }

    pub fn is_privileged(&self, ctx: &AuthContext) -> bool {
        self.actor(ctx).is_privileged()
    }

    /// Machine tokens must carry a scope granting `access`. Human
    /// tokens pass.
    pub fn require_scope(&self, ctx: &AuthContext, access: Access) -> Result<(), AuthError> {
        if !ctx.is_machine {
            return Ok(());
        }
        let allowed = match access {
            Access::Read => &self.config.read_scopes,
            Access::Write => &self.config.write_scopes,
        };
        if ctx.scopes.iter().any(|scope| allowed.contains(scope)) {
            Ok(())
        } else {
            debug!(access = access.as_str(), "Machine token lacks scope");
            Err(AuthError::MissingScope(access.as_str()))
        }
    }

    /// Scope check followed by the admin-or-machine requirement.
    pub fn require_privileged(&self, ctx: &AuthContext, access: Access) -> Result<(), AuthError> {
        self.require_scope(ctx, access)?;
        if self.is_privileged(ctx) {
            Ok(())
        } else {
            Err(AuthError::AdminRequired)
        }
    }

    /// Roles the acting user holds on its direct membership of `group_id`.
    pub async fn group_roles<R: GraphRead>(
        &self,
        reader: &R,
        ctx: &AuthContext,
        group_id: Uuid,
    ) -> GroveResult<Vec<GroupRoleName>> {
        let Some(user) = ctx.user_ref() else {
            return Ok(Vec::new());
        };
        let membership = reader
            .find_membership(group_id, &MemberRef::User(user))
            .await?;
        Ok(membership
            .map(|m| m.roles.iter().map(|r| r.role).collect())
            .unwrap_or_default())
    }

    /// Whether `user` designates the acting user. Identities compare
    /// numerically, so `"0042"` and `"42"` are the same user.
    pub fn is_self_reference(&self, ctx: &AuthContext, user: &UserRef) -> bool {
        match (user, ctx.user_id.as_deref()) {
            (UserRef::Legacy(member_id), Some(actor_id)) if !ctx.is_machine => {
                numeric_eq(actor_id, member_id)
            }
            _ => false,
        }
    }

    /// Adding or removing a member of `group`: privileged actors, holders
    /// of a member-manager role on the group, or a user adding/removing
    /// themself from a self-registering group. `user_member` is the
    /// member when it is a user; group members never self-register.
    pub async fn authorize_member_change<R: GraphRead>(
        &self,
        reader: &R,
        ctx: &AuthContext,
        group: &Group,
        user_member: Option<&UserRef>,
    ) -> GroveResult<()> {
        if self.is_privileged(ctx) {
            return Ok(());
        }
        let roles = self.group_roles(reader, ctx, group.id).await?;
        if roles
            .iter()
            .any(|role| self.config.member_manager_roles.contains(role))
        {
            return Ok(());
        }
        if group.self_register && user_member.is_some_and(|user| self.is_self_reference(ctx, user)) {
            return Ok(());
        }
        debug!(group_id = %group.id, "Member change denied");
        Err(AuthError::NotAllowed.into())
    }

    /// Creating or deleting sub groups under `parent`.
    pub async fn authorize_sub_group_change<R: GraphRead>(
        &self,
        reader: &R,
        ctx: &AuthContext,
        parent: &Group,
    ) -> GroveResult<()> {
        if self.is_privileged(ctx) {
            return Ok(());
        }
        let roles = self.group_roles(reader, ctx, parent.id).await?;
        if roles
            .iter()
            .any(|role| self.config.sub_group_admin_roles.contains(role))
        {
            return Ok(());
        }
        debug!(group_id = %parent.id, "Sub-group change denied");
        Err(AuthError::NotAllowed.into())
    }

    /// Reading a private group requires privilege or a direct membership
    /// edge from the group to the acting user.
    pub async fn authorize_read<R: GraphRead>(
        &self,
        reader: &R,
        ctx: &AuthContext,
        group: &Group,
    ) -> GroveResult<()> {
        if !group.private_group || self.is_privileged(ctx) {
            return Ok(());
        }
        let Some(user) = ctx.user_ref() else {
            return Err(AuthError::PrivateGroup.into());
        };
        match reader
            .find_membership(group.id, &MemberRef::User(user))
            .await?
        {
            Some(_) => Ok(()),
            None => Err(AuthError::PrivateGroup.into()),
        }
    }
}

fn numeric_eq(a: &str, b: &str) -> bool {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.is_finite() && x == y,
        _ => false,
    }
}
