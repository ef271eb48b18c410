//! In-memory implementation of the graph store.
//!
//! Writers are serialized through an async mutex. Each transaction works
//! on a private copy of the graph which replaces the committed state on
//! commit; dropping or rolling back the transaction discards it.
//! Sessions always read the last committed state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use grove_core::error::{GroveError, GroveResult};
use grove_core::identity::UserRef;
use grove_core::models::group::Group;
use grove_core::models::membership::{
    GroupRole, MemberNode, MemberRecord, MemberRef, Membership,
};
use grove_core::models::user::User;
use grove_core::repository::{
    GraphRead, GraphStore, GraphTx, GroupFilter, PaginatedResult, Pagination,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum EdgeTarget {
    Group(Uuid),
    /// Node key of a user (see [`User::node_key`]).
    User(String),
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    groups: HashMap<Uuid, Group>,
    users: HashMap<String, User>,
    edges: HashMap<(Uuid, EdgeTarget), Membership>,
}

impl GraphState {
    fn sorted(mut groups: Vec<Group>) -> Vec<Group> {
        groups.sort_by(Group::legacy_order);
        groups
    }

    fn target(&self, member: &MemberRef) -> Option<EdgeTarget> {
        match member {
            MemberRef::Group(id) => Some(EdgeTarget::Group(*id)),
            MemberRef::User(user) => self.find_user(user).map(|u| EdgeTarget::User(u.node_key())),
        }
    }

    fn find_user(&self, user: &UserRef) -> Option<User> {
        self.users.values().find(|u| u.matches(user)).cloned()
    }

    fn find_group_by_old_id(&self, old_id: &str) -> Option<Group> {
        self.groups
            .values()
            .find(|g| g.legacy_id() == Some(old_id))
            .cloned()
    }

    fn find_group_by_name(&self, name: &str) -> Option<Group> {
        self.groups.values().find(|g| g.name == name).cloned()
    }

    fn filtered(&self, filter: &GroupFilter) -> Vec<Group> {
        let member_target = match &filter.member {
            Some(member) => match self.target(member) {
                Some(target) => Some(target),
                None => return Vec::new(),
            },
            None => None,
        };
        let groups = self
            .groups
            .values()
            .filter(|g| filter.matches_attributes(g))
            .filter(|g| {
                member_target
                    .as_ref()
                    .is_none_or(|t| self.edges.contains_key(&(g.id, t.clone())))
            })
            .cloned()
            .collect();
        Self::sorted(groups)
    }

    fn search(&self, filter: &GroupFilter, pagination: Pagination) -> PaginatedResult<Group> {
        let all = self.filtered(filter);
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }

    fn child_groups(&self, id: Uuid) -> Vec<Group> {
        let groups = self
            .edges
            .keys()
            .filter_map(|(parent, target)| match target {
                EdgeTarget::Group(child) if *parent == id => self.groups.get(child).cloned(),
                _ => None,
            })
            .collect();
        Self::sorted(groups)
    }

    fn containing(&self, target: &EdgeTarget) -> Vec<Group> {
        let groups = self
            .edges
            .keys()
            .filter(|(_, t)| t == target)
            .filter_map(|(parent, _)| self.groups.get(parent).cloned())
            .collect();
        Self::sorted(groups)
    }

    fn containing_groups(&self, member: &MemberRef) -> Vec<Group> {
        match self.target(member) {
            Some(target) => self.containing(&target),
            None => Vec::new(),
        }
    }

    fn find_membership(&self, group_id: Uuid, member: &MemberRef) -> Option<Membership> {
        let target = self.target(member)?;
        self.edges.get(&(group_id, target)).cloned()
    }

    fn direct_user_members(&self, group_id: Uuid) -> Vec<User> {
        self.edges
            .keys()
            .filter_map(|(parent, target)| match target {
                EdgeTarget::User(key) if *parent == group_id => self.users.get(key).cloned(),
                _ => None,
            })
            .collect()
    }

    fn list_members(&self, group_id: Uuid, pagination: Pagination) -> PaginatedResult<MemberRecord> {
        let mut records: Vec<MemberRecord> = self
            .edges
            .iter()
            .filter(|((parent, _), _)| *parent == group_id)
            .filter_map(|((_, target), membership)| {
                let member = match target {
                    EdgeTarget::Group(id) => MemberNode::Group(self.groups.get(id)?.clone()),
                    EdgeTarget::User(key) => MemberNode::User(self.users.get(key)?.clone()),
                };
                Some(MemberRecord {
                    group_id,
                    membership: membership.clone(),
                    member,
                })
            })
            .collect();
        records.sort_by(|a, b| {
            a.membership
                .created_at
                .cmp(&b.membership.created_at)
                .then_with(|| a.membership.id.cmp(&b.membership.id))
        });
        let total = records.len() as u64;
        let items = records
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }

    fn user_memberships(&self, user: &UserRef) -> Vec<(Group, Membership)> {
        let Some(node) = self.find_user(user) else {
            return Vec::new();
        };
        let target = EdgeTarget::User(node.node_key());
        let mut found: Vec<(Group, Membership)> = self
            .edges
            .iter()
            .filter(|((_, t), _)| *t == target)
            .filter_map(|((parent, _), m)| Some((self.groups.get(parent)?.clone(), m.clone())))
            .collect();
        found.sort_by(|(a, _), (b, _)| Group::legacy_order(a, b));
        found
    }

    fn path_exists(&self, from: Uuid, to: Uuid) -> bool {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            for (parent, target) in self.edges.keys() {
                if let EdgeTarget::Group(child) = target {
                    if *parent == current && seen.insert(*child) {
                        queue.push_back(*child);
                    }
                }
            }
        }
        false
    }

    // -- writes -----------------------------------------------------------

    fn create_group(&mut self, group: &Group) -> Result<(), DbError> {
        if self.groups.values().any(|g| g.name == group.name) {
            return Err(DbError::Conflict(format!(
                "The group name {} is already used",
                group.name
            )));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn update_group(&mut self, group: &Group) -> Result<(), DbError> {
        if !self.groups.contains_key(&group.id) {
            return Err(DbError::NotFound {
                entity: "group".into(),
                id: group.id.to_string(),
            });
        }
        if self
            .groups
            .values()
            .any(|g| g.id != group.id && g.name == group.name)
        {
            return Err(DbError::Conflict(format!(
                "The group name {} is already used",
                group.name
            )));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn delete_group(&mut self, id: Uuid) {
        let node = EdgeTarget::Group(id);
        self.edges
            .retain(|(parent, target), _| *parent != id && *target != node);
        self.groups.remove(&id);
    }

    fn create_membership(
        &mut self,
        group_id: Uuid,
        member: &MemberRef,
        membership: &Membership,
    ) -> Result<(), DbError> {
        let target = self.target(member).ok_or_else(|| DbError::NotFound {
            entity: membership.membership_type.as_str().into(),
            id: member.to_string(),
        })?;
        let key = (group_id, target);
        if self.edges.contains_key(&key) {
            return Err(DbError::Conflict(
                "The member is already in the group".into(),
            ));
        }
        self.edges.insert(key, membership.clone());
        Ok(())
    }

    fn delete_membership(&mut self, group_id: Uuid, member: &MemberRef) -> Result<(), DbError> {
        let removed = self
            .target(member)
            .and_then(|target| self.edges.remove(&(group_id, target)));
        match removed {
            Some(_) => Ok(()),
            None => Err(DbError::NotFound {
                entity: "membership".into(),
                id: member.to_string(),
            }),
        }
    }

    fn set_membership_roles(&mut self, membership_id: Uuid, roles: &[GroupRole]) -> Result<(), DbError> {
        let membership = self
            .edges
            .values_mut()
            .find(|m| m.id == membership_id)
            .ok_or_else(|| DbError::NotFound {
                entity: "membership".into(),
                id: membership_id.to_string(),
            })?;
        membership.roles = roles.to_vec();
        Ok(())
    }
}

/// Process-local graph store.
#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    committed: Arc<RwLock<GraphState>>,
    writer: Arc<Mutex<()>>,
    offline: Arc<AtomicBool>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, sessions and new transactions fail.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), DbError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DbError::Offline)
        } else {
            Ok(())
        }
    }
}

impl GraphStore for MemoryGraphStore {
    type Session = MemorySession;
    type Tx = MemoryTx;

    fn session(&self) -> MemorySession {
        MemorySession {
            committed: Arc::clone(&self.committed),
            offline: Arc::clone(&self.offline),
        }
    }

    async fn begin(&self) -> GroveResult<MemoryTx> {
        self.ensure_online()?;
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.committed.read().map_err(|_| DbError::Poisoned)?.clone();
        Ok(MemoryTx {
            committed: Arc::clone(&self.committed),
            working,
            _guard: guard,
        })
    }
}

/// Read-only view over the committed state.
pub struct MemorySession {
    committed: Arc<RwLock<GraphState>>,
    offline: Arc<AtomicBool>,
}

impl MemorySession {
    fn with_state<T>(&self, f: impl FnOnce(&GraphState) -> T) -> GroveResult<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DbError::Offline.into());
        }
        let state = self.committed.read().map_err(|_| DbError::Poisoned)?;
        Ok(f(&state))
    }
}

/// An open write transaction holding the writer lock.
pub struct MemoryTx {
    committed: Arc<RwLock<GraphState>>,
    working: GraphState,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTx {
    fn with_state<T>(&self, f: impl FnOnce(&GraphState) -> T) -> GroveResult<T> {
        Ok(f(&self.working))
    }
}

impl GraphRead for MemorySession {
    async fn find_group(&self, id: Uuid) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.groups.get(&id).cloned())
    }

    async fn find_group_by_old_id(&self, old_id: &str) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.find_group_by_old_id(old_id))
    }

    async fn find_group_by_name(&self, name: &str) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.find_group_by_name(name))
    }

    async fn search_groups(
        &self,
        filter: &GroupFilter,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<Group>> {
        self.with_state(|s| s.search(filter, pagination))
    }

    async fn list_groups(&self, filter: &GroupFilter) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.filtered(filter))
    }

    async fn child_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.child_groups(id))
    }

    async fn parent_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.containing(&EdgeTarget::Group(id)))
    }

    async fn containing_groups(&self, member: &MemberRef) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.containing_groups(member))
    }

    async fn find_user(&self, user: &UserRef) -> GroveResult<Option<User>> {
        self.with_state(|s| s.find_user(user))
    }

    async fn find_membership(
        &self,
        group_id: Uuid,
        member: &MemberRef,
    ) -> GroveResult<Option<Membership>> {
        self.with_state(|s| s.find_membership(group_id, member))
    }

    async fn direct_user_members(&self, group_id: Uuid) -> GroveResult<Vec<User>> {
        self.with_state(|s| s.direct_user_members(group_id))
    }

    async fn list_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<MemberRecord>> {
        self.with_state(|s| s.list_members(group_id, pagination))
    }

    async fn user_memberships(&self, user: &UserRef) -> GroveResult<Vec<(Group, Membership)>> {
        self.with_state(|s| s.user_memberships(user))
    }

    async fn path_exists(&self, from: Uuid, to: Uuid) -> GroveResult<bool> {
        self.with_state(|s| s.path_exists(from, to))
    }
}

impl GraphRead for MemoryTx {
    async fn find_group(&self, id: Uuid) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.groups.get(&id).cloned())
    }

    async fn find_group_by_old_id(&self, old_id: &str) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.find_group_by_old_id(old_id))
    }

    async fn find_group_by_name(&self, name: &str) -> GroveResult<Option<Group>> {
        self.with_state(|s| s.find_group_by_name(name))
    }

    async fn search_groups(
        &self,
        filter: &GroupFilter,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<Group>> {
        self.with_state(|s| s.search(filter, pagination))
    }

    async fn list_groups(&self, filter: &GroupFilter) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.filtered(filter))
    }

    async fn child_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.child_groups(id))
    }

    async fn parent_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.containing(&EdgeTarget::Group(id)))
    }

    async fn containing_groups(&self, member: &MemberRef) -> GroveResult<Vec<Group>> {
        self.with_state(|s| s.containing_groups(member))
    }

    async fn find_user(&self, user: &UserRef) -> GroveResult<Option<User>> {
        self.with_state(|s| s.find_user(user))
    }

    async fn find_membership(
        &self,
        group_id: Uuid,
        member: &MemberRef,
    ) -> GroveResult<Option<Membership>> {
        self.with_state(|s| s.find_membership(group_id, member))
    }

    async fn direct_user_members(&self, group_id: Uuid) -> GroveResult<Vec<User>> {
        self.with_state(|s| s.direct_user_members(group_id))
    }

    async fn list_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<MemberRecord>> {
        self.with_state(|s| s.list_members(group_id, pagination))
    }

    async fn user_memberships(&self, user: &UserRef) -> GroveResult<Vec<(Group, Membership)>> {
        self.with_state(|s| s.user_memberships(user))
    }

    async fn path_exists(&self, from: Uuid, to: Uuid) -> GroveResult<bool> {
        self.with_state(|s| s.path_exists(from, to))
    }
}

impl GraphTx for MemoryTx {
    async fn create_group(&mut self, group: &Group) -> GroveResult<()> {
        Ok(self.working.create_group(group)?)
    }

    async fn update_group(&mut self, group: &Group) -> GroveResult<()> {
        Ok(self.working.update_group(group)?)
    }

    async fn delete_group(&mut self, id: Uuid) -> GroveResult<()> {
        self.working.delete_group(id);
        Ok(())
    }

    async fn create_user(&mut self, user: &User) -> GroveResult<()> {
        self.working
            .users
            .entry(user.node_key())
            .or_insert_with(|| user.clone());
        Ok(())
    }

    async fn create_membership(
        &mut self,
        group_id: Uuid,
        member: &MemberRef,
        membership: &Membership,
    ) -> GroveResult<()> {
        Ok(self.working.create_membership(group_id, member, membership)?)
    }

    async fn delete_membership(&mut self, group_id: Uuid, member: &MemberRef) -> GroveResult<()> {
        Ok(self.working.delete_membership(group_id, member)?)
    }

    async fn set_membership_roles(
        &mut self,
        membership_id: Uuid,
        roles: &[GroupRole],
    ) -> GroveResult<()> {
        Ok(self.working.set_membership_roles(membership_id, roles)?)
    }

    async fn commit(self) -> GroveResult<()> {
        let mut committed = self
            .committed
            .write()
            .map_err(|_| GroveError::from(DbError::Poisoned))?;
        *committed = self.working;
        debug!("In-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> GroveResult<()> {
        debug!("In-memory transaction rolled back");
        Ok(())
    }
}
