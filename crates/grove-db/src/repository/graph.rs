//! SurrealDB implementation of the graph store.
//!
//! Reads run directly against the client and see committed data. A
//! transaction stages its writes and sends them as one
//! `BEGIN TRANSACTION … COMMIT TRANSACTION` request on commit, so either
//! every staged statement applies or none does. Reads made on a
//! transaction do not observe its own staged writes.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use grove_core::error::GroveResult;
use grove_core::identity::UserRef;
use grove_core::models::group::{Group, GroupStatus};
use grove_core::models::membership::{
    GroupRole, MemberNode, MemberRecord, MemberRef, Membership, MembershipType,
};
use grove_core::models::user::User;
use grove_core::repository::{
    GraphRead, GraphStore, GraphTx, GroupFilter, PaginatedResult, Pagination,
};
use serde_json::{Value, json};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

const GROUP_COLUMNS: &str = "meta::id(id) AS record_id, old_id, name, description, \
     private_group, self_register, domain, sso_id, organization_id, status, \
     created_at, created_by, updated_at, updated_by";

const EDGE_COLUMNS: &str = "meta::id(id) AS record_id, parent_id, member_type, member_key, \
     created_at, created_by, grants";

/// DB-side group row including the record id via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    old_id: Option<String>,
    name: String,
    description: Option<String>,
    private_group: bool,
    self_register: bool,
    domain: String,
    sso_id: String,
    organization_id: String,
    status: String,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        let id = parse_uuid(&self.record_id)?;
        let status = match self.status.as_str() {
            "active" => GroupStatus::Active,
            "inactive" => GroupStatus::InActive,
            other => return Err(DbError::Decode(format!("unknown group status: {other}"))),
        };
        Ok(Group {
            id,
            old_id: self.old_id,
            name: self.name,
            description: self.description,
            private_group: self.private_group,
            self_register: self.self_register,
            domain: self.domain,
            sso_id: self.sso_id,
            organization_id: self.organization_id,
            status,
            created_at: self.created_at,
            created_by: self.created_by,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UserRow {
    legacy_id: Option<String>,
    universal_uid: Option<String>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let universal_uid = self.universal_uid.as_deref().map(parse_uuid).transpose()?;
        Ok(User {
            id: self.legacy_id,
            universal_uid,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct EdgeRow {
    record_id: String,
    parent_id: String,
    member_type: String,
    member_key: String,
    created_at: DateTime<Utc>,
    created_by: Option<String>,
    grants: Value,
}

impl EdgeRow {
    fn membership(&self) -> Result<Membership, DbError> {
        let membership_type = match self.member_type.as_str() {
            "group" => MembershipType::Group,
            "user" => MembershipType::User,
            other => return Err(DbError::Decode(format!("unknown member type: {other}"))),
        };
        let roles = match self.grants.get("roles") {
            Some(roles) => serde_json::from_value::<Vec<GroupRole>>(roles.clone())
                .map_err(|e| DbError::Decode(format!("invalid roles: {e}")))?,
            None => Vec::new(),
        };
        Ok(Membership {
            id: parse_uuid(&self.record_id)?,
            membership_type,
            created_at: self.created_at,
            created_by: self.created_by.clone(),
            roles,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct KeyRow {
    key: String,
}

fn parse_uuid(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid UUID {raw}: {e}")))
}

fn into_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>, DbError> {
    let mut groups = rows
        .into_iter()
        .map(GroupRow::try_into_group)
        .collect::<Result<Vec<_>, _>>()?;
    groups.sort_by(Group::legacy_order);
    Ok(groups)
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

/// Prefix every `$param` in `sql` so that several staged statements can
/// share one request without their bind names colliding.
fn prefix_params(sql: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 32);
    for c in sql.chars() {
        out.push(c);
        if c == '$' {
            out.push_str(prefix);
        }
    }
    out
}

/// `SET` assignment for an optional value: the bound parameter, or NONE.
fn set_optional(field: &str, param: &str, value: Option<&str>, binds: &mut Vec<(String, Value)>) -> String {
    match value {
        Some(v) => {
            binds.push((param.to_string(), Value::String(v.to_string())));
            format!("{field} = ${param}")
        }
        None => format!("{field} = NONE"),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Un-transacted read session.
#[derive(Clone)]
pub struct SurrealSession<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSession<C> {
    async fn groups_where(&self, clause: &str, binds: Vec<(String, Value)>) -> Result<Vec<Group>, DbError> {
        let mut query = self
            .db
            .query(format!("SELECT {GROUP_COLUMNS} FROM group WHERE {clause}"));
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query.await?;
        let rows: Vec<GroupRow> = result.take(0)?;
        into_groups(rows)
    }

    async fn groups_by_ids(&self, ids: Vec<String>) -> Result<Vec<Group>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.groups_where("meta::id(id) IN $ids", vec![("ids".into(), json!(ids))])
            .await
    }

    /// Resolve the node key under which edges address `member`.
    async fn member_key(&self, member: &MemberRef) -> Result<Option<(MembershipType, String)>, DbError> {
        match member {
            MemberRef::Group(id) => Ok(Some((MembershipType::Group, id.to_string()))),
            MemberRef::User(user) => Ok(self
                .user(user)
                .await?
                .map(|u| (MembershipType::User, u.node_key()))),
        }
    }

    async fn user(&self, user: &UserRef) -> Result<Option<User>, DbError> {
        let (clause, value) = match user {
            UserRef::Legacy(id) => ("legacy_id = $value", id.clone()),
            UserRef::Universal(uid) => ("universal_uid = $value", uid.to_string()),
        };
        let mut result = self
            .db
            .query(format!(
                "SELECT legacy_id, universal_uid FROM user WHERE {clause} LIMIT 1"
            ))
            .bind(("value", value))
            .await?;
        let rows: Vec<UserRow> = result.take(0)?;
        rows.into_iter().next().map(UserRow::try_into_user).transpose()
    }

    async fn user_by_key(&self, key: &str) -> Result<Option<User>, DbError> {
        let mut result = self
            .db
            .query("SELECT legacy_id, universal_uid FROM type::record('user', $key)")
            .bind(("key", key.to_string()))
            .await?;
        let rows: Vec<UserRow> = result.take(0)?;
        rows.into_iter().next().map(UserRow::try_into_user).transpose()
    }

    async fn edges_where(&self, clause: &str, binds: Vec<(String, Value)>) -> Result<Vec<EdgeRow>, DbError> {
        let mut query = self
            .db
            .query(format!("SELECT {EDGE_COLUMNS} FROM membership WHERE {clause}"));
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query.await?;
        Ok(result.take(0)?)
    }

    /// Build the WHERE clause for a group search. Returns `None` when the
    /// member filter names a user that does not exist.
    async fn search_clause(&self, filter: &GroupFilter) -> Result<Option<(String, Vec<(String, Value)>)>, DbError> {
        let mut clauses = vec!["true".to_string()];
        let mut binds: Vec<(String, Value)> = Vec::new();

        if filter.require_old_id {
            clauses.push("old_id != NONE AND old_id != ''".into());
        }
        if let Some(old_id) = &filter.old_id {
            clauses.push("old_id = $old_id".into());
            binds.push(("old_id".into(), json!(old_id)));
        }
        if let Some(name) = &filter.name {
            clauses.push("string::lowercase(name) CONTAINS $name".into());
            binds.push(("name".into(), json!(name.to_lowercase())));
        }
        if let Some(sso_id) = &filter.sso_id {
            clauses.push("string::lowercase(sso_id) = $sso_id".into());
            binds.push(("sso_id".into(), json!(sso_id.to_lowercase())));
        }
        if let Some(organization_id) = &filter.organization_id {
            clauses.push("string::lowercase(organization_id) = $organization_id".into());
            binds.push(("organization_id".into(), json!(organization_id.to_lowercase())));
        }
        if let Some(self_register) = filter.self_register {
            clauses.push("self_register = $self_register".into());
            binds.push(("self_register".into(), json!(self_register)));
        }
        if let Some(private_group) = filter.private_group {
            clauses.push("private_group = $private_group".into());
            binds.push(("private_group".into(), json!(private_group)));
        }
        if let Some(status) = filter.status {
            clauses.push("status = $status".into());
            binds.push(("status".into(), json!(status.as_str())));
        }
        if let Some(member) = &filter.member {
            let Some((member_type, key)) = self.member_key(member).await? else {
                return Ok(None);
            };
            clauses.push(
                "meta::id(id) IN (SELECT VALUE parent_id FROM membership \
                 WHERE member_type = $member_type AND member_key = $member_key)"
                    .into(),
            );
            binds.push(("member_type".into(), json!(member_type.as_str())));
            binds.push(("member_key".into(), json!(key)));
        }
        Ok(Some((clauses.join(" AND "), binds)))
    }

    async fn search(&self, filter: &GroupFilter, pagination: Pagination) -> Result<PaginatedResult<Group>, DbError> {
        let Some((clause, binds)) = self.search_clause(filter).await? else {
            return Ok(PaginatedResult {
                items: Vec::new(),
                total: 0,
                offset: pagination.offset,
                limit: pagination.limit,
            });
        };

        let mut query = self.db.query(format!(
            "SELECT count() AS total FROM group WHERE {clause} GROUP ALL; \
             SELECT {GROUP_COLUMNS} FROM group WHERE {clause} \
             ORDER BY old_id ASC, name ASC LIMIT $limit START $offset;"
        ));
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await?;

        let count_rows: Vec<CountRow> = result.take(0)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<GroupRow> = result.take(1)?;
        let items = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list(&self, filter: &GroupFilter) -> Result<Vec<Group>, DbError> {
        match self.search_clause(filter).await? {
            Some((clause, binds)) => self.groups_where(&clause, binds).await,
            None => Ok(Vec::new()),
        }
    }

    async fn children(&self, id: Uuid) -> Result<Vec<Group>, DbError> {
        let edges = self
            .edges_where(
                "parent_id = $parent_id AND member_type = 'group'",
                vec![("parent_id".into(), json!(id.to_string()))],
            )
            .await?;
        self.groups_by_ids(edges.into_iter().map(|e| e.member_key).collect())
            .await
    }

    async fn containing(&self, member: &MemberRef) -> Result<Vec<Group>, DbError> {
        let Some((member_type, key)) = self.member_key(member).await? else {
            return Ok(Vec::new());
        };
        let edges = self
            .edges_where(
                "member_type = $member_type AND member_key = $member_key",
                vec![
                    ("member_type".into(), json!(member_type.as_str())),
                    ("member_key".into(), json!(key)),
                ],
            )
            .await?;
        self.groups_by_ids(edges.into_iter().map(|e| e.parent_id).collect())
            .await
    }

    async fn membership(&self, group_id: Uuid, member: &MemberRef) -> Result<Option<Membership>, DbError> {
        let Some((member_type, key)) = self.member_key(member).await? else {
            return Ok(None);
        };
        let edges = self
            .edges_where(
                "parent_id = $parent_id AND member_type = $member_type AND member_key = $member_key",
                vec![
                    ("parent_id".into(), json!(group_id.to_string())),
                    ("member_type".into(), json!(member_type.as_str())),
                    ("member_key".into(), json!(key)),
                ],
            )
            .await?;
        edges.first().map(EdgeRow::membership).transpose()
    }

    async fn user_members(&self, group_id: Uuid) -> Result<Vec<User>, DbError> {
        let edges = self
            .edges_where(
                "parent_id = $parent_id AND member_type = 'user'",
                vec![("parent_id".into(), json!(group_id.to_string()))],
            )
            .await?;
        let mut users = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(user) = self.user_by_key(&edge.member_key).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn members(&self, group_id: Uuid, pagination: Pagination) -> Result<PaginatedResult<MemberRecord>, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM membership WHERE parent_id = $parent_id GROUP ALL; \
                 SELECT {EDGE_COLUMNS} FROM membership WHERE parent_id = $parent_id \
                 ORDER BY created_at ASC LIMIT $limit START $offset;"
            ))
            .bind(("parent_id", group_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await?;
        let count_rows: Vec<CountRow> = result.take(0)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let edges: Vec<EdgeRow> = result.take(1)?;

        let mut items = Vec::with_capacity(edges.len());
        for edge in edges {
            let membership = edge.membership()?;
            let member = match membership.membership_type {
                MembershipType::Group => {
                    let child = parse_uuid(&edge.member_key)?;
                    self.groups_by_ids(vec![child.to_string()])
                        .await?
                        .into_iter()
                        .next()
                        .map(MemberNode::Group)
                }
                MembershipType::User => self.user_by_key(&edge.member_key).await?.map(MemberNode::User),
            };
            if let Some(member) = member {
                items.push(MemberRecord {
                    group_id,
                    membership,
                    member,
                });
            }
        }

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn memberships_of(&self, user: &UserRef) -> Result<Vec<(Group, Membership)>, DbError> {
        let Some(node) = self.user(user).await? else {
            return Ok(Vec::new());
        };
        let edges = self
            .edges_where(
                "member_type = 'user' AND member_key = $member_key",
                vec![("member_key".into(), json!(node.node_key()))],
            )
            .await?;
        let groups = self
            .groups_by_ids(edges.iter().map(|e| e.parent_id.clone()).collect())
            .await?;
        let mut found = Vec::with_capacity(edges.len());
        for group in groups {
            if let Some(edge) = edges.iter().find(|e| e.parent_id == group.id.to_string()) {
                found.push((group, edge.membership()?));
            }
        }
        Ok(found)
    }

    /// Breadth-first reachability, one query per frontier.
    async fn reachable(&self, from: Uuid, to: Uuid) -> Result<bool, DbError> {
        if from == to {
            return Ok(true);
        }
        let target = to.to_string();
        let mut seen = HashSet::from([from.to_string()]);
        let mut frontier = VecDeque::from([from.to_string()]);

        while !frontier.is_empty() {
            let ids: Vec<String> = frontier.drain(..).collect();
            let mut result = self
                .db
                .query(
                    "SELECT member_key AS key FROM membership \
                     WHERE member_type = 'group' AND parent_id IN $ids",
                )
                .bind(("ids", ids))
                .await?;
            let rows: Vec<KeyRow> = result.take(0)?;
            for row in rows {
                if row.key == target {
                    return Ok(true);
                }
                if seen.insert(row.key.clone()) {
                    frontier.push_back(row.key);
                }
            }
        }
        Ok(false)
    }
}

impl<C: Connection> GraphRead for SurrealSession<C> {
    async fn find_group(&self, id: Uuid) -> GroveResult<Option<Group>> {
        Ok(self
            .groups_by_ids(vec![id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn find_group_by_old_id(&self, old_id: &str) -> GroveResult<Option<Group>> {
        let groups = self
            .groups_where("old_id = $old_id", vec![("old_id".into(), json!(old_id))])
            .await?;
        Ok(groups.into_iter().next())
    }

    async fn find_group_by_name(&self, name: &str) -> GroveResult<Option<Group>> {
        let groups = self
            .groups_where("name = $name", vec![("name".into(), json!(name))])
            .await?;
        Ok(groups.into_iter().next())
    }

    async fn search_groups(
        &self,
        filter: &GroupFilter,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<Group>> {
        Ok(self.search(filter, pagination).await?)
    }

    async fn list_groups(&self, filter: &GroupFilter) -> GroveResult<Vec<Group>> {
        Ok(self.list(filter).await?)
    }

    async fn child_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        Ok(self.children(id).await?)
    }

    async fn parent_groups(&self, id: Uuid) -> GroveResult<Vec<Group>> {
        Ok(self.containing(&MemberRef::Group(id)).await?)
    }

    async fn containing_groups(&self, member: &MemberRef) -> GroveResult<Vec<Group>> {
        Ok(self.containing(member).await?)
    }

    async fn find_user(&self, user: &UserRef) -> GroveResult<Option<User>> {
        Ok(self.user(user).await?)
    }

    async fn find_membership(
        &self,
        group_id: Uuid,
        member: &MemberRef,
    ) -> GroveResult<Option<Membership>> {
        Ok(self.membership(group_id, member).await?)
    }

    async fn direct_user_members(&self, group_id: Uuid) -> GroveResult<Vec<User>> {
        Ok(self.user_members(group_id).await?)
    }

    async fn list_members(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> GroveResult<PaginatedResult<MemberRecord>> {
        Ok(self.members(group_id, pagination).await?)
    }

    async fn user_memberships(&self, user: &UserRef) -> GroveResult<Vec<(Group, Membership)>> {
        Ok(self.memberships_of(user).await?)
    }

    async fn path_exists(&self, from: Uuid, to: Uuid) -> GroveResult<bool> {
        Ok(self.reachable(from, to).await?)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

struct Staged {
    sql: String,
    binds: Vec<(String, Value)>,
}

/// A transaction collecting writes until commit.
pub struct SurrealTx<C: Connection> {
    reader: SurrealSession<C>,
    staged: Vec<Staged>,
}

impl<C: Connection> SurrealTx<C> {
    fn stage(&mut self, sql: &str, binds: Vec<(String, Value)>) {
        let prefix = format!("s{}_", self.staged.len());
        self.staged.push(Staged {
            sql: prefix_params(sql, &prefix),
            binds: binds
                .into_iter()
                .map(|(name, value)| (format!("{prefix}{name}"), value))
                .collect(),
        });
    }

    fn stage_group_write(&mut self, verb: &str, group: &Group) {
        let mut binds = vec![
            ("id".to_string(), json!(group.id.to_string())),
            ("name".to_string(), json!(group.name)),
            ("private_group".to_string(), json!(group.private_group)),
            ("self_register".to_string(), json!(group.self_register)),
            ("domain".to_string(), json!(group.domain)),
            ("sso_id".to_string(), json!(group.sso_id)),
            ("organization_id".to_string(), json!(group.organization_id)),
            ("status".to_string(), json!(group.status.as_str())),
            ("created_at".to_string(), timestamp(group.created_at)),
        ];
        let optionals = [
            set_optional("old_id", "old_id", group.old_id.as_deref(), &mut binds),
            set_optional("description", "description", group.description.as_deref(), &mut binds),
            set_optional("created_by", "created_by", group.created_by.as_deref(), &mut binds),
            set_optional("updated_by", "updated_by", group.updated_by.as_deref(), &mut binds),
        ];
        let updated_at = match group.updated_at {
            Some(at) => {
                binds.push(("updated_at".into(), timestamp(at)));
                "updated_at = <datetime>$updated_at".to_string()
            }
            None => "updated_at = NONE".to_string(),
        };
        let sql = format!(
            "{verb} type::record('group', $id) SET \
             name = $name, private_group = $private_group, \
             self_register = $self_register, domain = $domain, \
             sso_id = $sso_id, organization_id = $organization_id, \
             status = $status, created_at = <datetime>$created_at, \
             {}, {updated_at};",
            optionals.join(", ")
        );
        self.stage(&sql, binds);
    }
}

macro_rules! delegate_reads {
    ($($name:ident($($arg:ident: $ty:ty),*) -> $out:ty;)*) => {
        impl<C: Connection> GraphRead for SurrealTx<C> {
            $(
                async fn $name(&self, $($arg: $ty),*) -> GroveResult<$out> {
                    self.reader.$name($($arg),*).await
                }
            )*
        }
    };
}

delegate_reads! {
    find_group(id: Uuid) -> Option<Group>;
    find_group_by_old_id(old_id: &str) -> Option<Group>;
    find_group_by_name(name: &str) -> Option<Group>;
    search_groups(filter: &GroupFilter, pagination: Pagination) -> PaginatedResult<Group>;
    list_groups(filter: &GroupFilter) -> Vec<Group>;
    child_groups(id: Uuid) -> Vec<Group>;
    parent_groups(id: Uuid) -> Vec<Group>;
    containing_groups(member: &MemberRef) -> Vec<Group>;
    find_user(user: &UserRef) -> Option<User>;
    find_membership(group_id: Uuid, member: &MemberRef) -> Option<Membership>;
    direct_user_members(group_id: Uuid) -> Vec<User>;
    list_members(group_id: Uuid, pagination: Pagination) -> PaginatedResult<MemberRecord>;
    user_memberships(user: &UserRef) -> Vec<(Group, Membership)>;
    path_exists(from: Uuid, to: Uuid) -> bool;
}

impl<C: Connection> GraphTx for SurrealTx<C> {
    async fn create_group(&mut self, group: &Group) -> GroveResult<()> {
        self.stage_group_write("CREATE", group);
        Ok(())
    }

    async fn update_group(&mut self, group: &Group) -> GroveResult<()> {
        self.stage_group_write("UPDATE", group);
        Ok(())
    }

    async fn delete_group(&mut self, id: Uuid) -> GroveResult<()> {
        self.stage(
            "DELETE membership WHERE parent_id = $id \
             OR (member_type = 'group' AND member_key = $id); \
             DELETE type::record('group', $id);",
            vec![("id".into(), json!(id.to_string()))],
        );
        Ok(())
    }

    async fn create_user(&mut self, user: &User) -> GroveResult<()> {
        let mut binds = vec![("key".to_string(), json!(user.node_key()))];
        let uid = user.universal_uid.map(|u| u.to_string());
        let sets = [
            set_optional("legacy_id", "legacy_id", user.id.as_deref(), &mut binds),
            set_optional("universal_uid", "universal_uid", uid.as_deref(), &mut binds),
        ];
        // UPSERT keeps concurrent first references to the same user idempotent.
        self.stage(
            &format!("UPSERT type::record('user', $key) SET {};", sets.join(", ")),
            binds,
        );
        Ok(())
    }

    async fn create_membership(
        &mut self,
        group_id: Uuid,
        member: &MemberRef,
        membership: &Membership,
    ) -> GroveResult<()> {
        let member_key = match member {
            MemberRef::Group(id) => id.to_string(),
            // An existing node may carry both identities; edges address it
            // by its own key.
            MemberRef::User(user) => match self.reader.user(user).await? {
                Some(node) => node.node_key(),
                None => User::from_ref(user).node_key(),
            },
        };
        let mut binds = vec![
            ("id".to_string(), json!(membership.id.to_string())),
            ("parent_id".to_string(), json!(group_id.to_string())),
            ("member_type".to_string(), json!(membership.membership_type.as_str())),
            ("member_key".to_string(), json!(member_key)),
            ("created_at".to_string(), timestamp(membership.created_at)),
            ("grants".to_string(), json!({ "roles": membership.roles })),
        ];
        let created_by = set_optional(
            "created_by",
            "created_by",
            membership.created_by.as_deref(),
            &mut binds,
        );
        self.stage(
            &format!(
                "CREATE type::record('membership', $id) SET \
                 parent_id = $parent_id, member_type = $member_type, \
                 member_key = $member_key, created_at = <datetime>$created_at, \
                 grants = $grants, {created_by};"
            ),
            binds,
        );
        Ok(())
    }

    async fn delete_membership(&mut self, group_id: Uuid, member: &MemberRef) -> GroveResult<()> {
        let Some((member_type, key)) = self.reader.member_key(member).await? else {
            return Err(DbError::NotFound {
                entity: "membership".into(),
                id: member.to_string(),
            }
            .into());
        };
        self.stage(
            "DELETE membership WHERE parent_id = $parent_id \
             AND member_type = $member_type AND member_key = $member_key;",
            vec![
                ("parent_id".into(), json!(group_id.to_string())),
                ("member_type".into(), json!(member_type.as_str())),
                ("member_key".into(), json!(key)),
            ],
        );
        Ok(())
    }

    async fn set_membership_roles(
        &mut self,
        membership_id: Uuid,
        roles: &[GroupRole],
    ) -> GroveResult<()> {
        self.stage(
            "UPDATE type::record('membership', $id) SET grants = $grants;",
            vec![
                ("id".into(), json!(membership_id.to_string())),
                ("grants".into(), json!({ "roles": roles })),
            ],
        );
        Ok(())
    }

    async fn commit(self) -> GroveResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        let mut binds = Vec::new();
        for staged in self.staged {
            sql.push_str(&staged.sql);
            sql.push('\n');
            binds.extend(staged.binds);
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = self.reader.db.query(sql);
        for bind in binds {
            query = query.bind(bind);
        }
        query
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;
        debug!("SurrealDB transaction committed");
        Ok(())
    }

    async fn rollback(self) -> GroveResult<()> {
        debug!(discarded = self.staged.len(), "SurrealDB transaction rolled back");
        Ok(())
    }
}

/// SurrealDB-backed [`GraphStore`].
#[derive(Clone)]
pub struct SurrealGraphStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGraphStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> GraphStore for SurrealGraphStore<C> {
    type Session = SurrealSession<C>;
    type Tx = SurrealTx<C>;

    fn session(&self) -> SurrealSession<C> {
        SurrealSession {
            db: self.db.clone(),
        }
    }

    async fn begin(&self) -> GroveResult<SurrealTx<C>> {
        Ok(SurrealTx {
            reader: self.session(),
            staged: Vec::new(),
        })
    }
}
