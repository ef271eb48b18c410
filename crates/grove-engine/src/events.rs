//! Event payloads.

use grove_core::error::GroveResult;
use grove_core::models::group::Group;
use grove_core::models::membership::GroupRoleName;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::response::{DeletedMembership, MembershipResult};

pub fn group_created(group: &Group) -> GroveResult<Value> {
    Ok(serde_json::to_value(group)?)
}

/// The updated group with its name before the update as `oldName`.
pub fn group_updated(group: &Group, old_name: &str) -> GroveResult<Value> {
    let mut payload = serde_json::to_value(group)?;
    if let Value::Object(map) = &mut payload {
        map.insert("oldName".into(), Value::String(old_name.to_string()));
    }
    Ok(payload)
}

/// One event for a whole delete cascade.
pub fn groups_deleted(groups: &[Group]) -> GroveResult<Value> {
    Ok(json!({ "groups": serde_json::to_value(groups)? }))
}

pub fn member_added(result: &MembershipResult) -> GroveResult<Value> {
    Ok(serde_json::to_value(result)?)
}

pub fn member_deleted(result: &DeletedMembership) -> GroveResult<Value> {
    Ok(serde_json::to_value(result)?)
}

pub fn subgroup_created(membership_id: Uuid, parent_id: Uuid, sub_group: &Group) -> GroveResult<Value> {
    Ok(json!({
        "id": membership_id,
        "groupId": parent_id,
        "subGroup": serde_json::to_value(sub_group)?,
    }))
}

pub fn subgroup_deleted(parent_id: Uuid, deleted: &[Group]) -> GroveResult<Value> {
    Ok(json!({
        "groupId": parent_id,
        "subGroup": serde_json::to_value(deleted)?,
    }))
}

pub fn role_changed(membership_id: Uuid, user_id: &str, group_id: Uuid, role: GroupRoleName) -> Value {
    json!({
        "id": membership_id,
        "userId": user_id,
        "groupId": group_id,
        "role": role,
    })
}
