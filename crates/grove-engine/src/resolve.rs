//! Group identity resolution.

use grove_core::error::{GroveError, GroveResult};
use grove_core::identity::GroupKey;
use grove_core::models::group::Group;
use grove_core::repository::GraphRead;

pub(crate) async fn find_group<R: GraphRead>(reader: &R, key: &GroupKey) -> GroveResult<Option<Group>> {
    match key {
        GroupKey::Id(id) => reader.find_group(*id).await,
        GroupKey::Legacy(old_id) => reader.find_group_by_old_id(old_id).await,
    }
}

/// The group `key` designates. Inactive groups are only visible with
/// `include_inactive`.
pub(crate) async fn resolve_group<R: GraphRead>(
    reader: &R,
    key: &GroupKey,
    include_inactive: bool,
) -> GroveResult<Group> {
    match find_group(reader, key).await? {
        Some(group) if include_inactive || group.is_active() => Ok(group),
        _ => Err(GroveError::not_found("Group", key.to_string())),
    }
}

/// Whether `key` designates `group` without a lookup.
pub(crate) fn designates(key: &GroupKey, group: &Group) -> bool {
    match key {
        GroupKey::Id(id) => *id == group.id,
        GroupKey::Legacy(old_id) => group.legacy_id() == Some(old_id.as_str()),
    }
}
