//! Integration tests for membership mutations and queries over the
//! in-memory adapters.

use std::sync::Arc;

use grove_auth::{AuthConfig, AuthContext};
use grove_bus::MemoryPublisher;
use grove_cache::MemoryCache;
use grove_core::error::GroveError;
use grove_core::identity::{GroupKey, UserRef};
use grove_core::models::group::{CreateGroup, Group, GroupStatus, PatchGroup, UpdateGroup};
use grove_core::models::membership::{GroupRoleName, MemberRef, MembershipType};
use grove_core::repository::{GraphRead, GraphStore};
use grove_db::MemoryGraphStore;
use grove_engine::{
    BulkStatus, CountCriteria, EngineConfig, GroveEngine, MemberCountCriteria, MemberSpec,
    MemberTarget, PageCriteria, SearchCriteria,
};
use uuid::Uuid;

type Engine = GroveEngine<MemoryGraphStore, MemoryCache, MemoryPublisher>;

struct Setup {
    engine: Engine,
    store: Arc<MemoryGraphStore>,
    publisher: Arc<MemoryPublisher>,
}

fn setup() -> Setup {
    let store = Arc::new(MemoryGraphStore::new());
    let publisher = Arc::new(MemoryPublisher::new());
    let engine = GroveEngine::new(
        store.clone(),
        Arc::new(MemoryCache::new()),
        publisher.clone(),
        AuthConfig::default(),
        EngineConfig::default(),
    );
    Setup {
        engine,
        store,
        publisher,
    }
}

fn admin() -> AuthContext {
    AuthContext::user("1", ["Administrator"])
}

fn user(id: &str) -> AuthContext {
    AuthContext::user(id, ["Topcoder User"])
}

async fn create(s: &Setup, name: &str, old_id: &str, private_group: bool, self_register: bool) -> Group {
    let group = s
        .engine
        .directory()
        .create(
            &admin(),
            CreateGroup {
                name: name.into(),
                private_group,
                self_register,
                ..CreateGroup::default()
            },
        )
        .await
        .unwrap();
    s.engine
        .directory()
        .patch(
            &admin(),
            &GroupKey::Id(group.id),
            PatchGroup {
                old_id: Some(old_id.into()),
            },
        )
        .await
        .unwrap()
}

async fn group(s: &Setup, name: &str, old_id: &str) -> Group {
    create(s, name, old_id, false, false).await
}

async fn nest(s: &Setup, parent: &Group, child: &Group) {
    s.engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(parent.id), &MemberSpec::group(child.id))
        .await
        .unwrap();
}

async fn join(s: &Setup, group: &Group, user_id: &str) {
    s.engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(group.id), &MemberSpec::user(user_id))
        .await
        .unwrap();
}

#[tokio::test]
async fn add_user_member_creates_user_and_edge() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;

    let added = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Legacy("20000001".into()), &MemberSpec::user("8547899"))
        .await
        .unwrap();
    assert_eq!(added.group_id, g.id);
    assert_eq!(added.old_id.as_deref(), Some("20000001"));
    assert_eq!(added.member_id.as_deref(), Some("8547899"));
    assert_eq!(added.membership_type, MembershipType::User);
    assert_eq!(added.created_by.as_deref(), Some("1"));

    let session = s.store.session();
    let member = MemberRef::User(UserRef::Legacy("8547899".into()));
    assert!(session.find_user(&UserRef::Legacy("8547899".into())).await.unwrap().is_some());
    let edge = session.find_membership(g.id, &member).await.unwrap().unwrap();
    assert_eq!(edge.id, added.id);

    let events = s.publisher.events();
    let last = events.last().unwrap();
    assert_eq!(last.topic, "groups.notification.member.add");
    assert_eq!(last.payload["memberId"], "8547899");
    assert_eq!(last.payload["groupId"], g.id.to_string());
}

#[tokio::test]
async fn duplicate_member_is_conflict() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;
    join(&s, &g, "8547899").await;

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::user("8547899"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Conflict { .. }));
}

#[tokio::test]
async fn group_can_not_contain_itself() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::group(g.id))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::BadRequest { .. }));

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::group("20000001"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::BadRequest { .. }));
}

#[tokio::test]
async fn cyclic_reference_is_rejected() {
    let s = setup();
    let parent = group(&s, "Parent", "20000001").await;
    let child = group(&s, "Child", "20000002").await;
    let grandchild = group(&s, "Grandchild", "20000003").await;
    nest(&s, &parent, &child).await;
    nest(&s, &child, &grandchild).await;

    for (container, member) in [(&child, &parent), (&grandchild, &parent)] {
        let err = s
            .engine
            .membership()
            .add_member(&admin(), &GroupKey::Id(container.id), &MemberSpec::group(member.id))
            .await
            .unwrap_err();
        assert!(matches!(err, GroveError::Conflict { .. }), "{err}");
    }
    assert!(!s.store.session().path_exists(child.id, parent.id).await.unwrap());
}

#[tokio::test]
async fn private_parent_requires_private_child() {
    let s = setup();
    let private_parent = create(&s, "Private", "20000001", true, false).await;
    let public_child = group(&s, "Public", "20000002").await;
    let private_child = create(&s, "Secret", "20000003", true, false).await;

    let err = s
        .engine
        .membership()
        .add_member(
            &admin(),
            &GroupKey::Id(private_parent.id),
            &MemberSpec::group(public_child.id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Conflict { .. }));

    nest(&s, &private_parent, &private_child).await;
}

#[tokio::test]
async fn missing_child_group_is_not_found() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::group(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::NotFound { .. }));
}

#[tokio::test]
async fn group_without_legacy_id_is_not_ready() {
    let s = setup();
    let g = s
        .engine
        .directory()
        .create(
            &admin(),
            CreateGroup {
                name: "Fresh".into(),
                ..CreateGroup::default()
            },
        )
        .await
        .unwrap();

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::user("8547899"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));
}

#[tokio::test]
async fn membership_changes_need_authority() {
    let s = setup();
    let open = create(&s, "Open", "20000001", false, true).await;
    let closed = group(&s, "Closed", "20000002").await;
    let membership = s.engine.membership();

    // self registration
    membership
        .add_member(&user("55"), &GroupKey::Id(open.id), &MemberSpec::user("55"))
        .await
        .unwrap();
    let err = membership
        .add_member(&user("55"), &GroupKey::Id(open.id), &MemberSpec::user("56"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));
    let err = membership
        .add_member(&user("55"), &GroupKey::Id(closed.id), &MemberSpec::user("55"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));

    // group manager role
    join(&s, &closed, "7").await;
    s.engine
        .roles()
        .add_role(&admin(), "7", &GroupKey::Id(closed.id), GroupRoleName::GroupManager)
        .await
        .unwrap();
    membership
        .add_member(&user("7"), &GroupKey::Id(closed.id), &MemberSpec::user("8"))
        .await
        .unwrap();
    membership
        .delete_member(&user("7"), &GroupKey::Id(closed.id), &MemberTarget::MemberId("8".into()))
        .await
        .unwrap();

    // machine tokens need a write scope
    let err = membership
        .add_member(
            &AuthContext::machine(["read:groups"]),
            &GroupKey::Id(closed.id),
            &MemberSpec::user("9"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));
    membership
        .add_member(
            &AuthContext::machine(["write:groups"]),
            &GroupKey::Id(closed.id),
            &MemberSpec::user("9"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn publish_failure_rolls_back_the_edge() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;
    s.publisher.fail_on("groups.notification.member.add");

    let err = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::user("8547899"))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Publish(_)));

    let session = s.store.session();
    let user = UserRef::Legacy("8547899".into());
    assert!(session.find_user(&user).await.unwrap().is_none());
    assert!(
        session
            .find_membership(g.id, &MemberRef::User(user))
            .await
            .unwrap()
            .is_none()
    );

    s.publisher.recover();
    join(&s, &g, "8547899").await;
}

#[tokio::test]
async fn delete_member_requires_existing_edge() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;

    let err = s
        .engine
        .membership()
        .delete_member(&admin(), &GroupKey::Id(g.id), &MemberTarget::MemberId("8547899".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::NotFound { .. }));
}

#[tokio::test]
async fn deleting_group_member_reports_its_legacy_id() {
    let s = setup();
    let parent = group(&s, "Parent", "20000001").await;
    let child = group(&s, "Child", "20000002").await;
    nest(&s, &parent, &child).await;

    let deleted = s
        .engine
        .membership()
        .delete_member(
            &admin(),
            &GroupKey::Legacy("20000001".into()),
            &MemberTarget::MemberId(child.id.to_string()),
        )
        .await
        .unwrap();
    assert_eq!(deleted.group_id, parent.id);
    assert_eq!(deleted.member_id.as_deref(), Some("20000002"));
    assert!(s.store.session().child_groups(parent.id).await.unwrap().is_empty());
    assert_eq!(
        s.publisher.topics().last().map(String::as_str),
        Some("groups.notification.member.delete")
    );
}

#[tokio::test]
async fn universal_members_round_trip() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;
    let uid = Uuid::new_v4();

    let added = s
        .engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(g.id), &MemberSpec::universal(uid))
        .await
        .unwrap();
    assert_eq!(added.universal_uid, Some(uid));
    assert_eq!(added.member_id, None);

    let deleted = s
        .engine
        .membership()
        .delete_member(&admin(), &GroupKey::Id(g.id), &MemberTarget::Universal(uid))
        .await
        .unwrap();
    assert_eq!(deleted.universal_uid, Some(uid));
    assert_eq!(deleted.member_id, None);
}

#[tokio::test]
async fn bulk_operations_report_each_member() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;
    let key = GroupKey::Id(g.id);
    let missing = Uuid::new_v4();

    let added = s
        .engine
        .membership()
        .bulk_add(
            &admin(),
            &key,
            &[
                MemberSpec::user("11"),
                MemberSpec::group(missing),
                MemberSpec::user("12"),
            ],
        )
        .await;
    let statuses: Vec<BulkStatus> = added.members.iter().map(|m| m.status).collect();
    assert_eq!(
        statuses,
        vec![BulkStatus::Success, BulkStatus::Failed, BulkStatus::Success]
    );
    assert_eq!(added.members[1].member_id, missing.to_string());
    assert!(added.members[1].message.is_some());
    assert_eq!(added.failures(), 1);

    let deleted = s
        .engine
        .membership()
        .bulk_delete(
            &admin(),
            &key,
            &[
                MemberTarget::MemberId("11".into()),
                MemberTarget::MemberId("99".into()),
            ],
        )
        .await;
    assert_eq!(deleted.members[0].status, BulkStatus::Success);
    assert_eq!(deleted.members[1].status, BulkStatus::Failed);
    assert_eq!(deleted.group_id, g.id.to_string());
}

#[tokio::test]
async fn member_search_finds_containing_group() {
    let s = setup();
    let g = group(&s, "Developers", "20000001").await;
    group(&s, "Testers", "20000002").await;
    join(&s, &g, "8547899").await;

    let found = s
        .engine
        .directory()
        .search(
            &admin(),
            &SearchCriteria {
                member_id: Some("8547899".into()),
                membership_type: Some(MembershipType::User),
                ..SearchCriteria::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(found.result.len(), 1);
    assert_eq!(found.total, 1);
    assert_eq!(found.page, 1);
    assert_eq!(found.result[0].id, Some(g.id));
}

#[tokio::test]
async fn counts_distinct_users_through_sub_groups() {
    let s = setup();
    let root = group(&s, "Root", "20000001").await;
    let left = group(&s, "Left", "20000002").await;
    let right = group(&s, "Right", "20000003").await;
    nest(&s, &root, &left).await;
    nest(&s, &root, &right).await;
    join(&s, &root, "100").await;
    join(&s, &left, "100").await;
    join(&s, &right, "100").await;
    join(&s, &right, "200").await;

    let membership = s.engine.membership();
    let key = GroupKey::Id(root.id);
    let direct = membership
        .count_members(&key, &CountCriteria::default())
        .await
        .unwrap();
    assert_eq!(direct.count, 1);
    let deep = membership
        .count_members(&key, &CountCriteria { include_sub_groups: true })
        .await
        .unwrap();
    assert_eq!(deep.count, 2);
}

#[tokio::test]
async fn private_group_count() {
    let s = setup();
    let g = create(&s, "Private", "20000001", true, false).await;
    join(&s, &g, "8547899").await;

    let counted = s
        .engine
        .membership()
        .count_members(&GroupKey::Legacy("20000001".into()), &CountCriteria::default())
        .await
        .unwrap();
    assert_eq!(counted.count, 1);
}

#[tokio::test]
async fn member_listing_and_lookup() {
    let s = setup();
    let g = create(&s, "Private", "20000001", true, false).await;
    let child = create(&s, "Child", "20000002", true, false).await;
    join(&s, &g, "7").await;
    nest(&s, &g, &child).await;
    let key = GroupKey::Id(g.id);

    let page = s
        .engine
        .membership()
        .get_members(&user("7"), &key, &PageCriteria::new(1, 1))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.result.len(), 1);

    let err = s
        .engine
        .membership()
        .get_members(&user("8"), &key, &PageCriteria::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));

    let record = s
        .engine
        .membership()
        .get_member(&admin(), &key, &MemberTarget::MemberId(child.id.to_string()))
        .await
        .unwrap();
    assert_eq!(record.membership.membership_type, MembershipType::Group);

    let err = s
        .engine
        .membership()
        .get_member(&admin(), &key, &MemberTarget::MemberId("8".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::NotFound { .. }));
}

#[tokio::test]
async fn member_groups_and_validity() {
    let s = setup();
    let root = group(&s, "Root", "20000001").await;
    let team = group(&s, "Team", "20000002").await;
    let retired = group(&s, "Retired", "20000009").await;
    nest(&s, &root, &team).await;
    join(&s, &team, "8547899").await;
    join(&s, &retired, "8547899").await;
    s.engine
        .directory()
        .update(
            &admin(),
            &GroupKey::Id(retired.id),
            UpdateGroup {
                name: "Retired".into(),
                old_id: Some("20000009".into()),
                status: Some(GroupStatus::InActive),
                ..UpdateGroup::default()
            },
        )
        .await
        .unwrap();

    let membership = s.engine.membership();
    let target = MemberTarget::MemberId("8547899".into());
    let machine = AuthContext::machine(["read:groups"]);

    let legacy = membership
        .list_member_groups(&machine, &target, false)
        .await
        .unwrap();
    assert_eq!(legacy, vec!["20000001".to_string(), "20000002".to_string()]);

    let mut expected = vec![root.id.to_string(), team.id.to_string()];
    expected.sort();
    let uuids = membership
        .list_member_groups(&machine, &target, true)
        .await
        .unwrap();
    assert_eq!(uuids, expected);

    assert!(membership.group_validity_check(&target, "20000001").await.unwrap().check);
    assert!(!membership.group_validity_check(&target, "20000009").await.unwrap().check);
}

#[tokio::test]
async fn groups_member_count_listing() {
    let s = setup();
    let root = group(&s, "Root", "20000001").await;
    let team = group(&s, "Team", "20000002").await;
    nest(&s, &root, &team).await;
    join(&s, &root, "100").await;
    join(&s, &team, "200").await;
    let uid = Uuid::new_v4();
    s.engine
        .membership()
        .add_member(&admin(), &GroupKey::Id(team.id), &MemberSpec::universal(uid))
        .await
        .unwrap();

    let membership = s.engine.membership();
    let flat = membership
        .list_groups_member_count(&MemberCountCriteria::default())
        .await
        .unwrap();
    let counts: Vec<(String, u64)> = flat.iter().map(|c| (c.old_id.clone(), c.count)).collect();
    assert_eq!(
        counts,
        vec![("20000001".to_string(), 1), ("20000002".to_string(), 2)]
    );

    let deep = membership
        .list_groups_member_count(&MemberCountCriteria {
            include_sub_groups: true,
            ..MemberCountCriteria::default()
        })
        .await
        .unwrap();
    assert_eq!(deep[0].count, 3);

    let direct_only = membership
        .list_groups_member_count(&MemberCountCriteria {
            universal_uid: Some(uid),
            ..MemberCountCriteria::default()
        })
        .await
        .unwrap();
    assert_eq!(direct_only.len(), 1);
    assert_eq!(direct_only[0].id, team.id);

    let through_hierarchy = membership
        .list_groups_member_count(&MemberCountCriteria {
            include_sub_groups: true,
            universal_uid: Some(uid),
            ..MemberCountCriteria::default()
        })
        .await
        .unwrap();
    assert_eq!(through_hierarchy.len(), 2);
}
