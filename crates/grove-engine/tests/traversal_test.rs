//! Graph traversals over a hand-built store.

use chrono::Utc;
use grove_core::identity::UserRef;
use grove_core::models::group::{Group, GroupStatus};
use grove_core::models::membership::{MemberRef, Membership, MembershipType};
use grove_core::models::user::User;
use grove_core::repository::{GraphStore, GraphTx};
use grove_db::MemoryGraphStore;
use grove_engine::traversal::{self, Direction, GroupHierarchy};
use uuid::Uuid;

fn group(old_id: &str) -> Group {
    Group {
        id: Uuid::new_v4(),
        old_id: Some(old_id.into()),
        name: format!("group {old_id}"),
        description: None,
        private_group: false,
        self_register: false,
        domain: String::new(),
        sso_id: String::new(),
        organization_id: String::new(),
        status: GroupStatus::Active,
        created_at: Utc::now(),
        created_by: None,
        updated_at: None,
        updated_by: None,
    }
}

fn edge(membership_type: MembershipType) -> Membership {
    Membership {
        id: Uuid::new_v4(),
        membership_type,
        created_at: Utc::now(),
        created_by: None,
        roles: Vec::new(),
    }
}

/// Helper: a chain `g0 -> g1 -> ... -> g{n-1}` with user `u{i}` in each
/// group, plus user `shared` in every group.
async fn setup(n: usize) -> (MemoryGraphStore, Vec<Group>) {
    let store = MemoryGraphStore::new();
    let groups: Vec<Group> = (0..n).map(|i| group(&format!("3000000{i}"))).collect();
    let shared = UserRef::Legacy("500".into());

    let mut tx = store.begin().await.unwrap();
    tx.create_user(&User::from_ref(&shared)).await.unwrap();
    for (i, g) in groups.iter().enumerate() {
        tx.create_group(g).await.unwrap();
        let own = UserRef::Legacy(format!("{}", 100 + i));
        tx.create_user(&User::from_ref(&own)).await.unwrap();
        tx.create_membership(g.id, &MemberRef::User(own), &edge(MembershipType::User))
            .await
            .unwrap();
        tx.create_membership(g.id, &MemberRef::User(shared.clone()), &edge(MembershipType::User))
            .await
            .unwrap();
        if i > 0 {
            tx.create_membership(
                groups[i - 1].id,
                &MemberRef::Group(g.id),
                &edge(MembershipType::Group),
            )
            .await
            .unwrap();
        }
    }
    tx.commit().await.unwrap();
    (store, groups)
}

#[tokio::test]
async fn expansion_respects_depth_limits() {
    let (store, groups) = setup(5).await;
    let session = store.session();

    let full = GroupHierarchy::expand(&session, groups[0].clone(), Direction::Down, false, 32)
        .await
        .unwrap();
    assert_eq!(full.len(), 5);
    let ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
    assert_eq!(full.flattened_ids(), ids);

    let bounded = GroupHierarchy::expand(&session, groups[0].clone(), Direction::Down, false, 2)
        .await
        .unwrap();
    assert_eq!(bounded.len(), 3);
    assert!(bounded.node(groups[2].id).unwrap().neighbours.is_none());

    let one_level = GroupHierarchy::expand(&session, groups[4].clone(), Direction::Up, true, 32)
        .await
        .unwrap();
    assert_eq!(one_level.len(), 2);
    let tree = one_level.into_tree();
    assert_eq!(tree.parent_groups.unwrap()[0].group.id, groups[3].id);
    assert!(tree.flatten_group_id_tree.is_none());
}

#[tokio::test]
async fn distinct_users_below_a_group() {
    let (store, groups) = setup(4).await;
    let session = store.session();

    // u100..u103 plus the shared user
    let all = traversal::count_descendant_users(&session, groups[0].id, 32)
        .await
        .unwrap();
    assert_eq!(all, 5);
    let from_middle = traversal::count_descendant_users(&session, groups[2].id, 32)
        .await
        .unwrap();
    assert_eq!(from_middle, 3);
    let bounded = traversal::count_descendant_users(&session, groups[0].id, 1)
        .await
        .unwrap();
    assert_eq!(bounded, 3);
}

#[tokio::test]
async fn ancestors_of_a_user() {
    let (store, groups) = setup(3).await;
    let session = store.session();

    let member = MemberRef::User(UserRef::Legacy("102".into()));
    let found = traversal::ancestor_groups(&session, &member, 32).await.unwrap();
    let ids: Vec<Uuid> = found.iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![groups[2].id, groups[1].id, groups[0].id]);

    let nobody = MemberRef::User(UserRef::Legacy("999".into()));
    assert!(traversal::ancestor_groups(&session, &nobody, 32).await.unwrap().is_empty());
}

#[tokio::test]
async fn cascade_spares_groups_with_another_parent() {
    let (store, groups) = setup(3).await;
    let outsider = group("39999999");
    let mut tx = store.begin().await.unwrap();
    tx.create_group(&outsider).await.unwrap();
    tx.create_membership(
        outsider.id,
        &MemberRef::Group(groups[2].id),
        &edge(MembershipType::Group),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let session = store.session();
    let doomed = traversal::cascade_set(&session, groups[0].clone(), 32)
        .await
        .unwrap();
    let ids: Vec<Uuid> = doomed.iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![groups[0].id, groups[1].id]);
}
