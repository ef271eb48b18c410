//! Cache-aside behaviour of group reads.

use std::sync::Arc;

use chrono::Utc;
use grove_auth::{AuthConfig, AuthContext};
use grove_bus::MemoryPublisher;
use grove_cache::MemoryCache;
use grove_core::error::GroveError;
use grove_core::identity::GroupKey;
use grove_core::models::group::{CreateGroup, Group, GroupStatus, GroupView, PatchGroup};
use grove_core::models::membership::{MemberRef, Membership, MembershipType};
use grove_core::repository::{GraphStore, GraphTx};
use grove_db::MemoryGraphStore;
use grove_engine::{EngineConfig, Expansion, GetCriteria, GroveEngine, MemberSpec};
use uuid::Uuid;

type Engine = GroveEngine<MemoryGraphStore, MemoryCache, MemoryPublisher>;

struct Setup {
    engine: Engine,
    store: Arc<MemoryGraphStore>,
    cache: Arc<MemoryCache>,
}

fn setup() -> Setup {
    let store = Arc::new(MemoryGraphStore::new());
    let cache = Arc::new(MemoryCache::new());
    let engine = GroveEngine::new(
        store.clone(),
        cache.clone(),
        Arc::new(MemoryPublisher::new()),
        AuthConfig::default(),
        EngineConfig::default(),
    );
    Setup {
        engine,
        store,
        cache,
    }
}

fn admin() -> AuthContext {
    AuthContext::user("1", ["Administrator"])
}

async fn group(s: &Setup, name: &str, old_id: &str) -> Group {
    let created = s
        .engine
        .directory()
        .create(
            &admin(),
            CreateGroup {
                name: name.into(),
                ..CreateGroup::default()
            },
        )
        .await
        .unwrap();
    s.engine
        .directory()
        .patch(
            &admin(),
            &GroupKey::Id(created.id),
            PatchGroup {
                old_id: Some(old_id.into()),
            },
        )
        .await
        .unwrap()
}

/// Writes a child under `parent` straight into the store, bypassing the
/// engine and therefore any cache eviction.
async fn attach_behind_the_cache(store: &MemoryGraphStore, parent: &Group, name: &str) -> Group {
    let child = Group {
        id: Uuid::new_v4(),
        old_id: Some("29999999".into()),
        name: name.into(),
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
    };
    let edge = Membership {
        id: Uuid::new_v4(),
        membership_type: MembershipType::Group,
        created_at: Utc::now(),
        created_by: None,
        roles: Vec::new(),
    };
    let mut tx = store.begin().await.unwrap();
    tx.create_group(&child).await.unwrap();
    tx.create_membership(parent.id, &MemberRef::Group(child.id), &edge)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    child
}

fn sub_group_count(view: &GroupView) -> usize {
    view.sub_groups.as_ref().map(Vec::len).unwrap_or_default()
}

#[tokio::test]
async fn reads_are_served_from_cache_until_evicted() {
    let s = setup();
    let parent = group(&s, "Parent", "20000001").await;
    let key = GroupKey::Id(parent.id);
    let directory = s.engine.directory();

    let first = directory.get(&admin(), &key, &GetCriteria::sub_groups()).await.unwrap();
    assert_eq!(sub_group_count(&first), 0);

    attach_behind_the_cache(&s.store, &parent, "Hidden").await;
    let cached = directory.get(&admin(), &key, &GetCriteria::sub_groups()).await.unwrap();
    assert_eq!(sub_group_count(&cached), 0);

    let fresh = directory
        .get(
            &admin(),
            &key,
            &GetCriteria {
                include_sub_groups: true,
                skip_cache: true,
                ..GetCriteria::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(sub_group_count(&fresh), 1);

    // a group-type membership change evicts the parent
    let visible = group(&s, "Visible", "20000002").await;
    s.engine
        .membership()
        .add_member(&admin(), &key, &MemberSpec::group(visible.id))
        .await
        .unwrap();
    let after = directory.get(&admin(), &key, &GetCriteria::sub_groups()).await.unwrap();
    assert_eq!(sub_group_count(&after), 2);
}

#[tokio::test]
async fn each_expansion_has_its_own_entry() {
    let s = setup();
    let parent = group(&s, "Parent", "20000001").await;
    let key = GroupKey::Id(parent.id);
    let directory = s.engine.directory();
    s.engine.cache().flush_all().await.unwrap();

    directory.get(&admin(), &key, &GetCriteria::default()).await.unwrap();
    directory.get(&admin(), &key, &GetCriteria::sub_groups()).await.unwrap();
    directory.get(&admin(), &key, &GetCriteria::parent_groups()).await.unwrap();

    let coordinator = s.engine.cache();
    let mut expected = vec![
        coordinator.key(parent.id, "20000001", Expansion::None),
        coordinator.key(parent.id, "20000001", Expansion::SubGroups { one_level: false }),
        coordinator.key(parent.id, "20000001", Expansion::ParentGroups { one_level: true }),
    ];
    expected.sort();
    assert_eq!(s.cache.keys(), expected);
    assert!(expected.iter().all(|k| k.starts_with(&format!("grove:group:{}:20000001:", parent.id))));
}

#[tokio::test]
async fn groups_without_legacy_id_are_not_cached() {
    let s = setup();
    let created = s
        .engine
        .directory()
        .create(
            &admin(),
            CreateGroup {
                name: "Pending".into(),
                ..CreateGroup::default()
            },
        )
        .await
        .unwrap();

    s.engine
        .directory()
        .get(&admin(), &GroupKey::Id(created.id), &GetCriteria::sub_groups())
        .await
        .unwrap();
    assert!(s.cache.keys().is_empty());
}

#[tokio::test]
async fn cache_failures_do_not_fail_reads() {
    let s = setup();
    let parent = group(&s, "Parent", "20000001").await;
    s.cache.set_failing(true);

    let view = s
        .engine
        .directory()
        .get(&admin(), &GroupKey::Id(parent.id), &GetCriteria::sub_groups())
        .await
        .unwrap();
    assert_eq!(view.id, Some(parent.id));

    s.cache.set_failing(false);
    s.engine.cache().flush_all().await.unwrap();
    assert!(s.cache.keys().is_empty());
}

#[tokio::test]
async fn cached_private_groups_are_still_access_checked() {
    let s = setup();
    let created = s
        .engine
        .directory()
        .create(
            &admin(),
            CreateGroup {
                name: "Secret".into(),
                private_group: true,
                ..CreateGroup::default()
            },
        )
        .await
        .unwrap();
    let secret = s
        .engine
        .directory()
        .patch(
            &admin(),
            &GroupKey::Id(created.id),
            PatchGroup {
                old_id: Some("20000001".into()),
            },
        )
        .await
        .unwrap();
    let key = GroupKey::Id(secret.id);
    s.engine
        .membership()
        .add_member(&admin(), &key, &MemberSpec::user("7"))
        .await
        .unwrap();
    s.engine.cache().flush_all().await.unwrap();

    let directory = s.engine.directory();
    directory
        .get(&AuthContext::user("7", ["Topcoder User"]), &key, &GetCriteria::default())
        .await
        .unwrap();
    let cached_key = s.engine.cache().key(secret.id, "20000001", Expansion::None);
    assert_eq!(s.cache.keys(), vec![cached_key.clone()]);

    let err = directory
        .get(&AuthContext::user("8", ["Topcoder User"]), &key, &GetCriteria::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GroveError::Forbidden { .. }));
    assert_eq!(s.cache.keys(), vec![cached_key]);
}

#[tokio::test]
async fn removing_a_descendant_evicts_cached_ancestors() {
    let s = setup();
    let root = group(&s, "Root", "20000001").await;
    let middle = group(&s, "Middle", "20000002").await;
    let leaf = group(&s, "Leaf", "20000003").await;
    for (parent, child) in [(&root, &middle), (&middle, &leaf)] {
        s.engine
            .membership()
            .add_member(&admin(), &GroupKey::Id(parent.id), &MemberSpec::group(child.id))
            .await
            .unwrap();
    }
    s.engine.cache().flush_all().await.unwrap();

    let directory = s.engine.directory();
    let root_key = GroupKey::Id(root.id);
    let tree = directory.get(&admin(), &root_key, &GetCriteria::sub_groups()).await.unwrap();
    let middle_tree = &tree.sub_groups.as_ref().unwrap()[0];
    assert_eq!(middle_tree.sub_groups.as_ref().map(Vec::len), Some(1));
    let cached = s
        .engine
        .cache()
        .key(root.id, "20000001", Expansion::SubGroups { one_level: false });
    assert!(s.cache.keys().contains(&cached));

    directory.delete(&admin(), &GroupKey::Id(leaf.id)).await.unwrap();
    assert!(!s.cache.keys().contains(&cached));

    let tree = directory.get(&admin(), &root_key, &GetCriteria::sub_groups()).await.unwrap();
    let middle_tree = &tree.sub_groups.as_ref().unwrap()[0];
    assert_eq!(middle_tree.sub_groups.as_ref().map(Vec::len).unwrap_or_default(), 0);
}
