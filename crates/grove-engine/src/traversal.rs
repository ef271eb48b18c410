//! Breadth-first traversals of the containment graph.
//!
//! Every traversal keeps a visited set, so each group is queried at
//! most once, and stops after `max_depth` layers.

use std::collections::{HashMap, HashSet, VecDeque};

use grove_core::error::GroveResult;
use grove_core::models::group::{Group, GroupTree};
use grove_core::models::membership::MemberRef;
use grove_core::repository::GraphRead;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards contained groups.
    Down,
    /// Towards containing groups.
    Up,
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub group: Group,
    /// `None` until the node has been expanded.
    pub neighbours: Option<Vec<Uuid>>,
}

/// Arena of the groups reached from a root, keyed by id.
#[derive(Debug, Clone)]
pub struct GroupHierarchy {
    root: Uuid,
    direction: Direction,
    depth_limit: usize,
    nodes: HashMap<Uuid, HierarchyNode>,
    order: Vec<Uuid>,
}

impl GroupHierarchy {
    /// Expand `root` one layer when `one_level`, else up to `max_depth`
    /// layers. Neighbours are visited in legacy id order.
    pub async fn expand<R: GraphRead>(
        reader: &R,
        root: Group,
        direction: Direction,
        one_level: bool,
        max_depth: usize,
    ) -> GroveResult<Self> {
        let depth_limit = if one_level { 1 } else { max_depth };
        let root_id = root.id;
        let mut nodes = HashMap::from([(
            root_id,
            HierarchyNode {
                group: root,
                neighbours: None,
            },
        )]);
        let mut order = vec![root_id];
        let mut pending = VecDeque::from([(root_id, 0usize)]);

        while let Some((id, depth)) = pending.pop_front() {
            let expanded = nodes.get(&id).is_some_and(|n| n.neighbours.is_some());
            if expanded || depth >= depth_limit {
                continue;
            }
            let found = match direction {
                Direction::Down => reader.child_groups(id).await?,
                Direction::Up => reader.parent_groups(id).await?,
            };
            let ids: Vec<Uuid> = found.iter().map(|g| g.id).collect();
            for group in found {
                let next = group.id;
                if !nodes.contains_key(&next) {
                    order.push(next);
                    nodes.insert(
                        next,
                        HierarchyNode {
                            group,
                            neighbours: None,
                        },
                    );
                }
                if !one_level {
                    pending.push_back((next, depth + 1));
                }
            }
            if let Some(node) = nodes.get_mut(&id) {
                node.neighbours = Some(ids);
            }
        }

        Ok(Self {
            root: root_id,
            direction,
            depth_limit,
            nodes,
            order,
        })
    }

    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn node(&self, id: Uuid) -> Option<&HierarchyNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of every reached group, root first, in discovery order.
    pub fn flattened_ids(&self) -> Vec<Uuid> {
        self.order.clone()
    }

    /// Nested rendering. Expanded nodes carry their (possibly empty)
    /// neighbour list, boundary nodes carry none. Sub-group expansions
    /// also list the flattened ids on the root.
    pub fn into_tree(self) -> GroupTree {
        let mut tree = self.render(&self.nodes[&self.root], 0);
        if self.direction == Direction::Down {
            tree.flatten_group_id_tree = Some(self.flattened_ids());
        }
        tree
    }

    fn render(&self, node: &HierarchyNode, depth: usize) -> GroupTree {
        let mut tree = GroupTree::leaf(node.group.clone());
        if depth >= self.depth_limit {
            return tree;
        }
        let neighbours = node.neighbours.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|next| self.nodes.get(next))
                .map(|next| self.render(next, depth + 1))
                .collect::<Vec<_>>()
        });
        match self.direction {
            Direction::Down => tree.sub_groups = neighbours,
            Direction::Up => tree.parent_groups = neighbours,
        }
        tree
    }
}

/// Distinct users contained in `root` or in any group below it.
pub async fn count_descendant_users<R: GraphRead>(
    reader: &R,
    root: Uuid,
    max_depth: usize,
) -> GroveResult<u64> {
    let mut users = HashSet::new();
    let mut seen = HashSet::from([root]);
    let mut pending = VecDeque::from([(root, 0usize)]);

    while let Some((id, depth)) = pending.pop_front() {
        for user in reader.direct_user_members(id).await? {
            users.insert(user.node_key());
        }
        if depth >= max_depth {
            continue;
        }
        for child in reader.child_groups(id).await? {
            if seen.insert(child.id) {
                pending.push_back((child.id, depth + 1));
            }
        }
    }
    Ok(users.len() as u64)
}

/// Every group that contains `member` directly or through other groups,
/// in discovery order.
pub async fn ancestor_groups<R: GraphRead>(
    reader: &R,
    member: &MemberRef,
    max_depth: usize,
) -> GroveResult<Vec<Group>> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = VecDeque::new();

    for group in reader.containing_groups(member).await? {
        if seen.insert(group.id) {
            pending.push_back((group.id, 1usize));
            found.push(group);
        }
    }
    while let Some((id, depth)) = pending.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for parent in reader.parent_groups(id).await? {
            if seen.insert(parent.id) {
                pending.push_back((parent.id, depth + 1));
                found.push(parent);
            }
        }
    }
    Ok(found)
}

/// Groups removed when `root` is deleted: the root and, transitively,
/// every child whose only parent is already in the set. A child with two
/// or more parents survives.
pub async fn cascade_set<R: GraphRead>(
    reader: &R,
    root: Group,
    max_depth: usize,
) -> GroveResult<Vec<Group>> {
    let mut doomed = vec![root];
    let mut ids = HashSet::from([doomed[0].id]);
    let mut depths = vec![0usize];
    let mut index = 0;

    while index < doomed.len() {
        let (id, depth) = (doomed[index].id, depths[index]);
        index += 1;
        if depth >= max_depth {
            continue;
        }
        for child in reader.child_groups(id).await? {
            if ids.contains(&child.id) {
                continue;
            }
            if reader.parent_groups(child.id).await?.len() <= 1 {
                ids.insert(child.id);
                doomed.push(child);
                depths.push(depth + 1);
            }
        }
    }
    Ok(doomed)
}
