//! Grove Engine: the group hierarchy and membership graph.
//!
//! - [`GroupDirectory`] owns the group lifecycle and cascading deletes
//! - [`MembershipGraph`] mutates and queries containment edges, keeping
//!   the group-to-group graph acyclic
//! - [`GroupRoles`] manages group-local roles on membership edges
//! - [`CacheCoordinator`] layers cache-aside reads over the graph store
//!
//! Every mutation runs in one graph transaction, publishes its event
//! before commit and touches the cache after commit. Within a
//! transaction all reads precede the first write.

pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod events;
pub mod membership;
pub mod request;
mod resolve;
pub mod response;
pub mod roles;
pub mod traversal;
mod tx;

pub use cache::CacheCoordinator;
pub use config::{EngineConfig, EventTopics};
pub use directory::GroupDirectory;
pub use engine::GroveEngine;
pub use membership::MembershipGraph;
pub use request::{
    CountCriteria, Expansion, GetCriteria, MemberCountCriteria, MemberSpec, MemberTarget,
    PageCriteria, SearchCriteria,
};
pub use response::{
    BulkItem, BulkResult, BulkStatus, DeletedMembership, GroupMemberCount, GroupRoleEntry,
    MemberCount, MembershipResult, Page, ValidityCheck,
};
pub use roles::GroupRoles;
