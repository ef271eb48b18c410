//! Authorization configuration.

use grove_core::models::membership::GroupRoleName;

/// Configuration for the authorization policy.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Role marking a human administrator, compared case-insensitively
    /// (default: `Administrator`).
    pub admin_role: String,
    /// Group roles that allow adding and removing members of the group.
    pub member_manager_roles: Vec<GroupRoleName>,
    /// Group roles that allow creating and deleting sub groups.
    pub sub_group_admin_roles: Vec<GroupRoleName>,
    /// Machine-token scopes granting read access.
    pub read_scopes: Vec<String>,
    /// Machine-token scopes granting write access.
    pub write_scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_role: "Administrator".into(),
            member_manager_roles: vec![GroupRoleName::GroupManager, GroupRoleName::GroupAdmin],
            sub_group_admin_roles: vec![GroupRoleName::GroupAdmin],
            read_scopes: vec![
                "read:groups".into(),
                "write:groups".into(),
                "all:groups".into(),
                "all:resources".into(),
            ],
            write_scopes: vec![
                "write:groups".into(),
                "all:groups".into(),
                "all:resources".into(),
            ],
        }
    }
}
