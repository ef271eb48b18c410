//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs are stored as record ids (strings);
//! membership edges live in a plain `membership` table keyed by parent id,
//! member type and member key so duplicate edges are rejected by a
//! UNIQUE index.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "membership_graph",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD old_id ON TABLE group TYPE option<string>;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD description ON TABLE group TYPE option<string>;
DEFINE FIELD private_group ON TABLE group TYPE bool DEFAULT false;
DEFINE FIELD self_register ON TABLE group TYPE bool DEFAULT false;
DEFINE FIELD domain ON TABLE group TYPE string DEFAULT '';
DEFINE FIELD sso_id ON TABLE group TYPE string DEFAULT '';
DEFINE FIELD organization_id ON TABLE group TYPE string DEFAULT '';
DEFINE FIELD status ON TABLE group TYPE string \
    ASSERT $value IN ['active', 'inactive'];
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD created_by ON TABLE group TYPE option<string>;
DEFINE FIELD updated_at ON TABLE group TYPE option<datetime>;
DEFINE FIELD updated_by ON TABLE group TYPE option<string>;
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;
DEFINE INDEX idx_group_old_id ON TABLE group COLUMNS old_id;

-- =======================================================================
-- Users (record id is the legacy id, or the universal UID)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD legacy_id ON TABLE user TYPE option<string>;
DEFINE FIELD universal_uid ON TABLE user TYPE option<string>;
DEFINE INDEX idx_user_legacy_id ON TABLE user COLUMNS legacy_id;
DEFINE INDEX idx_user_universal_uid ON TABLE user COLUMNS universal_uid;

-- =======================================================================
-- Group -> Group|User containment edges
-- =======================================================================
DEFINE TABLE membership SCHEMAFULL;
DEFINE FIELD parent_id ON TABLE membership TYPE string;
DEFINE FIELD member_type ON TABLE membership TYPE string \
    ASSERT $value IN ['group', 'user'];
DEFINE FIELD member_key ON TABLE membership TYPE string;
DEFINE FIELD created_at ON TABLE membership TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD created_by ON TABLE membership TYPE option<string>;
DEFINE FIELD grants ON TABLE membership TYPE object FLEXIBLE DEFAULT {};
DEFINE INDEX idx_membership_edge ON TABLE membership \
    COLUMNS parent_id, member_type, member_key UNIQUE;
DEFINE INDEX idx_membership_member ON TABLE membership \
    COLUMNS member_type, member_key;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Bring the graph schema up to date. Each pending migration and its
/// `_migration` record are sent as one request.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let applied = applied_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        debug!(version = applied, "Graph schema up to date");
        return Ok(());
    }
    for migration in pending {
        apply(db, migration).await?;
    }
    Ok(())
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version, name FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(version = migration.version, name = migration.name, "Applying graph migration");
    db.query(migration.sql)
        .query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("v{} '{}': {e}", migration.version, migration.name))
        })?;
    Ok(())
}

/// Raw DDL of schema version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn edge_uniqueness_is_indexed() {
        assert!(SCHEMA_V1.contains("COLUMNS parent_id, member_type, member_key UNIQUE"));
        assert!(SCHEMA_V1.contains("COLUMNS name UNIQUE"));
    }
}
