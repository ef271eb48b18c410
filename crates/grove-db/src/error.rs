//! Database-specific error types and conversions.

use grove_core::error::GroveError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store is offline")]
    Offline,

    #[error("Graph store at {url} did not answer in time")]
    Unreachable { url: String },
}

impl From<DbError> for GroveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GroveError::NotFound { entity, id },
            DbError::Conflict(message) => GroveError::Conflict { message },
            DbError::Surreal(e) => classify_surreal(e.to_string()),
            unreachable @ DbError::Unreachable { .. } => {
                GroveError::ServiceUnavailable(unreachable.to_string())
            }
            other => GroveError::Database(other.to_string()),
        }
    }
}

/// Unique index violations become conflicts; connection failures and
/// timeouts become `ServiceUnavailable`.
fn classify_surreal(message: String) -> GroveError {
    let lower = message.to_lowercase();
    if lower.contains("already contains") {
        GroveError::conflict("The record already exists")
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("websocket")
    {
        GroveError::ServiceUnavailable(message)
    } else {
        GroveError::Database(message)
    }
}

#[cfg(test)]
mod tests {
    use grove_core::error::ErrorKind;

    use super::*;

    #[test]
    fn surreal_messages_are_classified() {
        let err = classify_surreal(
            "Database index `idx_membership_edge` already contains ['a', 'group', 'b']".into(),
        );
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = classify_surreal("The query was not executed because it timed out".into());
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);

        let err = classify_surreal("Parse error".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn unreachable_store_is_unavailable() {
        let err: GroveError = DbError::Unreachable {
            url: "127.0.0.1:8000".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn not_found_keeps_entity() {
        let err: GroveError = DbError::NotFound {
            entity: "group".into(),
            id: "42".into(),
        }
        .into();
        assert!(matches!(err, GroveError::NotFound { ref entity, .. } if entity == "group"));
    }
}
