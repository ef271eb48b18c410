//! Transaction completion.

use grove_core::error::{ErrorKind, GroveResult};
use grove_core::repository::GraphTx;
use tracing::{debug, error, warn};

/// Commit `tx` when `result` is a success, roll it back otherwise. The
/// operation's own error wins over a rollback failure.
pub(crate) async fn finish<T: GraphTx, V>(tx: T, result: GroveResult<V>) -> GroveResult<V> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if err.kind() == ErrorKind::Internal {
                error!(error = %err, "Operation failed");
            }
            debug!("Transaction rollback");
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(err)
        }
    }
}
