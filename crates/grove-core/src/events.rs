//! Event publisher port.
//!
//! Publication happens before the triggering transaction commits; an
//! error returned here vetoes the mutation.

use crate::error::GroveResult;

pub trait EventPublisher: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = GroveResult<()>> + Send;
}
