//! Publisher posting envelopes to an HTTP event bus.

use grove_core::error::GroveResult;
use grove_core::events::EventPublisher;
use reqwest::Client as ReqwestClient;
use tracing::{debug, error};

use crate::config::BusConfig;
use crate::envelope::EventEnvelope;
use crate::error::BusError;

pub struct BusApiPublisher {
    client: ReqwestClient,
    config: BusConfig,
}

impl BusApiPublisher {
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        let client = ReqwestClient::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn post(&self, envelope: &EventEnvelope) -> Result<(), BusError> {
        let mut request = self.client.post(&self.config.url).json(envelope);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BusError::Rejected {
                topic: envelope.topic.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl EventPublisher for BusApiPublisher {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> GroveResult<()> {
        let envelope = EventEnvelope::new(topic, &self.config.originator, payload);
        debug!(topic, "Publishing event");
        if let Err(e) = self.post(&envelope).await {
            error!(topic, error = %e, "Event publication failed");
            return Err(e.into());
        }
        Ok(())
    }
}
