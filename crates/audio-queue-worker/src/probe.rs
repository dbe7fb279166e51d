use crate::config::parse_service_url;
use crate::connection::request;
use crate::{WorkerConfig, WorkerError};
use async_trait::async_trait;
use audio_queue_protocol::{Message, PingRequest};
use std::time::Duration;
use tracing::debug;

/// Reachability check for an external service
#[async_trait]
pub trait ServiceCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Connection string of the service
    fn url(&self) -> &str;

    async fn is_running(&self) -> bool;
}

/// Pings a broker or backend over the task-queue protocol
#[derive(Debug, Clone)]
pub struct ServiceProbe {
    name: String,
    url: String,
    timeout: Duration,
}

impl ServiceProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        ServiceProbe {
            name: name.into(),
            url: url.into(),
            timeout,
        }
    }

    pub fn broker(config: &WorkerConfig) -> Self {
        Self::new("broker", config.broker_url.clone(), config.probe_timeout())
    }

    pub fn backend(config: &WorkerConfig) -> Self {
        Self::new("backend", config.backend_url.clone(), config.probe_timeout())
    }

    pub async fn ping(&self) -> Result<(), WorkerError> {
        let address = parse_service_url(&self.url)?;
        let ping = Message::Ping(PingRequest {
            client: format!("audio-worker/{}", std::process::id()),
        });

        match request(address, ping, self.timeout).await? {
            Message::Ack(_) => Ok(()),
            other => Err(WorkerError::UnexpectedResponse(other.message_type())),
        }
    }
}

#[async_trait]
impl ServiceCheck for ServiceProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn is_running(&self) -> bool {
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                debug!(service = %self.name, url = %self.url, "Probe failed: {}", e);
                false
            }
        }
    }
}
