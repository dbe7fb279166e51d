use crate::config::parse_service_url;
use crate::connection::request;
use crate::WorkerError;
use audio_queue_core::TaskStateUpdate;
use audio_queue_protocol::{Message, StoreResultRequest};
use std::time::Duration;
use tracing::debug;

/// Client for the result backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    url: String,
    address: String,
    io_timeout: Duration,
}

impl BackendClient {
    pub fn new(url: &str, io_timeout: Duration) -> Result<Self, WorkerError> {
        let address = parse_service_url(url)?.to_string();
        Ok(BackendClient {
            url: url.to_string(),
            address,
            io_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Store a task state; succeeds once the backend acknowledged it
    pub async fn store(&self, update: TaskStateUpdate) -> Result<(), WorkerError> {
        let task_id = update.task_id;
        let state = update.state;
        let reply = request(
            &self.address,
            Message::StoreResult(StoreResultRequest { update }),
            self.io_timeout,
        )
        .await?;

        match reply {
            Message::Ack(_) => {
                debug!(%task_id, %state, "Task state stored");
                Ok(())
            }
            other => Err(WorkerError::UnexpectedResponse(other.message_type())),
        }
    }
}
