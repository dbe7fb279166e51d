use audio_queue_protocol::{MessageType, ProtocolError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid service url: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0:?}")]
    UnexpectedResponse(MessageType),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("No response within {0:?}")]
    Timeout(Duration),
}
