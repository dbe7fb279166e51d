mod codec;
mod message;

pub use codec::MessageCodec;
pub use message::{
    AckResponse, ClaimTaskRequest, HeartbeatRequest, Message, MessageType, NackResponse,
    PingRequest, StoreResultRequest, TaskDoneRequest,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Maximum message size: 4MB (1MB task payload plus result bodies and overhead)
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
