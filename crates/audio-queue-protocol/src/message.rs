use audio_queue_core::{TaskId, TaskMessage, TaskName, TaskState, TaskStateUpdate};
use serde::{Deserialize, Serialize};

/// Message types for the TCP protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    ClaimTask = 1,
    TaskDone = 2,
    Heartbeat = 3,
    StoreResult = 4,
    Ping = 5,
    Ack = 6,
    Nack = 7,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::ClaimTask),
            2 => Some(MessageType::TaskDone),
            3 => Some(MessageType::Heartbeat),
            4 => Some(MessageType::StoreResult),
            5 => Some(MessageType::Ping),
            6 => Some(MessageType::Ack),
            7 => Some(MessageType::Nack),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Protocol messages exchanged with the broker and the result backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Worker asks the broker for the next task (reply: Ack/Nack)
    ClaimTask(ClaimTaskRequest),

    /// Worker acknowledges a finished task to the broker (no reply)
    TaskDone(TaskDoneRequest),

    /// Worker heartbeat to the broker (no reply)
    Heartbeat(HeartbeatRequest),

    /// Worker stores a task state in the backend (reply: Ack/Nack)
    StoreResult(StoreResultRequest),

    /// Reachability probe for broker and backend (reply: Ack)
    Ping(PingRequest),

    /// Positive acknowledgment
    Ack(AckResponse),

    /// Negative acknowledgment
    Nack(NackResponse),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::ClaimTask(_) => MessageType::ClaimTask,
            Message::TaskDone(_) => MessageType::TaskDone,
            Message::Heartbeat(_) => MessageType::Heartbeat,
            Message::StoreResult(_) => MessageType::StoreResult,
            Message::Ping(_) => MessageType::Ping,
            Message::Ack(_) => MessageType::Ack,
            Message::Nack(_) => MessageType::Nack,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTaskRequest {
    pub worker_id: String,
    /// Task names this worker has handlers for
    pub task_names: Vec<TaskName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDoneRequest {
    pub task_id: TaskId,
    pub worker_id: String,
    pub state: TaskState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: String,
    pub current_task_count: usize,
    pub cpu_usage_percent: f32,
    pub memory_usage_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResultRequest {
    pub update: TaskStateUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    pub client: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AckResponse {
    /// Task handed out in reply to ClaimTask, if any
    pub task: Option<TaskMessage>,
    /// Optional message
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NackResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversion() {
        assert_eq!(MessageType::from_u8(1), Some(MessageType::ClaimTask));
        assert_eq!(MessageType::from_u8(4), Some(MessageType::StoreResult));
        assert_eq!(MessageType::from_u8(0), None);
        assert_eq!(MessageType::from_u8(99), None);

        assert_eq!(MessageType::Ping.as_u8(), 5);
        assert_eq!(
            Message::Nack(NackResponse { error: "x".into() }).message_type(),
            MessageType::Nack
        );
    }
}
