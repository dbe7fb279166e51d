use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Payload size exceeds maximum allowed size of {max} bytes (got {actual})")]
    PayloadTooLarge { max: usize, actual: usize },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid task arguments: {0}")]
    InvalidArguments(String),

    #[error("No handler registered for task: {0}")]
    UnknownTask(String),

    #[error("Task exceeded its time limit of {0} seconds")]
    TimeLimitExceeded(u64),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task was cancelled")]
    Cancelled,
}

impl TaskError {
    /// Category name reported as `exc_type` when the worker converts this
    /// error into a failure record on the handler's behalf.
    pub fn exc_type(&self) -> &'static str {
        match self {
            TaskError::PayloadTooLarge { .. } => "PayloadTooLarge",
            TaskError::JsonError(_) => "JSONDecodeError",
            TaskError::InvalidArguments(_) => "TypeError",
            TaskError::UnknownTask(_) => "NotRegistered",
            TaskError::TimeLimitExceeded(_) => "TimeLimitExceeded",
            TaskError::Panicked(_) => "WorkerPanic",
            TaskError::Cancelled => "Cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
