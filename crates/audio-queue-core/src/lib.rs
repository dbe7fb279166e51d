mod error;
mod outcome;
mod task;

pub use error::{Result, TaskError};
pub use outcome::{FailureRecord, TaskOutcome, TaskStateUpdate};
pub use task::{TaskArguments, TaskId, TaskMessage, TaskMessageBuilder, TaskName, TaskState};

pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB
