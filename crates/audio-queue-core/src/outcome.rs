use crate::{Result, TaskError, TaskId, TaskName, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured failure details stored as the task's result.
///
/// Handler-reported failures carry either a `traceback` or a fixed
/// human-readable `message`; failures converted by the worker carry neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub exc_type: String,
    pub exc_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FailureRecord {
    pub fn new(exc_type: impl Into<String>, exc_message: impl Into<String>) -> Self {
        FailureRecord {
            exc_type: exc_type.into(),
            exc_message: exc_message.into(),
            traceback: None,
            message: None,
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<String>) -> Self {
        self.traceback = Some(traceback);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Default conversion for errors a handler did not anticipate.
    pub fn from_task_error(error: &TaskError) -> Self {
        FailureRecord::new(error.exc_type(), error.to_string())
    }
}

/// What a task body hands back to the worker.
///
/// `Failure` means the handler already decided how the failure is reported;
/// the worker stores it verbatim and does not convert it again.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(Value),
    Failure(FailureRecord),
}

impl TaskOutcome {
    pub fn success<T: Serialize>(result: &T) -> Result<Self> {
        Ok(TaskOutcome::Success(serde_json::to_value(result)?))
    }

    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Success(_) => TaskState::Success,
            TaskOutcome::Failure(_) => TaskState::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// JSON body stored by the backend for this outcome.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            TaskOutcome::Success(value) => serde_json::to_vec(value)?,
            TaskOutcome::Failure(record) => serde_json::to_vec(record)?,
        };
        Ok(bytes)
    }
}

/// State transition sent to the result backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStateUpdate {
    pub task_id: TaskId,
    pub task_name: TaskName,
    pub state: TaskState,
    pub worker_id: String,
    /// JSON result or failure record
    pub result: Vec<u8>,
    pub date_done: DateTime<Utc>,
}

impl TaskStateUpdate {
    pub fn result_json(&self) -> Result<Value> {
        serde_json::from_slice(&self.result).map_err(TaskError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_traceback_failure_shape() {
        let record = FailureRecord::new("ConnectError", "connection refused")
            .with_traceback(vec!["line 1".into(), "line 2".into()]);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["exc_type"], "ConnectError");
        assert_eq!(value["traceback"], json!(["line 1", "line 2"]));
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_message_failure_shape() {
        let record =
            FailureRecord::new("UnsupportedError", "unsupported feature").with_message("Unable to load file");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["message"], "Unable to load file");
        assert!(value.get("traceback").is_none());
    }

    #[test]
    fn test_default_conversion_has_no_details() {
        let record = FailureRecord::from_task_error(&TaskError::Cancelled);
        assert_eq!(record.exc_type, "Cancelled");
        assert_eq!(record.exc_message, "Task was cancelled");
        assert!(record.traceback.is_none() && record.message.is_none());
    }

    #[test]
    fn test_outcome_state_and_json() {
        let outcome = TaskOutcome::success(&json!({"audio_length": 2.0})).unwrap();
        assert_eq!(outcome.state(), TaskState::Success);
        let body: Value = serde_json::from_slice(&outcome.to_json().unwrap()).unwrap();
        assert_eq!(body, json!({"audio_length": 2.0}));

        let failed = TaskOutcome::Failure(FailureRecord::new("X", "y"));
        assert_eq!(failed.state(), TaskState::Failure);
        assert!(!failed.is_success());
    }
}
