use crate::{Result, TaskError, MAX_PAYLOAD_SIZE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a task
pub type TaskId = Uuid;

/// Registered task name (e.g., "audio.audio_length")
pub type TaskName = String;

/// Final state of a task as reported to the result backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Task completed successfully
    Success,
    /// Task failed
    Failure,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional and keyword arguments of a task invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArguments {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskArguments {
    pub fn positional(args: Vec<Value>) -> Self {
        TaskArguments {
            args,
            kwargs: Map::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Looks up an argument by position first, then by keyword.
    pub fn get(&self, position: usize, keyword: &str) -> Option<&Value> {
        self.args.get(position).or_else(|| self.kwargs.get(keyword))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(TaskError::from)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(TaskError::from)
    }
}

/// A task message as delivered by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Unique task identifier
    pub id: TaskId,

    /// Registered task name
    pub name: TaskName,

    /// JSON-encoded `TaskArguments`
    pub payload: Vec<u8>,

    /// When the task was published
    pub created_at: DateTime<Utc>,

    /// Hard time limit in seconds (0 = worker default)
    pub time_limit_secs: u32,

    /// How many times the broker has redelivered this task
    pub retries: u32,
}

impl TaskMessage {
    /// Create a new task message
    pub fn new(name: impl Into<TaskName>, arguments: &TaskArguments) -> Result<Self> {
        Self::builder(name, arguments.clone()).build()
    }

    pub fn builder(name: impl Into<TaskName>, arguments: TaskArguments) -> TaskMessageBuilder {
        TaskMessageBuilder::new(name.into(), arguments)
    }

    /// Decode the JSON arguments carried in the payload
    pub fn arguments(&self) -> Result<TaskArguments> {
        TaskArguments::from_json(&self.payload)
    }
}

/// Builder for task messages with custom limits
pub struct TaskMessageBuilder {
    name: TaskName,
    arguments: TaskArguments,
    time_limit_secs: u32,
    retries: u32,
}

impl TaskMessageBuilder {
    pub fn new(name: TaskName, arguments: TaskArguments) -> Self {
        TaskMessageBuilder {
            name,
            arguments,
            time_limit_secs: 0,
            retries: 0,
        }
    }

    pub fn time_limit_secs(mut self, time_limit_secs: u32) -> Self {
        self.time_limit_secs = time_limit_secs;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn build(self) -> Result<TaskMessage> {
        let payload = self.arguments.to_json()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TaskError::PayloadTooLarge {
                max: MAX_PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }

        Ok(TaskMessage {
            id: Uuid::new_v4(),
            name: self.name,
            payload,
            created_at: Utc::now(),
            time_limit_secs: self.time_limit_secs,
            retries: self.retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_creation() {
        let args = TaskArguments::positional(vec![json!("https://example.test/clip.wav")]);
        let task = TaskMessage::new("audio.audio_length", &args).unwrap();

        assert_eq!(task.name, "audio.audio_length");
        assert_eq!(task.time_limit_secs, 0);
        assert_eq!(task.retries, 0);
        assert_eq!(task.arguments().unwrap(), args);
    }

    #[test]
    fn test_builder_limits() {
        let args = TaskArguments::default().with_kwarg("audio_url", json!("file:///tmp/a.wav"));
        let task = TaskMessage::builder("audio.audio_length", args)
            .time_limit_secs(60)
            .retries(3)
            .build()
            .unwrap();

        assert_eq!(task.time_limit_secs, 60);
        assert_eq!(task.retries, 3);
        assert_eq!(
            task.arguments().unwrap().get(0, "audio_url"),
            Some(&json!("file:///tmp/a.wav"))
        );
    }

    #[test]
    fn test_argument_lookup_prefers_position() {
        let args = TaskArguments::positional(vec![json!("positional")])
            .with_kwarg("audio_url", json!("keyword"));
        assert_eq!(args.get(0, "audio_url"), Some(&json!("positional")));
        assert_eq!(args.get(1, "audio_url"), Some(&json!("keyword")));
        assert_eq!(args.get(1, "missing"), None);
    }

    #[test]
    fn test_arguments_accept_missing_sections() {
        let args = TaskArguments::from_json(br#"{"args": ["x"]}"#).unwrap();
        assert_eq!(args.args, vec![json!("x")]);
        assert!(args.kwargs.is_empty());
    }

    #[test]
    fn test_task_state_names() {
        assert_eq!(TaskState::Success.as_str(), "SUCCESS");
        assert_eq!(TaskState::Failure.to_string(), "FAILURE");

        assert_eq!(serde_json::to_value(TaskState::Success).unwrap(), json!("SUCCESS"));
        assert_eq!(serde_json::to_value(TaskState::Failure).unwrap(), json!("FAILURE"));
        assert_eq!(
            serde_json::from_value::<TaskState>(json!("FAILURE")).unwrap(),
            TaskState::Failure
        );
        assert!(serde_json::from_value::<TaskState>(json!("Failure")).is_err());
    }

    #[test]
    fn test_payload_size_limit() {
        let huge = "x".repeat(MAX_PAYLOAD_SIZE + 1);
        let result = TaskMessage::new("audio.audio_length", &TaskArguments::positional(vec![json!(huge)]));

        match result {
            Err(TaskError::PayloadTooLarge { .. }) => {}
            _ => panic!("Expected PayloadTooLarge error"),
        }
    }
}
