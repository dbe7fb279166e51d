use async_trait::async_trait;
use audio_queue_core::{TaskArguments, TaskError, TaskId, TaskMessage, TaskName, TaskOutcome};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Result type for task handlers.
///
/// `Ok(TaskOutcome::Failure(..))` is a failure the handler has already
/// described; `Err(..)` is converted by the worker's default failure mapping.
pub type HandlerResult = Result<TaskOutcome, TaskError>;

/// Trait for task handlers
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute one invocation described by `ctx`
    async fn execute(&self, ctx: &TaskContext) -> HandlerResult;
}

/// Per-invocation request information handed to a handler
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub task_name: TaskName,
    pub worker_id: String,
    pub retries: u32,
    pub arguments: TaskArguments,
}

impl TaskContext {
    /// Build a context for a direct invocation outside the broker loop
    pub fn new(task_name: impl Into<TaskName>, arguments: TaskArguments) -> Self {
        TaskContext {
            task_id: Uuid::new_v4(),
            task_name: task_name.into(),
            worker_id: "local".to_string(),
            retries: 0,
            arguments,
        }
    }

    pub fn from_message(task: &TaskMessage, worker_id: &str) -> Result<Self, TaskError> {
        Ok(TaskContext {
            task_id: task.id,
            task_name: task.name.clone(),
            worker_id: worker_id.to_string(),
            retries: task.retries,
            arguments: task.arguments()?,
        })
    }

    pub fn args(&self) -> &[Value] {
        &self.arguments.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.arguments.kwargs
    }

    /// Argument at `position`, falling back to the `keyword` argument
    pub fn argument(&self, position: usize, keyword: &str) -> Option<&Value> {
        self.arguments.get(position, keyword)
    }
}

/// Registry of task handlers by task name
pub struct TaskHandlerRegistry {
    handlers: Arc<RwLock<HashMap<TaskName, Arc<dyn TaskHandler>>>>,
}

impl TaskHandlerRegistry {
    pub fn new() -> Self {
        TaskHandlerRegistry {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a task handler under a task name
    pub fn register<H: TaskHandler + 'static>(&self, task_name: impl Into<TaskName>, handler: H) {
        let mut handlers = self.handlers.write();
        handlers.insert(task_name.into(), Arc::new(handler));
    }

    /// Get the handler for a task name
    pub fn get(&self, task_name: &str) -> Option<Arc<dyn TaskHandler>> {
        let handlers = self.handlers.read();
        handlers.get(task_name).cloned()
    }

    pub fn has_handler(&self, task_name: &str) -> bool {
        let handlers = self.handlers.read();
        handlers.contains_key(task_name)
    }

    /// All registered task names, sorted
    pub fn task_types(&self) -> Vec<TaskName> {
        let handlers = self.handlers.read();
        let mut names: Vec<TaskName> = handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for TaskHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
