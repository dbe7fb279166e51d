use crate::handler::{HandlerResult, TaskContext, TaskHandler};
use audio_queue_core::TaskError;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Task executor with time limit and panic recovery
pub struct TaskExecutor {
    handler: Arc<dyn TaskHandler>,
}

impl TaskExecutor {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        TaskExecutor { handler }
    }

    /// Run the handler on its own task so a panic or an overrun only
    /// affects this invocation.
    pub async fn execute(&self, ctx: TaskContext, time_limit: Duration) -> HandlerResult {
        let task_id = ctx.task_id;
        let handler = self.handler.clone();

        info!(%task_id, task_name = %ctx.task_name, ?time_limit, "Executing task");

        let join = tokio::spawn(async move { handler.execute(&ctx).await });
        let abort = join.abort_handle();

        match timeout(time_limit, join).await {
            Ok(Ok(result)) => {
                if let Err(e) = &result {
                    warn!(%task_id, "Task raised an unhandled error: {}", e);
                }
                result
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                let reason = panic_message(join_error.into_panic());
                error!(%task_id, "Task panicked: {}", reason);
                Err(TaskError::Panicked(reason))
            }
            Ok(Err(_)) => {
                error!(%task_id, "Task was cancelled");
                Err(TaskError::Cancelled)
            }
            Err(_) => {
                abort.abort();
                error!(%task_id, "Task timed out after {:?}", time_limit);
                Err(TaskError::TimeLimitExceeded(time_limit.as_secs()))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
