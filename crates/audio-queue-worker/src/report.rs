//! Translation from handler results into backend state updates.

use crate::handler::HandlerResult;
use audio_queue_core::{FailureRecord, TaskMessage, TaskOutcome, TaskState, TaskStateUpdate};
use chrono::Utc;
use tracing::warn;

/// Build the state update the backend stores for a finished task.
///
/// Handler-reported failures are stored verbatim; only unanticipated errors
/// go through the default conversion.
pub fn state_update(task: &TaskMessage, worker_id: &str, result: HandlerResult) -> TaskStateUpdate {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => TaskOutcome::Failure(FailureRecord::from_task_error(&e)),
    };

    let (state, body) = match outcome.to_json() {
        Ok(body) => (outcome.state(), body),
        Err(e) => {
            warn!(task_id = %task.id, "Failed to encode task result: {}", e);
            let record = FailureRecord::from_task_error(&e);
            (TaskState::Failure, serde_json::to_vec(&record).unwrap_or_default())
        }
    };

    TaskStateUpdate {
        task_id: task.id,
        task_name: task.name.clone(),
        state,
        worker_id: worker_id.to_string(),
        result: body,
        date_done: Utc::now(),
    }
}
