use crate::config::AudioLengthConfig;
use crate::decode::{extension_hint, measure_duration_blocking};
use crate::error::{DecodeError, FetchError};
use crate::fetch::{AudioFetcher, FetchConfig};
use async_trait::async_trait;
use audio_queue_core::{FailureRecord, TaskError, TaskOutcome};
use audio_queue_worker::{HandlerResult, TaskContext, TaskHandler};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info, warn};

/// Name the task is registered and routed under
pub const AUDIO_LENGTH_TASK: &str = "audio.audio_length";

/// Fixed message attached to every decode failure
pub const UNABLE_TO_LOAD: &str = "Unable to load file";

/// Progress of one invocation. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Fetching,
    FetchFailed,
    Decoding,
    DecodeFailed,
    Measuring,
    Succeeded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "PENDING",
            Stage::Fetching => "FETCHING",
            Stage::FetchFailed => "FETCH_FAILED",
            Stage::Decoding => "DECODING",
            Stage::DecodeFailed => "DECODE_FAILED",
            Stage::Measuring => "MEASURING",
            Stage::Succeeded => "SUCCEEDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::FetchFailed | Stage::DecodeFailed | Stage::Succeeded)
    }

    pub fn can_advance_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Pending, Stage::Fetching)
                | (Stage::Fetching, Stage::FetchFailed)
                | (Stage::Fetching, Stage::Decoding)
                | (Stage::Decoding, Stage::DecodeFailed)
                | (Stage::Decoding, Stage::Measuring)
                | (Stage::Measuring, Stage::Succeeded)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct StageTracker<'a> {
    url: &'a str,
    stage: Stage,
}

impl<'a> StageTracker<'a> {
    fn new(url: &'a str) -> Self {
        StageTracker {
            url,
            stage: Stage::Pending,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {} -> {}",
            self.stage,
            next
        );
        debug!(url = %self.url, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
    }
}

/// Measures the duration of the audio resource at `audio_url`
pub struct AudioLengthTask {
    fetcher: AudioFetcher,
    config: AudioLengthConfig,
}

impl AudioLengthTask {
    pub fn new(config: AudioLengthConfig) -> Result<Self, FetchError> {
        let fetcher = AudioFetcher::new(&FetchConfig::from(&config))?;
        Ok(AudioLengthTask { fetcher, config })
    }

    /// Fetch, decode and measure `url`.
    ///
    /// Fetch and decode problems are reported as `TaskOutcome::Failure`;
    /// this never returns an error of its own.
    pub async fn measure(&self, url: &str) -> TaskOutcome {
        let mut stage = StageTracker::new(url);

        stage.advance(Stage::Fetching);
        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                stage.advance(Stage::FetchFailed);
                warn!(url = %url, exc_type = e.exc_type(), "Failed to fetch audio: {}", e);
                return fetch_failure(&e);
            }
        };

        stage.advance(Stage::Decoding);
        let measurement = match measure_duration_blocking(bytes, extension_hint(url)).await {
            Ok(measurement) => measurement,
            Err(e) => {
                stage.advance(Stage::DecodeFailed);
                warn!(url = %url, exc_type = e.exc_type(), "Failed to decode audio: {}", e);
                return decode_failure(&e);
            }
        };

        stage.advance(Stage::Measuring);
        let audio_length = measurement.duration_secs;
        let delay = self.config.simulated_delay(audio_length);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        stage.advance(Stage::Succeeded);
        TaskOutcome::Success(json!({ "audio_length": audio_length }))
    }
}

fn fetch_failure(err: &FetchError) -> TaskOutcome {
    TaskOutcome::Failure(
        FailureRecord::new(err.exc_type(), err.message()).with_traceback(err.traceback().to_vec()),
    )
}

fn decode_failure(err: &DecodeError) -> TaskOutcome {
    TaskOutcome::Failure(
        FailureRecord::new(err.exc_type(), err.to_string()).with_message(UNABLE_TO_LOAD),
    )
}

#[async_trait]
impl TaskHandler for AudioLengthTask {
    async fn execute(&self, ctx: &TaskContext) -> HandlerResult {
        info!(
            task_id = %ctx.task_id,
            args = %serde_json::Value::Array(ctx.args().to_vec()),
            kwargs = %serde_json::Value::Object(ctx.kwargs().clone()),
            "Executing {}",
            AUDIO_LENGTH_TASK
        );

        let url = ctx
            .argument(0, "audio_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TaskError::InvalidArguments(
                    "audio_length() missing required string argument 'audio_url'".to_string(),
                )
            })?;

        Ok(self.measure(url).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::wav_bytes;
    use audio_queue_core::TaskArguments;
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    fn task() -> AudioLengthTask {
        AudioLengthTask::new(AudioLengthConfig::default()).unwrap()
    }

    fn file_url(contents: &[u8], suffix: &str) -> (NamedTempFile, String) {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        let url = reqwest::Url::from_file_path(file.path()).unwrap().to_string();
        (file, url)
    }

    #[tokio::test]
    async fn test_measure_wav_with_simulated_delay() {
        let (_file, url) = file_url(&wav_bytes(32_000, 16_000, 1), ".wav");

        let started = Instant::now();
        let outcome = task().measure(&url).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, TaskOutcome::Success(json!({"audio_length": 2.0})));
        assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_zero_factor_skips_delay() {
        let config = AudioLengthConfig {
            simulated_work_factor: 0.0,
            ..Default::default()
        };
        let task = AudioLengthTask::new(config).unwrap();
        let (_file, url) = file_url(&wav_bytes(80_000, 8_000, 1), ".wav");

        let started = Instant::now();
        let outcome = task.measure(&url).await;

        assert_eq!(outcome, TaskOutcome::Success(json!({"audio_length": 10.0})));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_fetch_failure_has_traceback() {
        let outcome = task().measure("file:///nonexistent/clip.wav").await;

        let record = match outcome {
            TaskOutcome::Failure(record) => record,
            other => panic!("expected failure, got {:?}", other),
        };
        assert_eq!(record.exc_type, "FileError");
        assert!(record.traceback.as_ref().is_some_and(|t| !t.is_empty()));
        assert!(record.message.is_none());
    }

    #[tokio::test]
    async fn test_non_audio_is_unable_to_load() {
        let (_file, url) = file_url(b"just some text, no audio here", ".txt");

        let TaskOutcome::Failure(record) = task().measure(&url).await else {
            panic!("expected failure");
        };
        assert_eq!(record.exc_type, "UnsupportedError");
        assert_eq!(record.message.as_deref(), Some(UNABLE_TO_LOAD));
        assert!(record.traceback.is_none());
    }

    #[tokio::test]
    async fn test_execute_with_keyword_argument() {
        let (_file, url) = file_url(&wav_bytes(4_000, 8_000, 1), ".wav");
        let args = TaskArguments::default().with_kwarg("audio_url", json!(url));
        let ctx = TaskContext::new(AUDIO_LENGTH_TASK, args);

        let outcome = task().execute(&ctx).await.unwrap();
        assert_eq!(outcome, TaskOutcome::Success(json!({"audio_length": 0.5})));
    }

    #[tokio::test]
    async fn test_execute_without_url_is_invalid_arguments() {
        let ctx = TaskContext::new(AUDIO_LENGTH_TASK, TaskArguments::default());
        let err = task().execute(&ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidArguments(_)));

        let ctx = TaskContext::new(AUDIO_LENGTH_TASK, TaskArguments::positional(vec![json!(42)]));
        assert!(task().execute(&ctx).await.is_err());
    }

    #[test]
    fn test_stage_transitions() {
        assert!(Stage::Pending.can_advance_to(Stage::Fetching));
        assert!(Stage::Fetching.can_advance_to(Stage::FetchFailed));
        assert!(Stage::Decoding.can_advance_to(Stage::Measuring));
        assert!(Stage::Measuring.can_advance_to(Stage::Succeeded));

        assert!(!Stage::Pending.can_advance_to(Stage::Decoding));
        assert!(!Stage::FetchFailed.can_advance_to(Stage::Decoding));
        assert!(!Stage::Succeeded.can_advance_to(Stage::Succeeded));
        assert!(!Stage::Measuring.can_advance_to(Stage::Fetching));

        assert!(Stage::DecodeFailed.is_terminal());
        assert!(!Stage::Measuring.is_terminal());
        assert_eq!(Stage::FetchFailed.to_string(), "FETCH_FAILED");
    }
}
