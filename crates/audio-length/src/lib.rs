pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod task;

pub use config::{AppConfig, AudioLengthConfig, LoggingConfig};
pub use decode::{measure_duration, AudioMeasurement};
pub use error::{DecodeError, FetchError, FetchErrorKind};
pub use fetch::{AudioFetcher, FetchConfig};
pub use task::{AudioLengthTask, Stage, AUDIO_LENGTH_TASK, UNABLE_TO_LOAD};
