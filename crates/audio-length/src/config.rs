use anyhow::{bail, Context};
use audio_queue_worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for the audio-duration task body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioLengthConfig {
    /// Connect and total timeout for one download
    pub fetch_timeout_secs: u64,
    pub max_download_bytes: u64,
    pub user_agent: String,
    /// Seconds of simulated work per second of audio. 0 disables the delay.
    pub simulated_work_factor: f64,
}

impl Default for AudioLengthConfig {
    fn default() -> Self {
        AudioLengthConfig {
            fetch_timeout_secs: 30,
            max_download_bytes: 100 * 1024 * 1024,
            user_agent: format!("audio-length-worker/{}", env!("CARGO_PKG_VERSION")),
            simulated_work_factor: 0.1,
        }
    }
}

impl AudioLengthConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Delay to simulate for `seconds` of decoded audio
    pub fn simulated_delay(&self, seconds: f64) -> Duration {
        let delay = seconds * self.simulated_work_factor;
        if delay.is_nan() || delay <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fetch_timeout_secs == 0 {
            bail!("audio.fetch_timeout_secs must be greater than 0");
        }
        if self.max_download_bytes == 0 {
            bail!("audio.max_download_bytes must be greater than 0");
        }
        if !self.simulated_work_factor.is_finite() || self.simulated_work_factor < 0.0 {
            bail!(
                "audio.simulated_work_factor must be a finite number >= 0, got {}",
                self.simulated_work_factor
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub audio: AudioLengthConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.worker.validate()?;
        self.audio.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.audio.fetch_timeout_secs, 30);
        assert_eq!(config.audio.simulated_work_factor, 0.1);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "worker:\n  broker_url: tcp://broker:7000\n  concurrency: 8\naudio:\n  simulated_work_factor: 0\nlogging:\n  json: true"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.worker.broker_url, "tcp://broker:7000");
        assert_eq!(config.worker.concurrency, 8);
        assert_eq!(config.worker.backend_url, "tcp://127.0.0.1:6380");
        assert_eq!(config.audio.simulated_work_factor, 0.0);
        assert_eq!(config.audio.fetch_timeout_secs, 30);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../audio-worker.yaml");
        let config = AppConfig::from_file(path).unwrap();
        assert_eq!(config.worker.backend_url, "tcp://127.0.0.1:6380");
        assert_eq!(config.audio.max_download_bytes, 100 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        assert!(AppConfig::from_file("/nonexistent/audio-worker.yaml").is_err());
    }

    #[test]
    fn test_rejects_negative_factor() {
        let mut config = AppConfig::default();
        config.audio.simulated_work_factor = -1.0;
        assert!(config.validate().is_err());

        config.audio.simulated_work_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_fetch_timeout() {
        let mut config = AppConfig::default();
        config.audio.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulated_delay() {
        let config = AudioLengthConfig::default();
        assert_eq!(config.simulated_delay(2.0).as_millis(), 200);
        assert_eq!(config.simulated_delay(0.0), Duration::ZERO);

        let disabled = AudioLengthConfig {
            simulated_work_factor: 0.0,
            ..Default::default()
        };
        assert_eq!(disabled.simulated_delay(120.0), Duration::ZERO);
    }

    #[test]
    fn test_simulated_delay_saturates_instead_of_panicking() {
        let huge = AudioLengthConfig {
            simulated_work_factor: 1e300,
            ..Default::default()
        };
        assert!(huge.validate().is_ok());
        assert_eq!(huge.simulated_delay(1e10), Duration::MAX);
        assert_eq!(huge.simulated_delay(3600.0), Duration::MAX);
    }
}
