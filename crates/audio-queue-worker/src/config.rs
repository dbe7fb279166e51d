use crate::WorkerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TCP_SCHEME: &str = "tcp://";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Broker connection string (`tcp://host:port`)
    pub broker_url: String,
    /// Result backend connection string (`tcp://host:port`)
    pub backend_url: String,
    pub worker_id: Option<String>,
    pub concurrency: usize,
    pub heartbeat_interval_secs: u64,
    pub graceful_shutdown_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Applied when a task message carries no time limit of its own
    pub default_time_limit_secs: u64,
    pub probe_timeout_secs: u64,
    pub io_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            broker_url: "tcp://127.0.0.1:6379".to_string(),
            backend_url: "tcp://127.0.0.1:6380".to_string(),
            worker_id: None,
            concurrency: 4,
            heartbeat_interval_secs: 15,
            graceful_shutdown_timeout_secs: 60,
            poll_interval_ms: 100,
            default_time_limit_secs: 300,
            probe_timeout_secs: 5,
            io_timeout_secs: 10,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), WorkerError> {
        parse_service_url(&self.broker_url)?;
        parse_service_url(&self.backend_url)?;

        if self.concurrency == 0 {
            return Err(WorkerError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let timeouts = [
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("default_time_limit_secs", self.default_time_limit_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("io_timeout_secs", self.io_timeout_secs),
            ("poll_interval_ms", self.poll_interval_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(WorkerError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn generate_worker_id(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let mut random = Uuid::new_v4().simple().to_string();
        random.truncate(8);

        format!("{}-{}-{}", hostname, pid, random)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_time_limit(&self) -> Duration {
        Duration::from_secs(self.default_time_limit_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Extracts the `host:port` socket address from a service connection string.
///
/// Accepts `tcp://host:port` and bare `host:port`.
pub fn parse_service_url(url: &str) -> Result<&str, WorkerError> {
    let address = match url.strip_prefix(TCP_SCHEME) {
        Some(rest) => rest,
        None if url.contains("://") => {
            return Err(WorkerError::InvalidUrl(format!(
                "unsupported scheme in `{}` (expected {})",
                url, TCP_SCHEME
            )))
        }
        None => url,
    };
    let address = address.trim_end_matches('/');

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(address),
        _ => Err(WorkerError::InvalidUrl(format!(
            "expected host:port in `{}`",
            url
        ))),
    }
}
