//! One-time process startup preconditions.

use crate::probe::ServiceCheck;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StartupError {
    #[error("Result backend is not reachable at {url}")]
    BackendUnavailable { url: String },

    #[error("Broker is not reachable at {url}")]
    BrokerUnavailable { url: String },
}

/// Checks the backend, then the broker. The broker is not probed when the
/// backend is already down.
pub async fn ensure_services(
    backend: &dyn ServiceCheck,
    broker: &dyn ServiceCheck,
) -> Result<(), StartupError> {
    if !backend.is_running().await {
        return Err(StartupError::BackendUnavailable {
            url: backend.url().to_string(),
        });
    }
    info!(url = %backend.url(), "Result backend is reachable");

    if !broker.is_running().await {
        return Err(StartupError::BrokerUnavailable {
            url: broker.url().to_string(),
        });
    }
    info!(url = %broker.url(), "Broker is reachable");

    Ok(())
}
