pub mod backend;
pub mod config;
mod connection;
pub mod error;
pub mod executor;
pub mod handler;
pub mod probe;
pub mod report;
pub mod startup;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use backend::BackendClient;
pub use config::WorkerConfig;
pub use error::WorkerError;
pub use executor::TaskExecutor;
pub use handler::{HandlerResult, TaskContext, TaskHandler, TaskHandlerRegistry};
pub use probe::{ServiceCheck, ServiceProbe};
pub use startup::{ensure_services, StartupError};
pub use worker::Worker;
