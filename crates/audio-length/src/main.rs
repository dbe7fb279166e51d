use audio_length::{AppConfig, AudioLengthTask, LoggingConfig, AUDIO_LENGTH_TASK};
use audio_queue_worker::{ensure_services, ServiceProbe, TaskHandlerRegistry, Worker};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "audio-length-worker")]
#[command(about = "Task-queue worker that measures the duration of audio files", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Broker connection string (tcp://host:port)
    #[arg(long, env = "AUDIO_WORKER_BROKER_URL")]
    broker_url: Option<String>,

    /// Result backend connection string (tcp://host:port)
    #[arg(long, env = "AUDIO_WORKER_BACKEND_URL")]
    backend_url: Option<String>,

    /// Number of concurrent tasks
    #[arg(short = 'n', long)]
    concurrency: Option<usize>,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Seconds of simulated work per second of audio (0 disables)
    #[arg(long)]
    simulated_work_factor: Option<f64>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(url) = self.broker_url {
            config.worker.broker_url = url;
        }
        if let Some(url) = self.backend_url {
            config.worker.backend_url = url;
        }
        if let Some(concurrency) = self.concurrency {
            config.worker.concurrency = concurrency;
        }
        if let Some(worker_id) = self.worker_id {
            config.worker.worker_id = Some(worker_id);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.log_json {
            config.logging.json = true;
        }
        if let Some(factor) = self.simulated_work_factor {
            config.audio.simulated_work_factor = factor;
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let json = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(false));
    let text = (!logging.json).then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);

    init_tracing(&config.logging);
    config.validate()?;

    let backend = ServiceProbe::backend(&config.worker);
    let broker = ServiceProbe::broker(&config.worker);
    if let Err(e) = ensure_services(&backend, &broker).await {
        tracing::error!("{}; not starting", e);
        return Ok(ExitCode::SUCCESS);
    }

    let registry = TaskHandlerRegistry::new();
    registry.register(AUDIO_LENGTH_TASK, AudioLengthTask::new(config.audio.clone())?);
    tracing::info!("Registered task types: {:?}", registry.task_types());

    let worker = Worker::new(config.worker, registry)?;

    // Handle shutdown signals
    let shutdown = worker.shutdown_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        shutdown.cancel();
    });

    worker.run().await?;

    Ok(ExitCode::SUCCESS)
}
