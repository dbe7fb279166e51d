use crate::backend::BackendClient;
use crate::config::{parse_service_url, WorkerConfig};
use crate::connection::connect;
use crate::executor::TaskExecutor;
use crate::handler::{HandlerResult, TaskContext, TaskHandlerRegistry};
use crate::report::state_update;
use crate::WorkerError;
use audio_queue_core::{TaskError, TaskMessage, TaskStateUpdate};
use audio_queue_protocol::{
    ClaimTaskRequest, HeartbeatRequest, Message, MessageCodec, TaskDoneRequest,
};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type BrokerConnection = Framed<TcpStream, MessageCodec>;

/// Worker process that claims tasks from the broker and executes them
pub struct Worker {
    config: WorkerConfig,
    worker_id: String,
    registry: Arc<TaskHandlerRegistry>,
    backend: BackendClient,
    /// One permit per task slot; a claimed task holds its permit until done
    slots: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(config: WorkerConfig, registry: TaskHandlerRegistry) -> Result<Self, WorkerError> {
        config.validate()?;
        let worker_id = config.generate_worker_id();
        let backend = BackendClient::new(&config.backend_url, config.io_timeout())?;

        Ok(Worker {
            slots: Arc::new(Semaphore::new(config.concurrency)),
            config,
            worker_id,
            registry: Arc::new(registry),
            backend,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn active_tasks(&self) -> usize {
        active_count(&self.slots, self.config.concurrency)
    }

    /// Token that stops the worker when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run the worker until shutdown or until the broker goes away
    pub async fn run(&self) -> Result<(), WorkerError> {
        info!(
            "Starting worker {} (concurrency: {}, tasks: {:?})",
            self.worker_id,
            self.config.concurrency,
            self.registry.task_types()
        );

        let address = parse_service_url(&self.config.broker_url)?;
        let mut framed = connect(address).await?;
        info!("Connected to broker at {}", self.config.broker_url);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(64);
        let heartbeat_stop = self.shutdown.child_token();
        self.spawn_heartbeat(outbound_tx.clone(), heartbeat_stop.clone());

        let result = self
            .claim_loop(&mut framed, &outbound_tx, &mut outbound_rx)
            .await;

        heartbeat_stop.cancel();
        self.graceful_shutdown(&mut framed, &mut outbound_rx).await;

        result
    }

    async fn claim_loop(
        &self,
        framed: &mut BrokerConnection,
        outbound_tx: &mpsc::Sender<Message>,
        outbound_rx: &mut mpsc::Receiver<Message>,
    ) -> Result<(), WorkerError> {
        let task_names = self.registry.task_types();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Worker shutting down gracefully");
                    return Ok(());
                }

                Some(message) = outbound_rx.recv() => {
                    framed.send(message).await?;
                }

                permit = next_slot(self.slots.clone(), self.config.poll_interval()) => {
                    let Ok(permit) = permit else {
                        return Ok(());
                    };
                    let claim = Message::ClaimTask(ClaimTaskRequest {
                        worker_id: self.worker_id.clone(),
                        task_names: task_names.clone(),
                    });
                    framed.send(claim).await?;

                    let reply = match timeout(self.config.io_timeout(), framed.next()).await {
                        Ok(reply) => reply,
                        Err(_) => {
                            error!("No reply to claim within {:?}", self.config.io_timeout());
                            return Err(WorkerError::Timeout(self.config.io_timeout()));
                        }
                    };

                    match reply {
                        Some(Ok(Message::Ack(ack))) => {
                            if let Some(task) = ack.task {
                                self.spawn_task(task, permit, outbound_tx.clone());
                            }
                        }
                        Some(Ok(Message::Nack(nack))) => {
                            debug!("Claim rejected: {}", nack.error);
                        }
                        Some(Ok(other)) => {
                            warn!("Unexpected reply to claim: {:?}", other.message_type());
                        }
                        Some(Err(e)) => {
                            error!("Protocol error: {}", e);
                            return Err(e.into());
                        }
                        None => {
                            warn!("Connection closed by broker");
                            return Err(WorkerError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    fn spawn_heartbeat(&self, outbound_tx: mpsc::Sender<Message>, stop: CancellationToken) {
        let worker_id = self.worker_id.clone();
        let slots = self.slots.clone();
        let concurrency = self.config.concurrency;
        let period = self.config.heartbeat_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let (cpu, memory) = tokio::task::spawn_blocking(get_system_stats)
                            .await
                            .unwrap_or((0.0, 0));
                        let task_count = active_count(&slots, concurrency);

                        let heartbeat = Message::Heartbeat(HeartbeatRequest {
                            worker_id: worker_id.clone(),
                            current_task_count: task_count,
                            cpu_usage_percent: cpu,
                            memory_usage_mb: memory,
                        });

                        if outbound_tx.send(heartbeat).await.is_err() {
                            break;
                        }
                    }
                    _ = stop.cancelled() => {
                        break;
                    }
                }
            }
        });
    }

    fn spawn_task(
        &self,
        task: TaskMessage,
        permit: OwnedSemaphorePermit,
        outbound_tx: mpsc::Sender<Message>,
    ) {
        let worker = self.clone_for_task();

        tokio::spawn(async move {
            let update = worker.process_task(&task).await;
            drop(permit);

            let done = Message::TaskDone(TaskDoneRequest {
                task_id: task.id,
                worker_id: worker.worker_id.clone(),
                state: update.state,
            });
            if outbound_tx.send(done).await.is_err() {
                warn!(task_id = %task.id, "Broker connection gone before task acknowledgement");
            }
        });
    }

    /// Execute one task message end to end and store its state in the
    /// backend. Returns the update that was (or failed to be) stored.
    pub async fn process_task(&self, task: &TaskMessage) -> TaskStateUpdate {
        debug!(task_id = %task.id, task_name = %task.name, "Processing task");

        let result = self.execute(task).await;
        let update = state_update(task, &self.worker_id, result);

        match self.backend.store(update.clone()).await {
            Ok(()) => info!(task_id = %task.id, state = %update.state, "Task finished"),
            Err(e) => error!(task_id = %task.id, "Failed to store task result: {}", e),
        }

        update
    }

    async fn execute(&self, task: &TaskMessage) -> HandlerResult {
        let handler = self
            .registry
            .get(&task.name)
            .ok_or_else(|| TaskError::UnknownTask(task.name.clone()))?;
        let ctx = TaskContext::from_message(task, &self.worker_id)?;

        let time_limit = if task.time_limit_secs > 0 {
            Duration::from_secs(u64::from(task.time_limit_secs))
        } else {
            self.config.default_time_limit()
        };

        TaskExecutor::new(handler).execute(ctx, time_limit).await
    }

    /// Clone worker for task execution
    fn clone_for_task(&self) -> Self {
        Worker {
            config: self.config.clone(),
            worker_id: self.worker_id.clone(),
            registry: self.registry.clone(),
            backend: self.backend.clone(),
            slots: self.slots.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Wait for active tasks, still forwarding their acknowledgements
    async fn graceful_shutdown(
        &self,
        framed: &mut BrokerConnection,
        outbound_rx: &mut mpsc::Receiver<Message>,
    ) {
        info!("Waiting for active tasks to complete...");

        let deadline = tokio::time::Instant::now() + self.config.graceful_shutdown_timeout();

        loop {
            let active = self.active_tasks();

            if active == 0 {
                info!("All tasks completed, shutting down");
                break;
            }

            if tokio::time::Instant::now() > deadline {
                warn!("Shutdown deadline exceeded, {} tasks still active", active);
                break;
            }

            tokio::select! {
                Some(message) = outbound_rx.recv() => {
                    if let Err(e) = framed.send(message).await {
                        warn!("Failed to forward message during shutdown: {}", e);
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }

        while let Ok(message) = outbound_rx.try_recv() {
            if matches!(message, Message::Heartbeat(_)) {
                continue;
            }
            if let Err(e) = framed.send(message).await {
                warn!("Failed to forward message during shutdown: {}", e);
                break;
            }
        }
    }
}

/// Waits out the poll interval, then for a free task slot. Resolves as soon
/// as a running task releases its permit.
async fn next_slot(
    slots: Arc<Semaphore>,
    poll_interval: Duration,
) -> Result<OwnedSemaphorePermit, tokio::sync::AcquireError> {
    tokio::time::sleep(poll_interval).await;
    slots.acquire_owned().await
}

fn active_count(slots: &Semaphore, concurrency: usize) -> usize {
    concurrency.saturating_sub(slots.available_permits())
}

/// Get system statistics (CPU and memory usage) of this process
fn get_system_stats() -> (f32, u64) {
    use sysinfo::System;

    let mut sys = System::new_all();
    sys.refresh_all();

    let pid = sysinfo::Pid::from_u32(std::process::id());

    if let Some(process) = sys.process(pid) {
        let cpu = process.cpu_usage();
        let memory = process.memory() / 1024 / 1024;
        (cpu, memory)
    } else {
        (0.0, 0)
    }
}
