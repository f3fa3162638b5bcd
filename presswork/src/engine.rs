//! The engine facade: lifecycle, registration and dispatch entry points.
//!
//! An [`Engine`] owns the adapter registries, the scheduler, the bounded job
//! queue, the worker pool and the metrics hub. It is a plain process-local
//! value: no globals, and multiple engines can coexist in one process.
//!
//! # Example
//!
//! ```ignore
//! use presswork::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.register_loader("csv", builtin::CsvLoader);
//! engine.register_renderer("markdown", builtin::MarkdownRenderer);
//! engine.register_output("html", builtin::FileOutput::new("./out"));
//! engine.register_delivery("console", builtin::ConsoleDelivery);
//!
//! engine.add_cron_job(job)?;
//! engine.start();
//! // ...
//! engine.stop().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::{
    AdapterRegistry, DataLoader, DeliveryAdapter, OutputGenerator, TemplateRenderer,
};
use crate::error::EngineError;
use crate::execution::JobExecution;
use crate::job::{JobBuilder, ReportJob};
use crate::metrics::{MetricsHub, MetricsSnapshot, DEFAULT_HISTORY_CAPACITY};
use crate::pipeline;
use crate::queue::{JobQueue, JobReceiver};
use crate::scheduler::{CronScheduler, STOP_GRACE_CAP};
use crate::worker::WorkerPool;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 4;

/// Default job queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Default per-job timeout used by builder-seeded jobs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine construction options.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent workers (minimum one).
    pub workers: usize,

    /// Job queue capacity (minimum one).
    pub queue_size: usize,

    /// Timeout seeded into jobs built through [`Engine::job`].
    pub default_timeout: Duration,

    /// Whether to keep metrics and the execution log.
    pub enable_metrics: bool,

    /// How many terminal execution records the log retains.
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            default_timeout: DEFAULT_TIMEOUT,
            enable_metrics: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// The report engine.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<AdapterRegistry>,
    queue: JobQueue,
    receiver: JobReceiver,
    scheduler: CronScheduler,
    metrics: MetricsHub,
    workers: Option<WorkerPool>,
    stop_signal: CancellationToken,
    stopped: AtomicBool,
}

impl Engine {
    /// Creates an engine from `config`. Nothing runs until [`Engine::start`].
    pub fn new(config: EngineConfig) -> Self {
        let metrics = if config.enable_metrics {
            MetricsHub::with_capacity(config.history_capacity)
        } else {
            MetricsHub::disabled()
        };
        let (queue, receiver) = JobQueue::bounded(config.queue_size);
        let scheduler = CronScheduler::new(queue.clone(), metrics.clone());

        Self {
            config,
            registry: Arc::new(AdapterRegistry::new()),
            queue,
            receiver,
            scheduler,
            metrics,
            workers: None,
            stop_signal: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Registers a data loader. Last registration under a name wins.
    pub fn register_loader(&self, name: impl Into<String>, loader: impl DataLoader + 'static) {
        self.registry.register_loader(name, loader);
    }

    /// Registers a template renderer.
    pub fn register_renderer(
        &self,
        name: impl Into<String>,
        renderer: impl TemplateRenderer + 'static,
    ) {
        self.registry.register_renderer(name, renderer);
    }

    /// Registers an output generator.
    pub fn register_output(
        &self,
        name: impl Into<String>,
        generator: impl OutputGenerator + 'static,
    ) {
        self.registry.register_output(name, generator);
    }

    /// Registers a delivery adapter.
    pub fn register_delivery(
        &self,
        name: impl Into<String>,
        adapter: impl DeliveryAdapter + 'static,
    ) {
        self.registry.register_delivery(name, adapter);
    }

    /// The adapter registry, for lookups and name listings.
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Validates `job` and registers its schedule with the scheduler.
    ///
    /// Adapter presence is deliberately *not* checked here: adapters may be
    /// registered after their jobs, and the pipeline resolves names at
    /// dispatch time.
    pub fn add_cron_job(&self, job: ReportJob) -> Result<(), EngineError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EngineError::EngineStopped);
        }
        job.validate()?;
        self.scheduler.add_job(job)
    }

    /// Ad-hoc non-blocking submission, bypassing the scheduler.
    pub fn enqueue(&self, job: ReportJob) -> Result<(), EngineError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EngineError::EngineStopped);
        }
        job.validate()?;
        self.queue.try_send(job)
    }

    /// Runs `job` synchronously in the caller's task under `job.timeout`,
    /// bypassing the queue and worker pool. The outcome is recorded to
    /// metrics like any worker execution. Intended for integration tests and
    /// warm-starts.
    pub async fn test_execute(&self, job: &ReportJob) -> Result<(), EngineError> {
        job.validate()?;
        pipeline::execute_job(&self.registry, &self.metrics, job).await
    }

    /// Spins up the workers and starts the scheduler.
    ///
    /// Must be called from within a tokio runtime. Calling `start` twice is
    /// a programmer error and is not guarded against.
    pub fn start(&mut self) {
        let pool = WorkerPool::spawn(
            self.config.workers,
            Arc::clone(&self.receiver),
            Arc::clone(&self.registry),
            self.metrics.clone(),
            self.stop_signal.clone(),
        );
        self.workers = Some(pool);
        self.scheduler.start();
        info!(
            workers = self.config.workers,
            queue_size = self.config.queue_size,
            metrics = self.metrics.is_enabled(),
            "engine started"
        );
    }

    /// Stops the engine: scheduler first (two-second grace), then the
    /// workers. Returns when every worker has exited its current execution.
    /// The queue is not drained.
    pub async fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.scheduler.stop(STOP_GRACE_CAP).await;
        self.stop_signal.cancel();
        if let Some(pool) = self.workers.take() {
            pool.join().await;
        }
        info!("engine stopped");
    }

    /// A consistent snapshot of the aggregate metrics (zeroed when metrics
    /// are disabled).
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.metrics()
    }

    /// The most recent executions, newest first (empty when metrics are
    /// disabled).
    pub fn recent_executions(&self, limit: usize) -> Vec<JobExecution> {
        self.metrics.recent(limit)
    }

    /// Starts a job builder seeded with this engine's default timeout.
    pub fn job(&self, name: impl Into<String>) -> JobBuilder {
        JobBuilder::new(name).with_timeout(self.config.default_timeout)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.queue_size, DEFAULT_QUEUE_SIZE);
        assert_eq!(config.default_timeout, DEFAULT_TIMEOUT);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_builder_seeded_with_default_timeout() {
        let config = EngineConfig {
            default_timeout: Duration::from_secs(7),
            ..Default::default()
        };
        let engine = Engine::new(config);
        let job = engine
            .job("seeded")
            .with_template("t.md")
            .with_csv_data("d.csv")
            .output_html()
            .deliver_to_console()
            .build()
            .unwrap();
        assert_eq!(job.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_add_cron_job_validates_shape_first() {
        let engine = Engine::new(EngineConfig::default());
        let job = ReportJob {
            schedule: "@every 10s".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            engine.add_cron_job(job),
            Err(EngineError::InvalidJob { field: "id" })
        ));
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_rejected() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.start();
        engine.stop().await;

        let job = engine
            .job("late")
            .with_template("t.md")
            .with_csv_data("d.csv")
            .output_html()
            .deliver_to_console()
            .build()
            .unwrap();
        assert!(matches!(
            engine.enqueue(job),
            Err(EngineError::EngineStopped)
        ));
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let engine = Engine::new(EngineConfig::default());
        assert_eq!(engine.metrics(), MetricsSnapshot::default());
        assert!(engine.recent_executions(10).is_empty());
    }
}
