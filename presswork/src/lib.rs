//! Presswork - an embeddable scheduled-report engine.
//!
//! Presswork periodically materializes parameterized documents from
//! host-supplied data sources and pushes the results to host-supplied sinks.
//! The host registers adapters for four capabilities (load, render, generate
//! outputs, deliver) plus a set of job definitions; the engine fires jobs on
//! cron or interval schedules, runs them through a bounded worker pool and
//! bounds every execution with a per-job deadline.
//!
//! # Architecture
//!
//! ```text
//! schedule firing ──┐                        ┌─▶ Load ─▶ Render ─▶ Generate ─▶ Deliver
//! Engine::enqueue ──┴─▶ bounded queue ─▶ workers                (adapter registry lookups)
//!                                            └─▶ metrics & execution log
//! ```
//!
//! # Example
//!
//! ```ignore
//! use presswork::{builtin, Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.register_loader("csv", builtin::CsvLoader);
//! engine.register_renderer("markdown", builtin::MarkdownRenderer);
//! engine.register_output("html", builtin::FileOutput::new("./out"));
//! engine.register_delivery("console", builtin::ConsoleDelivery);
//!
//! let job = engine
//!     .job("daily-sample")
//!     .with_template("sample.md")
//!     .with_csv_data("data.csv")
//!     .output_html()
//!     .deliver_to_console()
//!     .with_cron_schedule("@every 10s")
//!     .build()?;
//!
//! engine.test_execute(&job).await?;   // run once, synchronously
//! engine.add_cron_job(job)?;          // and on the schedule
//! engine.start();
//! // ...
//! engine.stop().await;
//! # Ok::<(), presswork::EngineError>(())
//! ```

pub mod adapter;
pub mod builtin;
pub mod engine;
pub mod error;
pub mod execution;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod schedule;
mod pipeline;
mod queue;
mod scheduler;
mod scope;
mod worker;

pub use adapter::{
    AdapterError, AdapterFuture, AdapterRegistry, DataLoader, DataPayload, DataSourceConfig,
    DeliveryAdapter, DeliveryConfig, OutputFile, OutputGenerator, RenderedDoc, Row,
    TemplateRenderer,
};
pub use engine::{Engine, EngineConfig, DEFAULT_QUEUE_SIZE, DEFAULT_TIMEOUT, DEFAULT_WORKERS};
pub use error::{EngineError, Stage};
pub use execution::{ExecutionStatus, JobExecution, RunId, StageTimings};
pub use job::{JobBuilder, ReportJob, DEFAULT_RENDERER, MAX_TIMEOUT};
pub use metrics::{MetricsSnapshot, StageAggregate};
pub use schedule::ScheduleSpec;
pub use scope::Scope;

/// Version of the presswork library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
