//! The four-stage execution pipeline.
//!
//! One execution takes a job through Load → Render → Generate → Deliver in
//! strict order, resolving each adapter by name at dispatch time. The first
//! error terminates the execution; no later stage runs. Within the generate
//! and deliver stages, iteration follows the job's declared order and the
//! deliver stage short-circuits on the first failure.
//!
//! The [`execute_job`] driver wraps the pipeline in the job's deadline,
//! records the outcome to metrics and emits one structured log line per
//! terminal transition. Per-stage durations and row/byte counts accumulate
//! in an [`ExecProgress`] owned by the driver, so they survive the pipeline
//! future being dropped at the deadline.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::adapter::AdapterRegistry;
use crate::error::{EngineError, Stage};
use crate::execution::{ExecutionStatus, JobExecution, RunId, StageTimings};
use crate::job::ReportJob;
use crate::metrics::MetricsHub;
use crate::scope::Scope;

/// Progress shared between the driver and the (droppable) pipeline future.
#[derive(Debug, Default)]
pub(crate) struct ExecProgress {
    timings: Mutex<StageTimings>,
    completed_stages: AtomicU8,
    rows: AtomicU64,
    bytes: AtomicU64,
}

impl ExecProgress {
    fn finish_stage(&self, stage: Stage, elapsed: std::time::Duration) {
        if let Ok(mut timings) = self.timings.lock() {
            timings.record(stage, elapsed);
        }
        self.completed_stages.fetch_add(1, Ordering::Relaxed);
    }

    fn set_rows(&self, rows: u64) {
        self.rows.store(rows, Ordering::Relaxed);
    }

    fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn timings(&self) -> StageTimings {
        self.timings.lock().map(|t| *t).unwrap_or_default()
    }

    fn completed_stages(&self) -> u8 {
        self.completed_stages.load(Ordering::Relaxed)
    }

    fn rows_loaded(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    fn output_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Runs the four stages for one job.
///
/// The caller owns the deadline; this future assumes it will be dropped when
/// the deadline fires and therefore never checks it directly.
pub(crate) async fn run(
    registry: &AdapterRegistry,
    job: &ReportJob,
    scope: &Scope,
    progress: &ExecProgress,
) -> Result<(), EngineError> {
    // Stage 1: load.
    scope.enter_stage(Stage::Load);
    let stage_start = Instant::now();
    let loader_type = job
        .data_source
        .get("type")
        .map(String::as_str)
        .unwrap_or_default();
    let loader = registry
        .loader(loader_type)
        .ok_or_else(|| EngineError::NoLoader(loader_type.to_string()))?;
    let payload = loader
        .load(scope, &job.data_source)
        .await
        .map_err(|source| EngineError::StageFailed {
            stage: Stage::Load,
            source,
        })?;
    progress.set_rows(payload.row_count() as u64);
    progress.finish_stage(Stage::Load, stage_start.elapsed());
    debug!(job_id = %job.id, rows = payload.row_count(), "load stage complete");

    // Stage 2: render.
    scope.enter_stage(Stage::Render);
    let stage_start = Instant::now();
    let renderer_name = job.renderer_name();
    let renderer = registry
        .renderer(renderer_name)
        .ok_or_else(|| EngineError::NoRenderer(renderer_name.to_string()))?;
    let doc = renderer
        .render(scope, &job.template_path, &payload)
        .await
        .map_err(|source| EngineError::StageFailed {
            stage: Stage::Render,
            source,
        })?;
    progress.finish_stage(Stage::Render, stage_start.elapsed());
    debug!(job_id = %job.id, renderer = renderer_name, "render stage complete");

    // Stage 3: generate, one file per declared format tag, in order.
    // All generators share the doc read-only.
    scope.enter_stage(Stage::Generate);
    let stage_start = Instant::now();
    let mut files = Vec::with_capacity(job.outputs.len());
    for format in &job.outputs {
        let generator = registry
            .output(format)
            .ok_or_else(|| EngineError::NoOutput(format.clone()))?;
        let file = generator
            .generate(scope, &doc, format)
            .await
            .map_err(|source| EngineError::StageFailed {
                stage: Stage::Generate,
                source,
            })?;
        progress.add_bytes(file.size() as u64);
        files.push(file);
    }
    progress.finish_stage(Stage::Generate, stage_start.elapsed());
    debug!(job_id = %job.id, files = files.len(), "generate stage complete");

    // Stage 4: deliver, in declared order, short-circuit on first failure.
    scope.enter_stage(Stage::Deliver);
    let stage_start = Instant::now();
    for target in &job.delivery {
        let delivery_type = target.get("type").map(String::as_str).unwrap_or_default();
        let adapter = registry
            .delivery(delivery_type)
            .ok_or_else(|| EngineError::NoDelivery(delivery_type.to_string()))?;
        adapter
            .deliver(scope, target, &files)
            .await
            .map_err(|source| EngineError::StageFailed {
                stage: Stage::Deliver,
                source,
            })?;
    }
    progress.finish_stage(Stage::Deliver, stage_start.elapsed());
    debug!(job_id = %job.id, targets = job.delivery.len(), "deliver stage complete");

    Ok(())
}

/// Executes one job end-to-end under its deadline.
///
/// Used by the worker pool and by `Engine::test_execute`. Mints a run id,
/// builds the scope, drives the pipeline, records the outcome to metrics and
/// logs the terminal transition.
pub(crate) async fn execute_job(
    registry: &AdapterRegistry,
    metrics: &MetricsHub,
    job: &ReportJob,
) -> Result<(), EngineError> {
    let run_id = RunId::new();
    let scope = Scope::with_timeout(job.timeout);
    let progress = ExecProgress::default();

    let mut exec = JobExecution::started(&job.id, &job.name, run_id);
    metrics.execution_started(&exec);
    debug!(job_id = %job.id, run_id = %run_id, timeout_ms = job.timeout.as_millis() as u64, "execution started");

    let deadline = tokio::time::Instant::from_std(scope.deadline());
    let outcome = match tokio::time::timeout_at(deadline, run(registry, job, &scope, &progress))
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            // An adapter that noticed the deadline itself still counts as a
            // timeout, not a stage failure.
            if scope.deadline_exceeded() && !err.is_timeout() {
                Err(EngineError::Timeout {
                    stage: scope.stage(),
                })
            } else {
                Err(err)
            }
        }
        Err(_elapsed) => {
            scope.cancel();
            Err(EngineError::Timeout {
                stage: scope.stage(),
            })
        }
    };

    exec.finished_at = Some(Utc::now());
    exec.timings = progress.timings();
    exec.rows = progress.rows_loaded();
    exec.bytes = progress.output_bytes();

    match &outcome {
        Ok(()) => {
            exec.status = ExecutionStatus::Success;
            info!(
                job_id = %job.id,
                run_id = %run_id,
                duration_ms = exec.duration().as_millis() as u64,
                rows = exec.rows,
                bytes = exec.bytes,
                "execution succeeded"
            );
        }
        Err(err) => {
            exec.status = if err.is_timeout() {
                ExecutionStatus::Timeout
            } else {
                ExecutionStatus::Failed
            };
            exec.error = Some(format!("{}: {err}", err.kind()));
            match exec.status {
                ExecutionStatus::Timeout => warn!(
                    job_id = %job.id,
                    run_id = %run_id,
                    stage = %scope.stage(),
                    timeout_ms = job.timeout.as_millis() as u64,
                    "execution timed out"
                ),
                _ => error!(
                    job_id = %job.id,
                    run_id = %run_id,
                    error = %err,
                    "execution failed"
                ),
            }
        }
    }

    metrics.execution_finished(exec, progress.completed_stages());
    outcome
}
