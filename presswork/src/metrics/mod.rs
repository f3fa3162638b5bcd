//! Metrics and the execution log.
//!
//! When enabled, the engine keeps aggregate counters, per-stage timing sums
//! and a bounded history of execution records behind a single `RwLock`, so
//! writers (workers, the scheduler) and readers (operators) always observe a
//! consistent snapshot. Terminal records are written once and never mutated.
//!
//! Recording never influences job outcomes: a disabled hub turns every
//! recording call into a no-op and every read into an empty snapshot.

mod history;

pub use history::RingBuffer;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::Stage;
use crate::execution::{ExecutionStatus, JobExecution};

/// Default capacity of the execution history ring.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

const STAGES: [Stage; 4] = [Stage::Load, Stage::Render, Stage::Generate, Stage::Deliver];

/// Sum and sample count for one stage, from which the average is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageAggregate {
    /// Total time spent in this stage across completed runs of it.
    pub total: Duration,
    /// Number of runs that completed this stage.
    pub count: u64,
}

impl StageAggregate {
    /// Average stage duration, zero when no samples exist.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count as u32
        }
    }
}

/// A consistent point-in-time view of the engine's metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Executions started.
    pub total: u64,
    /// Executions that reached `Success`.
    pub succeeded: u64,
    /// Executions that reached `Failed`.
    pub failed: u64,
    /// Executions that reached `Timeout`.
    pub timed_out: u64,
    /// Schedule firings dropped because the queue was full.
    pub missed: u64,
    /// Load-stage aggregate.
    pub load: StageAggregate,
    /// Render-stage aggregate.
    pub render: StageAggregate,
    /// Generate-stage aggregate.
    pub generate: StageAggregate,
    /// Deliver-stage aggregate.
    pub deliver: StageAggregate,
}

impl MetricsSnapshot {
    /// The aggregate for one stage.
    pub fn stage(&self, stage: Stage) -> StageAggregate {
        match stage {
            Stage::Load => self.load,
            Stage::Render => self.render,
            Stage::Generate => self.generate,
            Stage::Deliver => self.deliver,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut StageAggregate {
        match stage {
            Stage::Load => &mut self.load,
            Stage::Render => &mut self.render,
            Stage::Generate => &mut self.generate,
            Stage::Deliver => &mut self.deliver,
        }
    }
}

/// State guarded by the hub's lock.
struct MetricsState {
    snapshot: MetricsSnapshot,
    history: RingBuffer<JobExecution>,
    active: HashMap<u64, JobExecution>,
}

/// The engine's metrics recorder and query surface.
///
/// Cheap to clone; all clones share the same state. Built disabled by
/// default; an engine without metrics pays only an `Option` check per
/// recording call.
#[derive(Clone)]
pub struct MetricsHub {
    inner: Option<Arc<RwLock<MetricsState>>>,
}

impl MetricsHub {
    /// A hub that records nothing and reports empty snapshots.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// An enabled hub whose execution history keeps `history_capacity`
    /// terminal records.
    pub fn with_capacity(history_capacity: usize) -> Self {
        Self {
            inner: Some(Arc::new(RwLock::new(MetricsState {
                snapshot: MetricsSnapshot::default(),
                history: RingBuffer::new(history_capacity),
                active: HashMap::new(),
            }))),
        }
    }

    /// Whether this hub records anything.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Records an execution entering the `Running` state.
    pub(crate) fn execution_started(&self, exec: &JobExecution) {
        let Some(inner) = &self.inner else { return };
        let Ok(mut state) = inner.write() else { return };
        state.snapshot.total += 1;
        state.active.insert(exec.run_id.as_u64(), exec.clone());
    }

    /// Records a terminal execution.
    ///
    /// `completed_stages` is how many pipeline stages ran to completion
    /// (4 for success, the index of the failing stage otherwise); it drives
    /// the per-stage sums and counts.
    pub(crate) fn execution_finished(&self, exec: JobExecution, completed_stages: u8) {
        let Some(inner) = &self.inner else { return };
        let Ok(mut state) = inner.write() else { return };

        match exec.status {
            ExecutionStatus::Success => state.snapshot.succeeded += 1,
            ExecutionStatus::Timeout => state.snapshot.timed_out += 1,
            ExecutionStatus::Failed => state.snapshot.failed += 1,
            // Non-terminal records never reach this path.
            ExecutionStatus::Pending | ExecutionStatus::Running => {}
        }

        for stage in STAGES.iter().take(completed_stages as usize) {
            let aggregate = state.snapshot.stage_mut(*stage);
            aggregate.total += exec.timings.get(*stage);
            aggregate.count += 1;
        }

        state.active.remove(&exec.run_id.as_u64());
        state.history.push(exec);
    }

    /// Counts a schedule firing dropped on a full queue.
    pub(crate) fn run_missed(&self) {
        let Some(inner) = &self.inner else { return };
        if let Ok(mut state) = inner.write() {
            state.snapshot.missed += 1;
        }
    }

    /// A consistent snapshot of the aggregate metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        match &self.inner {
            Some(inner) => inner
                .read()
                .map(|state| state.snapshot.clone())
                .unwrap_or_default(),
            None => MetricsSnapshot::default(),
        }
    }

    /// The most recent executions, newest first, in-flight runs included.
    pub fn recent(&self, limit: usize) -> Vec<JobExecution> {
        let Some(inner) = &self.inner else {
            return Vec::new();
        };
        let Ok(state) = inner.read() else {
            return Vec::new();
        };

        let mut executions = state.history.to_vec();
        executions.extend(state.active.values().cloned());
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        executions.truncate(limit);
        executions
    }
}

impl std::fmt::Debug for MetricsHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHub")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::RunId;

    fn terminal(exec: &JobExecution, status: ExecutionStatus) -> JobExecution {
        let mut exec = exec.clone();
        exec.status = status;
        exec.finished_at = Some(chrono::Utc::now());
        exec
    }

    #[test]
    fn test_disabled_hub_is_empty() {
        let hub = MetricsHub::disabled();
        assert!(!hub.is_enabled());

        let exec = JobExecution::started("j1", "n", RunId::new());
        hub.execution_started(&exec);
        hub.execution_finished(terminal(&exec, ExecutionStatus::Success), 4);
        hub.run_missed();

        assert_eq!(hub.metrics(), MetricsSnapshot::default());
        assert!(hub.recent(10).is_empty());
    }

    #[test]
    fn test_counters_by_status() {
        let hub = MetricsHub::with_capacity(16);

        for status in [
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Timeout,
        ] {
            let exec = JobExecution::started("j1", "n", RunId::new());
            hub.execution_started(&exec);
            hub.execution_finished(terminal(&exec, status), 0);
        }
        hub.run_missed();
        hub.run_missed();

        let snapshot = hub.metrics();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.timed_out, 1);
        assert_eq!(snapshot.missed, 2);
    }

    #[test]
    fn test_stage_aggregates_respect_completed_count() {
        let hub = MetricsHub::with_capacity(16);

        let mut exec = JobExecution::started("j1", "n", RunId::new());
        exec.timings.record(Stage::Load, Duration::from_millis(10));
        exec.timings.record(Stage::Render, Duration::from_millis(20));
        hub.execution_started(&exec);
        // Failed during render: only the load stage completed.
        hub.execution_finished(terminal(&exec, ExecutionStatus::Failed), 1);

        let snapshot = hub.metrics();
        assert_eq!(snapshot.load.count, 1);
        assert_eq!(snapshot.load.total, Duration::from_millis(10));
        assert_eq!(snapshot.render.count, 0);
        assert_eq!(snapshot.render.average(), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_stable_without_executions() {
        let hub = MetricsHub::with_capacity(16);
        let exec = JobExecution::started("j1", "n", RunId::new());
        hub.execution_started(&exec);
        hub.execution_finished(terminal(&exec, ExecutionStatus::Success), 4);

        assert_eq!(hub.metrics(), hub.metrics());
    }

    #[test]
    fn test_recent_ordering_and_limit() {
        let hub = MetricsHub::with_capacity(16);

        for i in 0..3 {
            let mut exec = JobExecution::started(format!("j{i}"), "n", RunId::new());
            exec.started_at = chrono::Utc::now() + chrono::Duration::seconds(i);
            hub.execution_started(&exec);
            hub.execution_finished(terminal(&exec, ExecutionStatus::Success), 4);
        }

        let recent = hub.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].job_id, "j2");
        assert_eq!(recent[1].job_id, "j1");
    }

    #[test]
    fn test_recent_includes_in_flight() {
        let hub = MetricsHub::with_capacity(16);
        let exec = JobExecution::started("running", "n", RunId::new());
        hub.execution_started(&exec);

        let recent = hub.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, ExecutionStatus::Running);
    }

    #[test]
    fn test_history_capped() {
        let hub = MetricsHub::with_capacity(2);
        for i in 0..5 {
            let exec = JobExecution::started(format!("j{i}"), "n", RunId::new());
            hub.execution_started(&exec);
            hub.execution_finished(terminal(&exec, ExecutionStatus::Success), 4);
        }
        assert_eq!(hub.recent(10).len(), 2);
        // Counters keep the full totals even after history eviction.
        assert_eq!(hub.metrics().succeeded, 5);
    }

    #[test]
    fn test_stage_aggregate_average() {
        let aggregate = StageAggregate {
            total: Duration::from_millis(30),
            count: 3,
        };
        assert_eq!(aggregate.average(), Duration::from_millis(10));
    }
}
