//! The job model: the unit of scheduled work.
//!
//! A [`ReportJob`] describes everything one execution needs: where the data
//! comes from, which template renders it, which output formats to produce,
//! and where the results go. Jobs are plain values; they are cloned into the
//! queue at dispatch time, so callers can mutate their copy freely without
//! affecting in-flight executions.

mod builder;

pub use builder::{daily_report, monthly_report, weekly_report, JobBuilder};

use std::collections::HashMap;
use std::time::Duration;

use crate::adapter::{DataSourceConfig, DeliveryConfig};
use crate::error::EngineError;

/// Renderer used when a job does not name one explicitly.
pub const DEFAULT_RENDERER: &str = "markdown";

/// Upper bound on a single execution's timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// A parameterized report job.
#[derive(Debug, Clone, Default)]
pub struct ReportJob {
    /// Unique id within an engine instance; the metrics key.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Template path, interpreted by the renderer, opaque to the engine.
    pub template_path: String,

    /// Data-source configuration; `data_source["type"]` selects the loader.
    pub data_source: DataSourceConfig,

    /// Renderer name; empty selects [`DEFAULT_RENDERER`].
    pub renderer: String,

    /// Output format tags, in generation order. Duplicates allowed.
    pub outputs: Vec<String>,

    /// Schedule expression: six-field cron (with seconds) or
    /// `@every <n><s|m|h>`. Empty means ad-hoc only.
    pub schedule: String,

    /// Delivery targets, in delivery order; each `delivery[i]["type"]`
    /// selects the adapter.
    pub delivery: Vec<DeliveryConfig>,

    /// End-to-end deadline for one execution. Must be positive and at most
    /// [`MAX_TIMEOUT`].
    pub timeout: Duration,

    /// Advisory metadata, not interpreted by the engine.
    pub labels: HashMap<String, String>,
}

impl ReportJob {
    /// The renderer this job resolves to.
    pub fn renderer_name(&self) -> &str {
        if self.renderer.is_empty() {
            DEFAULT_RENDERER
        } else {
            &self.renderer
        }
    }

    /// Checks the job's shape invariants.
    ///
    /// This covers everything that can be checked without the registries:
    /// non-empty identity fields, at least one output and delivery, a named
    /// data-source and delivery `type`, and a sane timeout. Whether the named
    /// adapters actually exist is checked at dispatch time, so adapters may
    /// be registered after the job.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.is_empty() {
            return Err(EngineError::InvalidJob { field: "id" });
        }
        if self.name.is_empty() {
            return Err(EngineError::InvalidJob { field: "name" });
        }
        if self.template_path.is_empty() {
            return Err(EngineError::InvalidJob {
                field: "template_path",
            });
        }
        if self
            .data_source
            .get("type")
            .is_none_or(|ty| ty.is_empty())
        {
            return Err(EngineError::InvalidJob {
                field: "data_source.type",
            });
        }
        if self.outputs.is_empty() {
            return Err(EngineError::InvalidJob { field: "outputs" });
        }
        if self.delivery.is_empty() {
            return Err(EngineError::InvalidJob { field: "delivery" });
        }
        for target in &self.delivery {
            if target.get("type").is_none_or(|ty| ty.is_empty()) {
                return Err(EngineError::InvalidJob {
                    field: "delivery.type",
                });
            }
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(EngineError::InvalidJob { field: "timeout" });
        }
        Ok(())
    }
}
