//! Fluent builder for [`ReportJob`] values.
//!
//! The builder latches the first configuration error and reports it from
//! [`JobBuilder::build`], so call chains stay linear:
//!
//! ```
//! use presswork::job::JobBuilder;
//! use std::time::Duration;
//!
//! let job = JobBuilder::new("daily-sample")
//!     .with_template("sample.md")
//!     .with_csv_data("data.csv")
//!     .output_html()
//!     .deliver_to_console()
//!     .schedule_daily(9, 0)
//!     .with_timeout(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! assert_eq!(job.schedule, "0 0 9 * * *");
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Weekday;

use super::ReportJob;
use crate::adapter::{DataSourceConfig, DeliveryConfig};
use crate::error::EngineError;

/// Counter backing generated job ids.
static GENERATED_ID: AtomicU64 = AtomicU64::new(1);

fn generate_job_id() -> String {
    format!("job-{:08x}", GENERATED_ID.fetch_add(1, Ordering::Relaxed))
}

/// Fluent builder for report jobs.
pub struct JobBuilder {
    job: ReportJob,
    err: Option<EngineError>,
}

impl JobBuilder {
    /// Starts a builder for a job named `name`, with a generated id and a
    /// 30-second default timeout.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            job: ReportJob {
                id: generate_job_id(),
                name: name.into(),
                timeout: Duration::from_secs(30),
                ..Default::default()
            },
            err: None,
        }
    }

    /// Overrides the generated job id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.job.id = id.into();
        self
    }

    /// Sets the template path.
    pub fn with_template(mut self, path: impl Into<String>) -> Self {
        self.job.template_path = path.into();
        self
    }

    /// Configures a CSV data source with the given file path.
    pub fn with_csv_data(mut self, path: impl Into<String>) -> Self {
        self.job.data_source.insert("type".to_string(), "csv".to_string());
        self.job.data_source.insert("path".to_string(), path.into());
        self
    }

    /// Configures a JSON data source with the given file path.
    pub fn with_json_data(mut self, path: impl Into<String>) -> Self {
        self.job.data_source.insert("type".to_string(), "json".to_string());
        self.job.data_source.insert("path".to_string(), path.into());
        self
    }

    /// Configures a database data source from a DSN and query.
    pub fn with_database_data(
        mut self,
        dsn: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        self.job
            .data_source
            .insert("type".to_string(), "database".to_string());
        self.job.data_source.insert("dsn".to_string(), dsn.into());
        self.job.data_source.insert("query".to_string(), query.into());
        self
    }

    /// Replaces the data-source configuration wholesale.
    pub fn with_custom_data_source(mut self, config: DataSourceConfig) -> Self {
        self.job.data_source = config;
        self
    }

    /// Selects the renderer by name (defaults to `"markdown"`).
    pub fn with_renderer(mut self, name: impl Into<String>) -> Self {
        self.job.renderer = name.into();
        self
    }

    /// Adds an `html` output.
    pub fn output_html(self) -> Self {
        self.with_outputs(["html"])
    }

    /// Adds a `pdf` output.
    pub fn output_pdf(self) -> Self {
        self.with_outputs(["pdf"])
    }

    /// Adds an `xlsx` output.
    pub fn output_excel(self) -> Self {
        self.with_outputs(["xlsx"])
    }

    /// Adds a `csv` output.
    pub fn output_csv(self) -> Self {
        self.with_outputs(["csv"])
    }

    /// Appends output format tags in order.
    pub fn with_outputs<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.job.outputs.extend(formats.into_iter().map(Into::into));
        self
    }

    /// Adds a console delivery target.
    pub fn deliver_to_console(mut self) -> Self {
        self.job
            .delivery
            .push(DeliveryConfig::from([("type".to_string(), "console".to_string())]));
        self
    }

    /// Adds an email delivery target.
    pub fn deliver_to_email(mut self, to: impl Into<String>, subject: impl Into<String>) -> Self {
        self.job.delivery.push(DeliveryConfig::from([
            ("type".to_string(), "email".to_string()),
            ("to".to_string(), to.into()),
            ("subject".to_string(), subject.into()),
        ]));
        self
    }

    /// Adds a Slack delivery target.
    pub fn deliver_to_slack(
        mut self,
        webhook: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        self.job.delivery.push(DeliveryConfig::from([
            ("type".to_string(), "slack".to_string()),
            ("webhook".to_string(), webhook.into()),
            ("channel".to_string(), channel.into()),
        ]));
        self
    }

    /// Adds an S3 delivery target.
    pub fn deliver_to_s3(mut self, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.job.delivery.push(DeliveryConfig::from([
            ("type".to_string(), "s3".to_string()),
            ("bucket".to_string(), bucket.into()),
            ("prefix".to_string(), prefix.into()),
        ]));
        self
    }

    /// Appends an arbitrary delivery configuration.
    pub fn with_custom_delivery(mut self, config: DeliveryConfig) -> Self {
        self.job.delivery.push(config);
        self
    }

    /// Schedules the job daily at `hour:minute` (cron, seconds field zero).
    pub fn schedule_daily(mut self, hour: u8, minute: u8) -> Self {
        if self.err.is_some() {
            return self;
        }
        if hour > 23 || minute > 59 {
            self.err = Some(EngineError::InvalidSchedule {
                detail: format!("invalid time: {hour}:{minute:02}"),
            });
            return self;
        }
        self.job.schedule = format!("0 {minute} {hour} * * *");
        self
    }

    /// Schedules the job weekly on `weekday` at `hour:minute`.
    pub fn schedule_weekly(mut self, weekday: Weekday, hour: u8, minute: u8) -> Self {
        if self.err.is_some() {
            return self;
        }
        if hour > 23 || minute > 59 {
            self.err = Some(EngineError::InvalidSchedule {
                detail: format!("invalid time: {hour}:{minute:02}"),
            });
            return self;
        }
        // Named days avoid the ambiguity of numeric day-of-week fields.
        let dow = match weekday {
            Weekday::Sun => "Sun",
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
        };
        self.job.schedule = format!("0 {minute} {hour} * * {dow}");
        self
    }

    /// Schedules the job monthly on `day` at `hour:minute`.
    pub fn schedule_monthly(mut self, day: u8, hour: u8, minute: u8) -> Self {
        if self.err.is_some() {
            return self;
        }
        if day == 0 || day > 31 || hour > 23 || minute > 59 {
            self.err = Some(EngineError::InvalidSchedule {
                detail: format!("invalid date/time: day {day}, {hour}:{minute:02}"),
            });
            return self;
        }
        self.job.schedule = format!("0 {minute} {hour} {day} * *");
        self
    }

    /// Schedules the job at a fixed interval (minimum one second).
    pub fn schedule_every(mut self, interval: Duration) -> Self {
        if self.err.is_some() {
            return self;
        }
        if interval < Duration::from_secs(1) {
            self.err = Some(EngineError::InvalidSchedule {
                detail: format!("interval too short: {interval:?}"),
            });
            return self;
        }
        self.job.schedule = format!("@every {}s", interval.as_secs());
        self
    }

    /// Sets a raw cron expression (validated when the job is registered).
    pub fn with_cron_schedule(mut self, expr: impl Into<String>) -> Self {
        self.job.schedule = expr.into();
        self
    }

    /// Sets the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.job.timeout = timeout;
        self
    }

    /// Adds one label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.job.labels.insert(key.into(), value.into());
        self
    }

    /// Adds multiple labels.
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.job.labels.extend(labels);
        self
    }

    /// Finalizes the job, returning the first latched error or any shape
    /// invariant violation.
    pub fn build(self) -> Result<ReportJob, EngineError> {
        if let Some(err) = self.err {
            return Err(err);
        }
        self.job.validate()?;
        Ok(self.job)
    }
}

/// Builder preset for daily reports at 09:00.
pub fn daily_report(name: impl Into<String>) -> JobBuilder {
    JobBuilder::new(name)
        .schedule_daily(9, 0)
        .with_label("type", "daily")
}

/// Builder preset for weekly reports on Monday at 09:00.
pub fn weekly_report(name: impl Into<String>) -> JobBuilder {
    JobBuilder::new(name)
        .schedule_weekly(Weekday::Mon, 9, 0)
        .with_label("type", "weekly")
}

/// Builder preset for monthly reports on the 1st at 09:00.
pub fn monthly_report(name: impl Into<String>) -> JobBuilder {
    JobBuilder::new(name)
        .schedule_monthly(1, 9, 0)
        .with_label("type", "monthly")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(builder: JobBuilder) -> JobBuilder {
        builder
            .with_template("t.md")
            .with_csv_data("data.csv")
            .output_html()
            .deliver_to_console()
    }

    #[test]
    fn test_build_minimal_job() {
        let job = minimal(JobBuilder::new("sample")).build().unwrap();
        assert!(job.id.starts_with("job-"));
        assert_eq!(job.name, "sample");
        assert_eq!(job.data_source["type"], "csv");
        assert_eq!(job.outputs, vec!["html"]);
        assert_eq!(job.delivery[0]["type"], "console");
        assert_eq!(job.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_generated_ids_unique() {
        let a = minimal(JobBuilder::new("a")).build().unwrap();
        let b = minimal(JobBuilder::new("b")).build().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_build_without_template_fails() {
        let err = JobBuilder::new("incomplete")
            .with_csv_data("data.csv")
            .output_html()
            .deliver_to_console()
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidJob {
                field: "template_path"
            }
        ));
    }

    #[test]
    fn test_schedule_daily_expression() {
        let job = minimal(JobBuilder::new("daily"))
            .schedule_daily(14, 30)
            .build()
            .unwrap();
        assert_eq!(job.schedule, "0 30 14 * * *");
    }

    #[test]
    fn test_schedule_weekly_expression() {
        let job = minimal(JobBuilder::new("weekly"))
            .schedule_weekly(Weekday::Sun, 8, 15)
            .build()
            .unwrap();
        assert_eq!(job.schedule, "0 15 8 * * Sun");
    }

    #[test]
    fn test_schedule_every_expression() {
        let job = minimal(JobBuilder::new("interval"))
            .schedule_every(Duration::from_secs(90))
            .build()
            .unwrap();
        assert_eq!(job.schedule, "@every 90s");
    }

    #[test]
    fn test_invalid_time_latches_error() {
        let err = minimal(JobBuilder::new("bad"))
            .schedule_daily(25, 0)
            .with_timeout(Duration::from_secs(10))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_interval_below_one_second_rejected() {
        let err = minimal(JobBuilder::new("fast"))
            .schedule_every(Duration::from_millis(500))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSchedule { .. }));
    }

    #[test]
    fn test_presets_carry_labels() {
        let job = minimal(daily_report("daily")).build().unwrap();
        assert_eq!(job.labels["type"], "daily");
        assert_eq!(job.schedule, "0 0 9 * * *");

        let job = minimal(weekly_report("weekly")).build().unwrap();
        assert_eq!(job.schedule, "0 0 9 * * Mon");

        let job = minimal(monthly_report("monthly")).build().unwrap();
        assert_eq!(job.schedule, "0 0 9 1 * *");
    }
}
