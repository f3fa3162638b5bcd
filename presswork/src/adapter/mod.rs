//! Adapter contracts: the engine's dependency surface.
//!
//! The core is polymorphic over four capability traits, supplied by the host:
//!
//! - [`DataLoader`] - produces a [`DataPayload`] from a data-source config
//! - [`TemplateRenderer`] - renders a template against the payload
//! - [`OutputGenerator`] - materializes one [`OutputFile`] per format tag
//! - [`DeliveryAdapter`] - pushes the generated files to a target
//!
//! All four are dyn-compatible: methods return a boxed future so concrete
//! adapters can live behind `Arc<dyn _>` in the registries. Implementations
//! receive the execution [`Scope`] and are expected to observe cancellation
//! promptly.

mod registry;

pub use registry::AdapterRegistry;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::scope::Scope;

/// Data-source configuration: a flat string map. Must carry a `"type"` entry
/// naming the loader; everything else is loader-defined.
pub type DataSourceConfig = HashMap<String, String>;

/// Delivery-target configuration: a flat string map. Must carry a `"type"`
/// entry naming the delivery adapter; everything else is adapter-defined.
pub type DeliveryConfig = HashMap<String, String>;

/// One data row: column name to dynamically-typed value.
pub type Row = HashMap<String, Value>;

/// Boxed future returned by adapter methods.
pub type AdapterFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, AdapterError>> + Send + 'a>>;

/// Raw data produced by a loader and consumed by a renderer.
///
/// The engine treats the contents as opaque; loaders and renderers agree on
/// the representation between themselves.
#[derive(Debug, Clone, Default)]
pub struct DataPayload {
    /// Row-oriented data, if the source is tabular.
    pub rows: Vec<Row>,
    /// Raw bytes, if the source is a blob.
    pub raw: Vec<u8>,
}

impl DataPayload {
    /// Creates a payload from tabular rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            raw: Vec::new(),
        }
    }

    /// Number of rows in the payload.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A rendered document, produced by the renderer.
///
/// Shared read-only across all output generators of one execution.
#[derive(Debug, Clone, Default)]
pub struct RenderedDoc {
    /// Rendered HTML, for HTML-oriented outputs.
    pub html: String,
    /// Raw content (e.g. the pre-HTML intermediate).
    pub content: String,
    /// Renderer-defined metadata.
    pub meta: HashMap<String, Value>,
}

/// A generated output file.
///
/// Transient: passed from the generators to every delivery adapter of the
/// same execution, then dropped.
#[derive(Debug, Clone)]
pub struct OutputFile {
    /// Filename; generators must produce a non-empty name.
    pub name: String,
    /// Filesystem path or URI, depending on the generator.
    pub path: String,
    /// Optional in-memory copy of the file contents.
    pub data: Option<Vec<u8>>,
}

impl OutputFile {
    /// Creates a purely in-memory output file.
    pub fn in_memory(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            path: String::new(),
            data: Some(data),
        }
    }

    /// Size of the in-memory contents, zero when data is not held in memory.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

/// Error returned by adapter implementations.
///
/// Adapters report failures as a message; the engine wraps the value with the
/// stage tag before surfacing it (`EngineError::StageFailed`).
#[derive(Debug, Clone)]
pub struct AdapterError {
    message: String,
}

impl AdapterError {
    /// Creates an adapter error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AdapterError {}

impl From<String> for AdapterError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for AdapterError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Loads raw data for a job.
pub trait DataLoader: Send + Sync {
    /// Loads the payload described by `cfg`.
    ///
    /// `cfg["type"]` matches the name this loader was registered under.
    fn load<'a>(
        &'a self,
        scope: &'a Scope,
        cfg: &'a DataSourceConfig,
    ) -> AdapterFuture<'a, DataPayload>;
}

/// Renders a template against a payload into a [`RenderedDoc`].
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template_path` (opaque to the engine) with `payload`.
    fn render<'a>(
        &'a self,
        scope: &'a Scope,
        template_path: &'a str,
        payload: &'a DataPayload,
    ) -> AdapterFuture<'a, RenderedDoc>;
}

/// Produces a final file (html, pdf, csv, …) from a rendered document.
pub trait OutputGenerator: Send + Sync {
    /// Generates the file for `format`. The doc is shared with other
    /// generators of the same execution and must be treated as read-only.
    fn generate<'a>(
        &'a self,
        scope: &'a Scope,
        doc: &'a RenderedDoc,
        format: &'a str,
    ) -> AdapterFuture<'a, OutputFile>;
}

/// Delivers generated files to a target (email, object store, chat, …).
pub trait DeliveryAdapter: Send + Sync {
    /// Delivers `files` (non-empty, read-only) to the target described by
    /// `cfg`.
    fn deliver<'a>(
        &'a self,
        scope: &'a Scope,
        cfg: &'a DeliveryConfig,
        files: &'a [OutputFile],
    ) -> AdapterFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_row_count() {
        let mut row = Row::new();
        row.insert("name".to_string(), Value::String("A".to_string()));
        let payload = DataPayload::from_rows(vec![row]);
        assert_eq!(payload.row_count(), 1);
        assert!(payload.raw.is_empty());
    }

    #[test]
    fn test_output_file_size() {
        let file = OutputFile::in_memory("r.html", vec![0x48]);
        assert_eq!(file.size(), 1);

        let pathless = OutputFile {
            name: "r.pdf".to_string(),
            path: "/tmp/r.pdf".to_string(),
            data: None,
        };
        assert_eq!(pathless.size(), 0);
    }

    #[test]
    fn test_adapter_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = AdapterError::from(io);
        assert!(err.message().contains("missing"));
    }
}
