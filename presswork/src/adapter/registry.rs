//! Name → adapter lookup tables.
//!
//! Four independent tables, one per adapter kind. Registration is
//! idempotent-by-overwrite (last registration wins) and may interleave with
//! executions: lookups clone the `Arc` out of the map, so an in-flight
//! execution keeps a consistent reference to whatever adapter it resolved,
//! even if the name is re-registered underneath it.

use std::sync::Arc;

use dashmap::DashMap;

use super::{DataLoader, DeliveryAdapter, OutputGenerator, TemplateRenderer};

/// The engine's four adapter tables.
///
/// Lookup is the hot path; `DashMap` keeps it lock-free for readers.
#[derive(Default)]
pub struct AdapterRegistry {
    loaders: DashMap<String, Arc<dyn DataLoader>>,
    renderers: DashMap<String, Arc<dyn TemplateRenderer>>,
    outputs: DashMap<String, Arc<dyn OutputGenerator>>,
    deliveries: DashMap<String, Arc<dyn DeliveryAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a data loader under `name`, replacing any previous one.
    pub fn register_loader(&self, name: impl Into<String>, loader: impl DataLoader + 'static) {
        self.loaders.insert(name.into(), Arc::new(loader));
    }

    /// Registers a template renderer under `name`.
    pub fn register_renderer(
        &self,
        name: impl Into<String>,
        renderer: impl TemplateRenderer + 'static,
    ) {
        self.renderers.insert(name.into(), Arc::new(renderer));
    }

    /// Registers an output generator under `name`.
    pub fn register_output(
        &self,
        name: impl Into<String>,
        generator: impl OutputGenerator + 'static,
    ) {
        self.outputs.insert(name.into(), Arc::new(generator));
    }

    /// Registers a delivery adapter under `name`.
    pub fn register_delivery(
        &self,
        name: impl Into<String>,
        adapter: impl DeliveryAdapter + 'static,
    ) {
        self.deliveries.insert(name.into(), Arc::new(adapter));
    }

    /// Looks up a loader by name.
    pub fn loader(&self, name: &str) -> Option<Arc<dyn DataLoader>> {
        self.loaders.get(name).map(|entry| entry.value().clone())
    }

    /// Looks up a renderer by name.
    pub fn renderer(&self, name: &str) -> Option<Arc<dyn TemplateRenderer>> {
        self.renderers.get(name).map(|entry| entry.value().clone())
    }

    /// Looks up an output generator by name.
    pub fn output(&self, name: &str) -> Option<Arc<dyn OutputGenerator>> {
        self.outputs.get(name).map(|entry| entry.value().clone())
    }

    /// Looks up a delivery adapter by name.
    pub fn delivery(&self, name: &str) -> Option<Arc<dyn DeliveryAdapter>> {
        self.deliveries.get(name).map(|entry| entry.value().clone())
    }

    /// Names of all registered loaders.
    pub fn loader_names(&self) -> Vec<String> {
        self.loaders.iter().map(|e| e.key().clone()).collect()
    }

    /// Names of all registered renderers.
    pub fn renderer_names(&self) -> Vec<String> {
        self.renderers.iter().map(|e| e.key().clone()).collect()
    }

    /// Names of all registered output generators.
    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|e| e.key().clone()).collect()
    }

    /// Names of all registered delivery adapters.
    pub fn delivery_names(&self) -> Vec<String> {
        self.deliveries.iter().map(|e| e.key().clone()).collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("loaders", &self.loaders.len())
            .field("renderers", &self.renderers.len())
            .field("outputs", &self.outputs.len())
            .field("deliveries", &self.deliveries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterFuture, DataPayload, DataSourceConfig};
    use crate::scope::Scope;

    struct TaggedLoader {
        tag: &'static str,
    }

    impl DataLoader for TaggedLoader {
        fn load<'a>(
            &'a self,
            _scope: &'a Scope,
            _cfg: &'a DataSourceConfig,
        ) -> AdapterFuture<'a, DataPayload> {
            let tag = self.tag;
            Box::pin(async move {
                let mut payload = DataPayload::default();
                payload.raw = tag.as_bytes().to_vec();
                Ok(payload)
            })
        }
    }

    #[test]
    fn test_lookup_missing() {
        let registry = AdapterRegistry::new();
        assert!(registry.loader("csv").is_none());
        assert!(registry.renderer("markdown").is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites_last_wins() {
        let registry = AdapterRegistry::new();
        registry.register_loader("csv", TaggedLoader { tag: "first" });
        registry.register_loader("csv", TaggedLoader { tag: "second" });

        let loader = registry.loader("csv").expect("loader registered");
        let scope = Scope::with_timeout(std::time::Duration::from_secs(1));
        let payload = loader.load(&scope, &DataSourceConfig::new()).await.unwrap();
        assert_eq!(payload.raw, b"second");
    }

    #[test]
    fn test_names_listing() {
        let registry = AdapterRegistry::new();
        registry.register_loader("csv", TaggedLoader { tag: "a" });
        registry.register_loader("json", TaggedLoader { tag: "b" });

        let mut names = registry.loader_names();
        names.sort();
        assert_eq!(names, vec!["csv".to_string(), "json".to_string()]);
        assert!(registry.output_names().is_empty());
    }
}
