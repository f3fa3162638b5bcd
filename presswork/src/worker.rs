//! The worker pool: fixed-size set of executors draining the job queue.
//!
//! Each worker is a long-lived tokio task. It locks the shared receiver to
//! dequeue (FIFO across the whole pool), releases the lock, then drives the
//! pipeline under the job's deadline. On the stop signal a worker finishes
//! its current execution and exits without draining the queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::adapter::AdapterRegistry;
use crate::metrics::MetricsHub;
use crate::pipeline;
use crate::queue::JobReceiver;

/// Handle to the spawned workers.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers (minimum one).
    pub(crate) fn spawn(
        count: usize,
        receiver: JobReceiver,
        registry: Arc<AdapterRegistry>,
        metrics: MetricsHub,
        stop: CancellationToken,
    ) -> Self {
        let count = count.max(1);
        let handles = (0..count)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let registry = Arc::clone(&registry);
                let metrics = metrics.clone();
                let stop = stop.clone();
                tokio::spawn(worker_loop(id, receiver, registry, metrics, stop))
            })
            .collect();
        Self { handles }
    }

    /// Waits for every worker to exit its current execution.
    pub(crate) async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    id: usize,
    receiver: JobReceiver,
    registry: Arc<AdapterRegistry>,
    metrics: MetricsHub,
    stop: CancellationToken,
) {
    debug!(worker = id, "worker started");
    loop {
        // Hold the receiver lock only while dequeueing; execution happens
        // without it so other workers can keep draining.
        let job = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            }
        };

        // Each execution runs in its own task so a panicking adapter takes
        // down the execution, not the worker. The scope and its resources
        // are dropped on unwind either way. Outcome is recorded and logged
        // by the driver.
        let exec_registry = Arc::clone(&registry);
        let exec_metrics = metrics.clone();
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move {
            let _ = pipeline::execute_job(&exec_registry, &exec_metrics, &job).await;
        });
        if let Err(join_err) = handle.await {
            if join_err.is_panic() {
                error!(worker = id, job_id = %job_id, "execution panicked");
            }
        }
    }
    debug!(worker = id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        AdapterFuture, DataLoader, DataPayload, DataSourceConfig, DeliveryAdapter, DeliveryConfig,
        OutputFile, OutputGenerator, RenderedDoc, TemplateRenderer,
    };
    use crate::job::ReportJob;
    use crate::queue::JobQueue;
    use crate::scope::Scope;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    struct NoopLoader;
    impl DataLoader for NoopLoader {
        fn load<'a>(
            &'a self,
            _scope: &'a Scope,
            _cfg: &'a DataSourceConfig,
        ) -> AdapterFuture<'a, DataPayload> {
            Box::pin(async move { Ok(DataPayload::default()) })
        }
    }

    struct NoopRenderer;
    impl TemplateRenderer for NoopRenderer {
        fn render<'a>(
            &'a self,
            _scope: &'a Scope,
            _template_path: &'a str,
            _payload: &'a DataPayload,
        ) -> AdapterFuture<'a, RenderedDoc> {
            Box::pin(async move { Ok(RenderedDoc::default()) })
        }
    }

    struct NoopGenerator;
    impl OutputGenerator for NoopGenerator {
        fn generate<'a>(
            &'a self,
            _scope: &'a Scope,
            _doc: &'a RenderedDoc,
            format: &'a str,
        ) -> AdapterFuture<'a, OutputFile> {
            Box::pin(async move { Ok(OutputFile::in_memory(format!("r.{format}"), Vec::new())) })
        }
    }

    struct CountingDelivery {
        delivered: Arc<AtomicU64>,
    }
    impl DeliveryAdapter for CountingDelivery {
        fn deliver<'a>(
            &'a self,
            _scope: &'a Scope,
            _cfg: &'a DeliveryConfig,
            _files: &'a [OutputFile],
        ) -> AdapterFuture<'a, ()> {
            Box::pin(async move {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        }
    }

    fn test_registry(delivered: Arc<AtomicU64>) -> Arc<AdapterRegistry> {
        let registry = AdapterRegistry::new();
        registry.register_loader("csv", NoopLoader);
        registry.register_renderer("markdown", NoopRenderer);
        registry.register_output("html", NoopGenerator);
        registry.register_delivery("console", CountingDelivery { delivered });
        Arc::new(registry)
    }

    fn test_job(id: &str) -> ReportJob {
        ReportJob {
            id: id.to_string(),
            name: id.to_string(),
            template_path: "t.md".to_string(),
            data_source: DataSourceConfig::from([("type".to_string(), "csv".to_string())]),
            outputs: vec!["html".to_string()],
            delivery: vec![DeliveryConfig::from([(
                "type".to_string(),
                "console".to_string(),
            )])],
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_workers_drain_queue() {
        let delivered = Arc::new(AtomicU64::new(0));
        let registry = test_registry(Arc::clone(&delivered));
        let metrics = MetricsHub::with_capacity(16);
        let (queue, rx) = JobQueue::bounded(16);
        let stop = CancellationToken::new();

        let pool = WorkerPool::spawn(2, rx, registry, metrics.clone(), stop.clone());

        for i in 0..5 {
            queue.try_send(test_job(&format!("j{i}"))).unwrap();
        }

        // Poll until all five executions are recorded.
        for _ in 0..100 {
            if metrics.metrics().succeeded == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(metrics.metrics().succeeded, 5);
        assert_eq!(delivered.load(Ordering::Relaxed), 5);

        stop.cancel();
        pool.join().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_adapter_does_not_kill_worker() {
        struct PanickingLoader;
        impl DataLoader for PanickingLoader {
            fn load<'a>(
                &'a self,
                _scope: &'a Scope,
                _cfg: &'a DataSourceConfig,
            ) -> AdapterFuture<'a, DataPayload> {
                Box::pin(async move { panic!("adapter bug") })
            }
        }

        let delivered = Arc::new(AtomicU64::new(0));
        let registry = test_registry(Arc::clone(&delivered));
        let metrics = MetricsHub::with_capacity(16);
        let (queue, rx) = JobQueue::bounded(16);
        let stop = CancellationToken::new();

        let pool = WorkerPool::spawn(1, rx, Arc::clone(&registry), metrics.clone(), stop.clone());

        let mut bad = test_job("bad");
        bad.data_source
            .insert("type".to_string(), "boom".to_string());
        registry.register_loader("boom", PanickingLoader);

        queue.try_send(bad).unwrap();
        queue.try_send(test_job("good")).unwrap();

        // The single worker must survive the panic and run the second job.
        for _ in 0..100 {
            if metrics.metrics().succeeded == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(metrics.metrics().succeeded, 1);
        assert_eq!(delivered.load(Ordering::Relaxed), 1);

        stop.cancel();
        pool.join().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_does_not_drain_queue() {
        let delivered = Arc::new(AtomicU64::new(0));
        let registry = test_registry(Arc::clone(&delivered));
        let metrics = MetricsHub::with_capacity(16);
        let (queue, rx) = JobQueue::bounded(16);
        let stop = CancellationToken::new();

        // Stop before spawning: workers must exit without touching the queue.
        stop.cancel();
        queue.try_send(test_job("queued")).unwrap();

        let pool = WorkerPool::spawn(2, Arc::clone(&rx), registry, metrics.clone(), stop);
        pool.join().await;

        assert_eq!(delivered.load(Ordering::Relaxed), 0);
        // The job is still sitting in the queue.
        assert_eq!(rx.lock().await.try_recv().unwrap().id, "queued");
    }
}
