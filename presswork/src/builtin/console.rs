//! Console delivery adapter.

use tracing::info;

use crate::adapter::{AdapterFuture, DeliveryAdapter, DeliveryConfig, OutputFile};
use crate::scope::Scope;

/// Logs each delivered file instead of sending it anywhere.
///
/// Useful for local development and smoke tests.
pub struct ConsoleDelivery;

impl DeliveryAdapter for ConsoleDelivery {
    fn deliver<'a>(
        &'a self,
        _scope: &'a Scope,
        _cfg: &'a DeliveryConfig,
        files: &'a [OutputFile],
    ) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            for file in files {
                info!(file = %file.name, path = %file.path, bytes = file.size(), "delivered file");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deliver_is_a_noop() {
        let scope = Scope::with_timeout(Duration::from_secs(1));
        let files = vec![OutputFile::in_memory("r.html", vec![0x48])];
        ConsoleDelivery
            .deliver(&scope, &DeliveryConfig::new(), &files)
            .await
            .unwrap();
    }
}
