//! Background materialization of block decisions.
//!
//! The request path only pushes client keys onto an unbounded channel; a
//! single task drains it and writes to the registry. Failures are logged and
//! dropped, never reported back to a request.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::breaker::registry::BlockRegistry;
use crate::observability::metrics;

/// Sending half handed to the controller.
#[derive(Clone)]
pub struct BlockQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl BlockQueue {
    /// Queue `client` for blocking. Never waits.
    pub fn submit(&self, client: String) {
        if let Err(e) = self.tx.send(client) {
            tracing::warn!(client = %e.0, "Block worker gone, dropping block");
        }
    }
}

/// Drains the block queue into the registry.
pub struct BlockWorker {
    registry: Arc<BlockRegistry>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl BlockWorker {
    /// Create a connected queue and worker.
    pub fn channel(registry: Arc<BlockRegistry>) -> (BlockQueue, BlockWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BlockQueue { tx }, BlockWorker { registry, rx })
    }

    /// Run until shutdown fires or every queue handle is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Block worker starting");
        loop {
            tokio::select! {
                client = self.rx.recv() => match client {
                    Some(client) => self.materialize(&client),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Block worker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn materialize(&self, client: &str) {
        match self.registry.block(client) {
            Ok(receipt) => {
                tracing::info!(
                    client = %client,
                    bucket = receipt.bucket,
                    until_bucket_spill = ?receipt.spill,
                    duration_secs = self.registry.block_duration().as_secs(),
                    "Client blocked"
                );
                metrics::record_block(true);
            }
            Err(e) => {
                tracing::error!(client = %client, error = %e, "Failed to materialize block");
                metrics::record_block(false);
            }
        }
        metrics::record_block_cache_cost(self.registry.cache_cost());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::cache::TtlCache;
    use crate::breaker::clock::ManualClock;
    use crate::lifecycle::Shutdown;
    use std::time::Duration;

    fn registry(max_cost: i64) -> Arc<BlockRegistry> {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(36_000 + 60)));
        let cache = Arc::new(TtlCache::new(max_cost, clock.clone()));
        Arc::new(BlockRegistry::new(cache, clock, Duration::from_secs(180), Duration::from_secs(3600)))
    }

    #[tokio::test]
    async fn test_worker_materializes_queued_blocks() {
        let registry = registry(100);
        let (queue, worker) = BlockWorker::channel(registry.clone());
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.subscribe()));

        queue.submit("10.0.0.1".into());
        queue.submit("10.0.0.2".into());
        drop(queue);
        handle.await.unwrap();

        assert!(registry.is_blocked("10.0.0.1"));
        assert!(registry.is_blocked("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_worker_survives_cache_refusal() {
        let registry = registry(1);
        let (queue, worker) = BlockWorker::channel(registry.clone());
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.subscribe()));

        queue.submit("10.0.0.1".into());
        queue.submit("10.0.0.2".into());
        queue.submit("10.0.0.1".into());
        drop(queue);
        handle.await.unwrap();

        assert!(registry.is_blocked("10.0.0.1"));
        assert!(!registry.is_blocked("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let (_queue, worker) = BlockWorker::channel(registry(10));
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.subscribe()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
