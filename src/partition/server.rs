//! Partition server

use crate::common::{PartitionConfig, Result};
use crate::partition::engine::{MemEngine, RocksEngine, TxnEngine};
use crate::partition::http::{create_router, PartitionState};
use crate::partition::integrity::{start_integrity_loop, HealthBoard, IntegrityChecker};
use crate::partition::store::CounterStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct PartitionServer {
    config: PartitionConfig,
    node_id: String,
}

impl PartitionServer {
    pub fn new(config: PartitionConfig, node_id: String) -> Self {
        Self { config, node_id }
    }

    /// Open the configured engine: RocksDB when a data path is set, in-memory otherwise
    pub fn open_engine(config: &PartitionConfig) -> Result<Arc<dyn TxnEngine>> {
        match &config.data_path {
            Some(path) => {
                std::fs::create_dir_all(path)?;
                let engine =
                    RocksEngine::open(path, Duration::from_millis(config.lock_timeout_ms))?;
                Ok(Arc::new(engine))
            }
            None => Ok(Arc::new(MemEngine::new())),
        }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting partition: {}", self.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!(
            "  Key range: [{}, {}]",
            self.config.low_key,
            self.config.high_key
        );
        match &self.config.data_path {
            Some(path) => tracing::info!("  Data path: {}", path.display()),
            None => tracing::info!("  Data path: <in-memory>"),
        }

        let store = CounterStore::new(Self::open_engine(&self.config)?);
        let health = Arc::new(HealthBoard::new());

        // Bind before spawning the integrity loop so a bind error leaves nothing running
        let http_listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        let integrity_handle = start_integrity_loop(
            IntegrityChecker::new(store.clone()),
            health.clone(),
            self.config.integrity_interval(),
            shutdown.child_token(),
        );

        let http_state = PartitionState {
            store,
            health,
            low_key: self.config.low_key,
            high_key: self.config.high_key,
        };
        let http_router = create_router(http_state);

        tracing::info!("✓ Partition ready");

        let result = axum::serve(http_listener, http_router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await;

        shutdown.cancel();
        if let Err(e) = integrity_handle.await {
            tracing::error!("Integrity loop failed: {}", e);
        }

        result?;
        tracing::info!("Partition stopped");
        Ok(())
    }
}
