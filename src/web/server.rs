//! Front-end server

use crate::common::{Result, WebConfig};
use crate::web::aggregator::Aggregator;
use crate::web::http::{create_router, WebState};
use crate::web::locator::{PartitionDirectory, StaticDirectory};
use crate::web::partition_client::PartitionClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct WebServer {
    config: WebConfig,
    node_id: String,
}

impl WebServer {
    pub fn new(config: WebConfig, node_id: String) -> Self {
        Self { config, node_id }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting front-end: {}", self.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Service: {}", self.config.service_name);
        tracing::info!("  Partitions: {}", self.config.partitions.len());
        tracing::info!(
            "  Partition timeout: {:?}",
            self.config.request_timeout()
        );

        let directory: Arc<dyn PartitionDirectory> =
            Arc::new(StaticDirectory::from_config(&self.config));
        let client = PartitionClient::new(self.config.request_timeout())?;
        let aggregator = Aggregator::new(directory, client, self.config.service_name.clone());

        let http_state = WebState {
            aggregator: Arc::new(aggregator),
            node_id: self.node_id.clone(),
        };
        // A cast is a routed vote plus a ballot audit, each bounded by the partition timeout
        let http_router = create_router(http_state, self.config.request_timeout() * 3);

        let http_listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!("✓ Front-end ready");

        axum::serve(http_listener, http_router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("Front-end stopped");
        Ok(())
    }
}
