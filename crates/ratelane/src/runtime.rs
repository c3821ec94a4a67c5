// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the adapters and pipeline from configuration and runs them.

use std::sync::Arc;

use ratelane_api::{AppState, AuthConfig, HealthState};
use ratelane_config::RatelaneConfig;
use ratelane_config::model::LoggingConfig;
use ratelane_core::{Adapter, RatelaneError};
use ratelane_gateway_client::HttpGatewayClient;
use ratelane_pipeline::Pipeline;
use ratelane_pipeline::sweeper::run_sweeper;
use ratelane_storage::{SqliteCounterStore, SqliteStorage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Every long-lived handle the process owns.
pub struct Runtime {
    pub config: RatelaneConfig,
    pub storage: Arc<SqliteStorage>,
    pub counters: Arc<SqliteCounterStore>,
    pub gateway: Arc<HttpGatewayClient>,
    pub pipeline: Pipeline,
    start_time: std::time::Instant,
}

impl Runtime {
    /// Open storage, build the gateway client and wire the pipeline.
    pub async fn build(config: RatelaneConfig) -> Result<Self, RatelaneError> {
        let storage = SqliteStorage::new(config.storage.clone())
            .with_queue_max_attempts(config.worker.max_attempts);
        storage.initialize().await?;
        let storage = Arc::new(storage);
        let counters = Arc::new(SqliteCounterStore::new(storage.database()?.clone()));
        let gateway = Arc::new(HttpGatewayClient::new(&config.gateway)?);
        info!(endpoint = %gateway.endpoint(), "gateway client ready");

        let pipeline = Pipeline::build(
            &config,
            storage.clone(),
            storage.clone(),
            counters.clone(),
            gateway.clone(),
        )?;

        Ok(Self {
            config,
            storage,
            counters,
            gateway,
            pipeline,
            start_time: std::time::Instant::now(),
        })
    }

    /// Handler state for the API router.
    pub fn api_state(&self, prometheus_render: Option<MetricsRender>) -> AppState {
        AppState {
            records: self.storage.clone(),
            dispatcher: self.pipeline.dispatcher.clone(),
            results: self.pipeline.results.clone(),
            auth: AuthConfig {
                bearer_token: self.config.server.bearer_token.clone(),
            },
            health: HealthState {
                start_time: self.start_time,
                prometheus_render,
                components: vec![
                    self.storage.clone() as Arc<dyn Adapter>,
                    self.counters.clone() as Arc<dyn Adapter>,
                    self.gateway.clone() as Arc<dyn Adapter>,
                ],
            },
        }
    }

    /// Run workers, sweeper and (optionally) the API until `cancel` fires.
    ///
    /// In-flight tasks finish before this returns; the database is closed last.
    pub async fn run(
        self,
        with_api: bool,
        prometheus_render: Option<MetricsRender>,
        cancel: CancellationToken,
    ) -> Result<(), RatelaneError> {
        let mut workers = self.pipeline.workers.clone().spawn(cancel.clone());
        let sweeper = tokio::spawn(run_sweeper(
            self.counters.clone(),
            self.config.cache.sweep_interval(),
            cancel.clone(),
        ));

        let served = if with_api {
            let state = self.api_state(prometheus_render);
            ratelane_api::start_server(&self.config.server, state, cancel.clone()).await
        } else {
            info!("running without API server");
            cancel.cancelled().await;
            Ok(())
        };

        // A server failure must still stop the workers.
        cancel.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task panicked");
            }
        }
        if let Err(e) = sweeper.await {
            error!(error = %e, "sweeper task panicked");
        }

        self.storage.close().await?;
        info!("ratelane stopped");
        served
    }
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// Returns `None` (and logs) if metrics are disabled or a recorder already exists.
pub fn install_metrics(enabled: bool) -> Option<MetricsRender> {
    if !enabled {
        debug!("prometheus metrics disabled by configuration");
        return None;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            ratelane_pipeline::recording::register_metrics();
            info!("prometheus metrics recorder installed");
            Some(Arc::new(move || handle.render()))
        }
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ratelane={},warn", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
