use crate::{
    config::ServiceConfig,
    error::{BootstrapError, ObservabilityError},
    logging::{init_logger, LogFormat, Logger},
    metrics::ServiceMetrics,
    server::{run_monitoring_server, AppState, BackendStatus},
    telemetry::{init_tracer, Tracer},
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Process observability: logger, tracer and metrics, built in that order.
pub struct ServiceManager {
    config: ServiceConfig,
    logger: Logger,
    tracer: Tracer,
    metrics: ServiceMetrics,
}

impl ServiceManager {
    /// Runs the three steps in order and stops at the first failure. The
    /// logger comes first so the later steps can report through it.
    pub async fn init(
        config: ServiceConfig,
        log_format: LogFormat,
    ) -> Result<Self, ObservabilityError> {
        let logger = init_logger(log_format);

        let tracer = init_tracer(config.collector_url.as_deref(), &config.service_name).await?;
        if let Some(layer) = tracer.layer(&config.service_name) {
            if !logger.attach_trace_layer(layer) {
                warn!(
                    endpoint = tracer.endpoint().unwrap_or_default(),
                    "Another subscriber owns the process logger; spans will not reach the collector"
                );
            }
        }

        let metrics = Self::init_metrics(&config)?;

        Ok(Self {
            config,
            logger,
            tracer,
            metrics,
        })
    }

    fn init_metrics(config: &ServiceConfig) -> Result<ServiceMetrics, ObservabilityError> {
        match ServiceMetrics::new(&config.metrics_namespace, &config.service_name) {
            Ok(metrics) => {
                info!(
                    namespace = %config.metrics_namespace,
                    service = %config.service_name,
                    "Metrics initialized"
                );
                Ok(metrics)
            }
            Err(e) => {
                error!("Metrics initialization failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Serves `/metrics`, `/health` and `/livez` on the debug address until
    /// `shutdown` fires.
    pub async fn start(
        &self,
        backends: BackendStatus,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), BootstrapError> {
        let addr = self.config.debug_socket_addr()?;
        info!(grpc_addr = %self.config.grpc_addr, "RPC transport is served by the host application");

        let state = AppState {
            registry: self.metrics.registry(),
            backends,
            service_name: self.config.service_name.clone(),
        };
        run_monitoring_server(addr, state, shutdown).await?;
        Ok(())
    }

    /// Flushes the tracer.
    pub fn shutdown(&self) {
        self.tracer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_without_collector_uses_fallback_tracer() {
        let manager = ServiceManager::init(ServiceConfig::new("adder"), LogFormat::Compact)
            .await
            .unwrap();
        assert!(!manager.tracer().is_configured());
        manager.metrics().add_characters(4);
        assert_eq!(manager.metrics().characters_concatenated.get(), 4);
    }

    #[tokio::test]
    async fn test_init_with_empty_collector_url_uses_fallback_tracer() {
        let config = ServiceConfig::new("adder").with_collector_url("");
        let manager = ServiceManager::init(config, LogFormat::Compact)
            .await
            .unwrap();
        assert!(!manager.tracer().is_configured());
    }

    #[tokio::test]
    async fn test_second_init_with_collector_still_succeeds() {
        let config = ServiceConfig::new("adder").with_collector_url("http://127.0.0.1:4317");
        let first = ServiceManager::init(config.clone(), LogFormat::Compact)
            .await
            .unwrap();
        let second = ServiceManager::init(config, LogFormat::Compact)
            .await
            .unwrap();
        assert!(!second.logger().installed());
        assert!(second.tracer().is_configured());
        first.shutdown();
        second.shutdown();
    }

    #[tokio::test]
    async fn test_init_with_bad_collector_fails_on_tracer_step() {
        let config = ServiceConfig::new("adder").with_collector_url("http://bad-host");
        let err = ServiceManager::init(config, LogFormat::Compact)
            .await
            .err()
            .unwrap();
        assert!(err.is_tracer());
    }

    #[tokio::test]
    async fn test_start_rejects_bad_debug_addr() {
        let manager = ServiceManager::init(
            ServiceConfig::new("adder").with_debug_addr("not-an-addr"),
            LogFormat::Compact,
        )
        .await
        .unwrap();
        let (_tx, rx) = broadcast::channel(1);
        let err = manager
            .start(BackendStatus::default(), rx)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
