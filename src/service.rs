use crate::{
    config::{Cli, ProcessEnv, Sources},
    document_store::{DocumentStoreConnector, Phase},
    observability::ServiceManager,
    producer::ProducerInitializer,
    server::BackendStatus,
    shutdown::setup_signal_handlers,
};
use tracing::{error, info};
use uuid::Uuid;

/// Bootstraps the service: observability, then the document store, then the
/// broker producer, then the monitoring server until a shutdown signal.
pub async fn run_with_config(cli: Cli) -> anyhow::Result<()> {
    let env = ProcessEnv;
    let sources = Sources::new(&cli, &env);

    let service_config = sources.service_config()?;
    let manager = ServiceManager::init(service_config, cli.log_format).await?;

    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "Starting service bootstrap");
    info!("Configuration loaded: {}", manager.config());

    let store = match DocumentStoreConnector::open(&sources).await {
        Ok(store) => store,
        Err(e) => {
            manager.shutdown();
            return Err(e.into());
        }
    };
    info!("Document store ready");

    let producer = match ProducerInitializer::new().init_async(&sources).await {
        Ok(producer) => producer,
        Err(e) => {
            store.close().await;
            manager.shutdown();
            return Err(e.into());
        }
    };
    info!(brokers = ?producer.hosts(), "Broker producer ready");

    let backends = BackendStatus {
        document_store: store.phase() == Phase::Connected,
        broker: producer.is_open(),
    };

    let shutdown = setup_signal_handlers();
    let served = manager.start(backends, shutdown.subscribe()).await;
    if let Err(e) = &served {
        error!(code = e.error_code(), "Monitoring server error: {}", e);
    }

    info!("Shutting down");
    producer.close();
    store.close().await;
    manager.shutdown();

    served.map_err(Into::into)
}
