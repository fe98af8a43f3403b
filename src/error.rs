use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required field {flag} (env {env})")]
    MissingField {
        flag: &'static str,
        env: &'static str,
    },

    #[error("invalid producer policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid listen address {addr}: {reason}")]
    InvalidListenAddr { addr: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("document store connector used before init")]
    NotInitialized,

    #[error("document store connector is already connected")]
    AlreadyConnected,

    #[error("document store is not connected")]
    NotConnected,

    #[error("no document found in collection {collection}")]
    NotFound { collection: String },

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kafka(#[from] kafka::error::Error),

    #[error("delivery to {topic}/{partition} failed: {code:?}")]
    Delivery {
        topic: String,
        partition: i32,
        code: kafka::error::KafkaCode,
    },

    #[error("producer already released")]
    Released,

    #[error("producer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ObservabilityError {
    #[error("invalid collector URL {url}: {reason}")]
    InvalidCollectorUrl { url: String, reason: String },

    #[error("collector {endpoint} is unreachable: {source}")]
    CollectorUnreachable {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tracer construction failed: {0}")]
    Exporter(String),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ObservabilityError {
    /// True when the failure came from the tracer step.
    pub fn is_tracer(&self) -> bool {
        !matches!(self, ObservabilityError::Metrics(_))
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Observability error: {0}")]
    Observability(#[from] ObservabilityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

impl BootstrapError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BootstrapError::Config(_) => "CONFIG_ERROR",
            BootstrapError::Store(StoreError::Config(_)) => "CONFIG_ERROR",
            BootstrapError::Store(StoreError::Driver(_)) => "CONNECTION_ERROR",
            BootstrapError::Store(_) => "STORE_ERROR",
            BootstrapError::Broker(BrokerError::Config(_)) => "CONFIG_ERROR",
            BootstrapError::Broker(_) => "CONNECTION_ERROR",
            BootstrapError::Observability(_) => "OBSERVABILITY_INIT_ERROR",
            BootstrapError::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_flag() {
        let err = ConfigError::MissingField {
            flag: "mongo.db.database",
            env: "MONGO_DB_DATABASE",
        };
        assert_eq!(
            err.to_string(),
            "missing required field mongo.db.database (env MONGO_DB_DATABASE)"
        );
    }

    #[test]
    fn test_error_codes() {
        let config = BootstrapError::from(StoreError::from(ConfigError::MissingField {
            flag: "mongo.db.addr",
            env: "MONGO_DB_ADDR",
        }));
        assert_eq!(config.error_code(), "CONFIG_ERROR");

        let guarded = BootstrapError::from(StoreError::NotConnected);
        assert_eq!(guarded.error_code(), "STORE_ERROR");

        let tracer = BootstrapError::from(ObservabilityError::Exporter("boom".into()));
        assert_eq!(tracer.error_code(), "OBSERVABILITY_INIT_ERROR");
    }

    #[test]
    fn test_tracer_errors_are_classified() {
        assert!(ObservabilityError::Exporter("x".into()).is_tracer());
        let metrics = ObservabilityError::Metrics(prometheus::Error::Msg("dup".into()));
        assert!(!metrics.is_tracer());
    }
}
