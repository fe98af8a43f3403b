use crate::{
    config::{BackendConfig, Sources, MONGO_DB_ADDR, MONGO_DB_DATABASE},
    error::StoreError,
};
use mongodb::{
    bson::{doc, Document},
    Client, Database,
};
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Connected,
}

enum State {
    Uninitialized,
    Initialized(BackendConfig),
    Connected {
        config: BackendConfig,
        client: Client,
        database: Database,
    },
}

/// MongoDB connection that only serves lookups once `init` and `connect`
/// have both succeeded.
pub struct DocumentStoreConnector {
    state: State,
}

impl Default for DocumentStoreConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStoreConnector {
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
        }
    }

    /// Resolves configuration and connects, returning the first error.
    pub async fn open(sources: &Sources<'_>) -> Result<Self, StoreError> {
        let mut connector = Self::new();
        connector.init(sources)?;
        connector.connect().await?;
        Ok(connector)
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Uninitialized => Phase::Uninitialized,
            State::Initialized(_) => Phase::Initialized,
            State::Connected { .. } => Phase::Connected,
        }
    }

    pub fn config(&self) -> Option<&BackendConfig> {
        match &self.state {
            State::Uninitialized => None,
            State::Initialized(config) | State::Connected { config, .. } => Some(config),
        }
    }

    /// Resolves the address and database. A failed call leaves the connector
    /// uninitialized, dropping any earlier resolution.
    pub fn init(&mut self, sources: &Sources<'_>) -> Result<(), StoreError> {
        if matches!(self.state, State::Connected { .. }) {
            return Err(StoreError::AlreadyConnected);
        }

        let config = match sources.resolve_backend(&MONGO_DB_ADDR, &MONGO_DB_DATABASE) {
            Ok(config) => config,
            Err(e) => {
                self.state = State::Uninitialized;
                return Err(e.into());
            }
        };
        info!(
            address = %config.address,
            database = %config.resource_name,
            "Document store configured"
        );
        self.state = State::Initialized(config);
        Ok(())
    }

    /// Opens the client and pings the server. Driver errors come back as-is.
    pub async fn connect(&mut self) -> Result<(), StoreError> {
        let config = match &self.state {
            State::Uninitialized => return Err(StoreError::NotInitialized),
            State::Connected { .. } => return Err(StoreError::AlreadyConnected),
            State::Initialized(config) => config.clone(),
        };

        let start = Instant::now();
        let client = Client::with_uri_str(&config.address).await.map_err(|e| {
            error!(address = %config.address, "Failed to create document store client: {}", e);
            e
        })?;

        let database = client.database(&config.resource_name);
        database.run_command(doc! { "ping": 1 }).await.map_err(|e| {
            error!(address = %config.address, "Document store handshake failed: {}", e);
            e
        })?;

        info!(
            address = %config.address,
            database = %config.resource_name,
            "Connected to document store in {:?}",
            start.elapsed()
        );
        self.state = State::Connected {
            config,
            client,
            database,
        };
        Ok(())
    }

    /// First document in `collection` matching `filter`.
    pub async fn find_one(&self, collection: &str, filter: Document) -> Result<Document, StoreError> {
        let State::Connected { database, .. } = &self.state else {
            return Err(StoreError::NotConnected);
        };

        debug!(collection = %collection, "find_one");
        database
            .collection::<Document>(collection)
            .find_one(filter)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
            })
    }

    /// Closes the client's connection pool.
    pub async fn close(self) {
        if let State::Connected { client, config, .. } = self.state {
            client.shutdown().await;
            info!(address = %config.address, "Document store connection closed");
        }
    }
}
