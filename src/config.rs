use crate::error::ConfigError;
use crate::logging::LogFormat;
use clap::Parser;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::net::SocketAddr;

/// Command-line surface. Backend settings are `Option` so that a flag the user
/// actually typed can be told apart from one left at its default.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// MongoDB address, including port number [default: mongodb://localhost:27017]
    #[arg(long = "mongo.db.addr", value_name = "URI")]
    pub mongo_db_addr: Option<String>,

    /// MongoDB database name
    #[arg(long = "mongo.db.database", value_name = "NAME")]
    pub mongo_db_database: Option<String>,

    /// Debug and metrics listen address [default: :5060]
    #[arg(long = "debug.addr", value_name = "ADDR")]
    pub debug_addr: Option<String>,

    /// gRPC (HTTP) listen address [default: :5040]
    #[arg(long = "grpc.addr", value_name = "ADDR")]
    pub grpc_addr: Option<String>,

    /// Broker server address, comma separated [default: localhost:9092]
    #[arg(long = "brokers.addr", value_name = "HOSTS")]
    pub brokers_addr: Option<String>,

    /// Tracing collector URL; tracing is a no-op when unset
    #[arg(long = "tracing.collector.url", value_name = "URL")]
    pub tracing_collector_url: Option<String>,

    /// Service name used for tracing and metric names
    #[arg(long = "service.name", value_name = "NAME")]
    pub service_name: Option<String>,

    /// Metrics namespace [default: example]
    #[arg(long = "metrics.namespace", value_name = "NAMESPACE")]
    pub metrics_namespace: Option<String>,

    #[arg(long = "log.format", env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Value of the flag named `flag`, only if it was supplied on the command line.
    pub fn flag(&self, flag: &str) -> Option<&str> {
        let value = match flag {
            "mongo.db.addr" => &self.mongo_db_addr,
            "mongo.db.database" => &self.mongo_db_database,
            "debug.addr" => &self.debug_addr,
            "grpc.addr" => &self.grpc_addr,
            "brokers.addr" => &self.brokers_addr,
            "tracing.collector.url" => &self.tracing_collector_url,
            "service.name" => &self.service_name,
            "metrics.namespace" => &self.metrics_namespace,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Environment variable lookup.
#[cfg_attr(test, mockall::automock)]
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<K, V> Environment for HashMap<K, V>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
{
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.as_ref().to_string())
    }
}

/// One configurable value: its flag, its environment override and its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub flag: &'static str,
    pub env: &'static str,
    pub default: &'static str,
}

impl Setting {
    pub const fn new(flag: &'static str, env: &'static str, default: &'static str) -> Self {
        Self { flag, env, default }
    }
}

pub const MONGO_DB_ADDR: Setting =
    Setting::new("mongo.db.addr", "MONGO_DB_ADDR", "mongodb://localhost:27017");
pub const MONGO_DB_DATABASE: Setting = Setting::new("mongo.db.database", "MONGO_DB_DATABASE", "");
pub const DEBUG_ADDR: Setting = Setting::new("debug.addr", "DEBUG_ADDR", ":5060");
pub const GRPC_ADDR: Setting = Setting::new("grpc.addr", "GRPC_ADDR", ":5040");
pub const BROKERS_ADDR: Setting =
    Setting::new("brokers.addr", "BROKER_SERVER_ADDR", "localhost:9092");
pub const TRACING_COLLECTOR_URL: Setting =
    Setting::new("tracing.collector.url", "TRACING_COLLECTOR_URL", "");
pub const SERVICE_NAME: Setting =
    Setting::new("service.name", "SERVICE_NAME", env!("CARGO_PKG_NAME"));
pub const METRICS_NAMESPACE: Setting =
    Setting::new("metrics.namespace", "METRICS_NAMESPACE", "example");

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    CommandLine,
    Environment,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub source: Source,
}

/// Flags and environment, merged with the precedence
/// command line > environment > default.
pub struct Sources<'a> {
    cli: &'a Cli,
    env: &'a dyn Environment,
}

impl<'a> Sources<'a> {
    pub fn new(cli: &'a Cli, env: &'a dyn Environment) -> Self {
        Self { cli, env }
    }

    pub fn resolve(&self, setting: &Setting) -> Resolved {
        if let Some(value) = self.cli.flag(setting.flag) {
            return Resolved {
                value: value.to_string(),
                source: Source::CommandLine,
            };
        }

        // An empty variable counts as unset
        match self.env.var(setting.env) {
            Some(value) if !value.is_empty() => Resolved {
                value,
                source: Source::Environment,
            },
            _ => Resolved {
                value: setting.default.to_string(),
                source: Source::Default,
            },
        }
    }

    pub fn resolve_required(&self, setting: &Setting) -> Result<Resolved, ConfigError> {
        let resolved = self.resolve(setting);
        if resolved.value.trim().is_empty() {
            return Err(ConfigError::MissingField {
                flag: setting.flag,
                env: setting.env,
            });
        }
        Ok(resolved)
    }

    pub fn resolve_backend(
        &self,
        address: &Setting,
        resource_name: &Setting,
    ) -> Result<BackendConfig, ConfigError> {
        let address = self.resolve_required(address)?;
        let resource_name = self.resolve_required(resource_name)?;
        Ok(BackendConfig {
            address: address.value,
            resource_name: resource_name.value,
        })
    }

    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let collector_url = self.resolve(&TRACING_COLLECTOR_URL).value;
        Ok(ServiceConfig {
            service_name: self.resolve_required(&SERVICE_NAME)?.value,
            debug_addr: self.resolve_required(&DEBUG_ADDR)?.value,
            grpc_addr: self.resolve_required(&GRPC_ADDR)?.value,
            collector_url: (!collector_url.trim().is_empty()).then_some(collector_url),
            metrics_namespace: self.resolve_required(&METRICS_NAMESPACE)?.value,
        })
    }
}

/// Address and resource name of one external backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub address: String,
    pub resource_name: String,
}

/// Settings consumed by the observability bootstrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub service_name: String,
    pub debug_addr: String,
    pub grpc_addr: String,
    pub collector_url: Option<String>,
    pub metrics_namespace: String,
}

impl ServiceConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            debug_addr: DEBUG_ADDR.default.to_string(),
            grpc_addr: GRPC_ADDR.default.to_string(),
            collector_url: None,
            metrics_namespace: METRICS_NAMESPACE.default.to_string(),
        }
    }

    pub fn with_collector_url(mut self, url: impl Into<String>) -> Self {
        self.collector_url = Some(url.into());
        self
    }

    pub fn with_debug_addr(mut self, addr: impl Into<String>) -> Self {
        self.debug_addr = addr.into();
        self
    }

    pub fn debug_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        listen_addr(&self.debug_addr)
    }
}

/// Parses a listen address; a bare `:port` binds every interface.
pub fn listen_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    full.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidListenAddr {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

impl fmt::Display for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Service: {}", self.service_name)?;
        writeln!(f, "  Debug Address: {}", self.debug_addr)?;
        writeln!(f, "  gRPC Address: {}", self.grpc_addr)?;
        writeln!(
            f,
            "  Tracing Collector: {}",
            self.collector_url.as_deref().unwrap_or("none (no-op tracer)")
        )?;
        writeln!(f, "  Metrics Namespace: {}", self.metrics_namespace)?;
        Ok(())
    }
}
