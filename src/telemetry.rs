use crate::{error::ObservabilityError, logging::TraceLayer};
use opentelemetry::global::GlobalTracerProvider;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing::{error, info, warn};
use url::Url;

/// Local address the recorder reports for this process.
const RECORDER_ADDR: &str = "localhost:80";
const DEFAULT_COLLECTOR_PORT: u16 = 4317;

/// Tracer bound to a remote collector, or the process-wide no-op fallback.
pub enum Tracer {
    Configured {
        endpoint: String,
        provider: SdkTracerProvider,
    },
    Fallback(GlobalTracerProvider),
}

impl Tracer {
    pub fn fallback() -> Self {
        Tracer::Fallback(opentelemetry::global::tracer_provider())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Tracer::Configured { .. })
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Tracer::Configured { endpoint, .. } => Some(endpoint),
            Tracer::Fallback(_) => None,
        }
    }

    /// Bridge layer feeding `tracing` spans into the collector.
    pub fn layer(&self, service_name: &str) -> Option<TraceLayer> {
        match self {
            Tracer::Configured { provider, .. } => {
                let tracer = provider.tracer(service_name.to_string());
                Some(Box::new(tracing_opentelemetry::layer().with_tracer(tracer)))
            }
            Tracer::Fallback(_) => None,
        }
    }

    /// Flushes pending spans.
    pub fn shutdown(&self) {
        if let Tracer::Configured { endpoint, provider } = self {
            if let Err(e) = provider.shutdown() {
                warn!(endpoint = %endpoint, "Tracer shutdown failed: {}", e);
            }
        }
    }
}

/// Validates the collector URL and checks its host resolves.
async fn probe_collector(url: &str) -> Result<String, ObservabilityError> {
    let invalid = |reason: String| ObservabilityError::InvalidCollectorUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let port = parsed.port_or_known_default().unwrap_or(DEFAULT_COLLECTOR_PORT);
    let endpoint = format!("{}:{}", host, port);

    let found = tokio::net::lookup_host(endpoint.as_str())
        .await
        .map_err(|source| ObservabilityError::CollectorUnreachable {
            endpoint: endpoint.clone(),
            source,
        })?
        .next()
        .is_some();
    if !found {
        return Err(ObservabilityError::CollectorUnreachable {
            endpoint,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        });
    }

    Ok(endpoint)
}

fn build_provider(url: &str, service_name: &str) -> Result<SdkTracerProvider, ObservabilityError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()
        .map_err(|e| ObservabilityError::Exporter(e.to_string()))?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(vec![KeyValue::new("service.address", RECORDER_ADDR)])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Builds the tracer for `collector_url`, or the fallback when there is none.
/// Failures are logged before being returned.
pub async fn init_tracer(
    collector_url: Option<&str>,
    service_name: &str,
) -> Result<Tracer, ObservabilityError> {
    let url = match collector_url.map(str::trim) {
        None | Some("") => {
            info!("No tracing collector configured, using no-op tracer");
            return Ok(Tracer::fallback());
        }
        Some(url) => url,
    };

    info!(tracer = "otlp", url = %url, "Initializing tracer");
    let result = probe_collector(url)
        .await
        .and_then(|_| build_provider(url, service_name));

    match result {
        Ok(provider) => Ok(Tracer::Configured {
            endpoint: url.to_string(),
            provider,
        }),
        Err(e) => {
            error!(url = %url, "Tracer initialization failed: {}", e);
            Err(e)
        }
    }
}
