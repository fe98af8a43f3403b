use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Path the scrape handler is mounted on.
pub const METRICS_PATH: &str = "/metrics";

/// Service-level instruments, registered on a registry owned by this struct
/// rather than the prometheus default registry.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Arc<Registry>,
    pub integers_summed: IntCounter,
    pub characters_concatenated: IntCounter,
    pub request_duration: HistogramVec,
}

impl ServiceMetrics {
    pub fn new(namespace: &str, service_name: &str) -> prometheus::Result<Self> {
        let namespace = metric_component(namespace);
        let subsystem = metric_component(service_name);
        let registry = Registry::new();

        // Business-level metrics
        let integers_summed = IntCounter::with_opts(
            Opts::new("integers_summed", "Total count of integers summed")
                .namespace(namespace.clone())
                .subsystem(subsystem.clone()),
        )?;
        let characters_concatenated = IntCounter::with_opts(
            Opts::new(
                "characters_concatenated",
                "Total count of characters concatenated",
            )
            .namespace(namespace.clone())
            .subsystem(subsystem.clone()),
        )?;

        // Endpoint-level metrics
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request duration in seconds")
                .namespace(namespace)
                .subsystem(subsystem)
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["method", "success"],
        )?;

        registry.register(Box::new(integers_summed.clone()))?;
        registry.register(Box::new(characters_concatenated.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry: Arc::new(registry),
            integers_summed,
            characters_concatenated,
            request_duration,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn add_integers(&self, count: u64) {
        self.integers_summed.inc_by(count);
    }

    pub fn add_characters(&self, count: u64) {
        self.characters_concatenated.inc_by(count);
    }

    pub fn record_request(&self, method: &str, success: bool, duration: Duration) {
        let success = if success { "true" } else { "false" };
        self.request_duration
            .with_label_values(&[method, success])
            .observe(duration.as_secs_f64());
    }

    /// Current state of the registry in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        render_registry(&self.registry)
    }
}

pub fn render_registry(registry: &Registry) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Maps an arbitrary name onto the `[a-zA-Z0-9_]` alphabet metric names allow.
fn metric_component(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
