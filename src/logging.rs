use clap::ValueEnum;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const DEFAULT_FILTER: &str = "warn,service_bootstrap=info";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact single-line records (local dev)
    #[default]
    Compact,
    /// JSON records (log shippers)
    Json,
}

/// Layer slot the tracer step fills in once it has a collector.
pub type TraceLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle to the process logger.
pub struct Logger {
    trace_slot: reload::Handle<Option<TraceLayer>, Registry>,
    installed: bool,
}

impl Logger {
    /// Whether this call installed the global subscriber. `false` means an
    /// earlier logger is already serving the process.
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Routes spans to `layer`. Returns false when the subscriber owning the
    /// slot is not the active one.
    pub fn attach_trace_layer(&self, layer: TraceLayer) -> bool {
        match self.trace_slot.reload(Some(layer)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Trace layer not attached: {}", e);
                false
            }
        }
    }
}

/// Installs the structured logger on stderr with timestamps and caller
/// location. Never fails: a second call keeps the first subscriber.
pub fn init_logger(format: LogFormat) -> Logger {
    let (trace_slot_layer, trace_slot) = reload::Layer::new(None::<TraceLayer>);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (compact, json) = match format {
        LogFormat::Compact => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            ),
        ),
    };

    let installed = tracing_subscriber::registry()
        .with(trace_slot_layer)
        .with(filter)
        .with(compact)
        .with(json)
        .try_init()
        .is_ok();

    Logger {
        trace_slot,
        installed,
    }
}
