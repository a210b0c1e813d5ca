//! Logging and optional OpenTelemetry export
//!
//! Console output goes to stderr so it does not mix with the interactive
//! prompt on stdout. When an OTLP endpoint is configured, spans
//! (`agent_task` → `llm_call` / `tool_call`) are also exported:
//!
//! ```text
//! quickapp → OTLP (gRPC) → OTel Collector → Tempo / Jaeger
//! ```

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "warn";

/// Default filter for `--verbose`
const VERBOSE_FILTER: &str = "info,quickapp=debug";

/// How the subscriber should be assembled
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Use the more detailed default filter
    pub verbose: bool,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// OTLP gRPC endpoint; export is disabled when None
    pub otlp_endpoint: Option<String>,
}

/// Initialize the tracing subsystem
///
/// `RUST_LOG` always wins over the built-in defaults.
///
/// # Example
/// ```ignore
/// init_tracing("quickapp", &LogConfig::default())?;
/// ```
pub fn init_tracing(
    service_name: &str,
    config: &LogConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default_filter = if config.verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint.clone());

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(
                    vec![
                        KeyValue::new("service.name", service_name.to_string()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ],
                )))
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::debug!(
        service = service_name,
        otlp = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}

/// Flush pending spans to the collector
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}
