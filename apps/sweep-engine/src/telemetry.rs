//! Tracing Setup
//!
//! Installs a console subscriber and, when enabled, an OpenTelemetry OTLP
//! exporter.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `observability.logging.level`)
//! - `OTEL_ENABLED`: Set to `true` to export spans over OTLP
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: `http://localhost:4317`)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: `sweep-engine`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use sweep_engine::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(&config.observability.logging);
//!     // ... application code
//! }
//! ```

use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Guard that shuts down the tracer provider on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {e:?}");
            }
        }
    }
}

/// Whether OTLP export was requested through `OTEL_ENABLED`.
fn otel_enabled() -> bool {
    std::env::var("OTEL_ENABLED").is_ok_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Build the OTLP tracer provider, or `None` if the exporter cannot be built.
fn build_provider(endpoint: &str) -> Option<SdkTracerProvider> {
    match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => Some(
            SdkTracerProvider::builder()
                .with_simple_exporter(exporter)
                .build(),
        ),
        Err(e) => {
            eprintln!("Failed to create OTLP exporter: {e:?}, falling back to console logging");
            None
        }
    }
}

/// Initialize tracing.
///
/// Returns a guard that will shut down the tracer provider when dropped.
#[must_use]
pub fn init_telemetry(logging: &LoggingConfig) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "sweep-engine".to_string());

    let provider = if otel_enabled() {
        build_provider(&endpoint)
    } else {
        None
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(service_name.clone())));

    let json = logging.format == "json";
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(logging.include_spans)
            .with_span_list(logging.include_spans)
    });
    let pretty_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    if let Err(e) = Registry::default()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
    {
        eprintln!("Tracing subscriber already installed: {e}");
    }

    if provider.is_some() {
        tracing::info!(
            service_name = %service_name,
            endpoint = %endpoint,
            "OpenTelemetry initialized"
        );
    } else {
        tracing::debug!("OpenTelemetry disabled, using console logging only");
    }

    TelemetryGuard { provider }
}
