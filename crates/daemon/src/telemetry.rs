//! OpenTelemetry export for the daemon's spans

use anyhow::Result;
use tracing_subscriber::{registry::Registry, Layer};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// OTLP endpoint, when configured
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: procmand)
pub fn endpoint() -> Option<String> {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .filter(|e| !e.trim().is_empty())
}

/// Layer exporting spans over OTLP, or None when no endpoint is set
#[cfg(feature = "telemetry")]
pub fn layer() -> Result<Option<BoxedLayer>> {
    match endpoint() {
        Some(endpoint) => Ok(Some(otlp_layer(&endpoint)?)),
        None => Ok(None),
    }
}

/// Export is compiled out; see `endpoint_ignored`
#[cfg(not(feature = "telemetry"))]
pub fn layer() -> Result<Option<BoxedLayer>> {
    Ok(None)
}

/// An endpoint is configured but this build cannot export to it
pub fn endpoint_ignored() -> bool {
    endpoint().is_some() && !cfg!(feature = "telemetry")
}

#[cfg(feature = "telemetry")]
fn otlp_layer(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "procmand".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
