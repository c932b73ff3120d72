// Telemetry initialization
//
// Installs the tracing subscriber and, when an OTLP endpoint is configured,
// an OpenTelemetry meter provider exporting pool metrics.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::metrics::{MetricsSink, NoopSink, OtelSink};

const DEFAULT_SERVICE_NAME: &str = "worker-lab";

/// Configuration for logging and metric export
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to exported metrics
    pub service_name: String,
    /// OTLP endpoint (e.g., "http://localhost:4317")
    pub otlp_endpoint: Option<String>,
    /// Log filter (e.g., "info", "worker_lab=debug")
    pub log_filter: Option<String>,
    /// Interval between metric exports
    pub export_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otlp_endpoint: None,
            log_filter: None,
            export_interval: Duration::from_secs(5),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `OTEL_SERVICE_NAME`: Service name (default: "worker-lab")
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint; metrics are exported only when set
    /// - `OTEL_METRIC_EXPORT_INTERVAL`: Export interval in milliseconds
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            export_interval: std::env::var("OTEL_METRIC_EXPORT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.export_interval),
        }
    }
}

/// Guard that flushes and shuts down the meter provider when dropped
pub struct TelemetryGuard {
    provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Sink for pool metrics: OpenTelemetry when export is enabled
    pub fn metrics_sink(&self) -> Arc<dyn MetricsSink> {
        match &self.provider {
            Some(_) => Arc::new(OtelSink::global()),
            None => Arc::new(NoopSink),
        }
    }

    pub fn exports_metrics(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shutdown meter provider: {:?}", e);
            }
        }
    }
}

/// Initialize logging and metric export
///
/// Keep the returned guard alive for the lifetime of the application.
///
/// ```ignore
/// let telemetry = init_telemetry(TelemetryConfig::from_env());
/// let pool = WorkerPool::new(config, telemetry.metrics_sink())?;
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(filter);

    let (provider, otel_status) = match &config.otlp_endpoint {
        Some(endpoint) => match build_meter_provider(&config, endpoint) {
            Ok(provider) => {
                opentelemetry::global::set_meter_provider(provider.clone());
                (Some(provider), Some(Ok(endpoint.clone())))
            }
            Err(e) => (None, Some(Err(e))),
        },
        None => (None, None),
    };

    tracing_subscriber::registry().with(console_layer).init();

    match otel_status {
        Some(Ok(endpoint)) => {
            tracing::info!(endpoint = %endpoint, "OpenTelemetry metrics enabled");
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Failed to initialize OTLP exporter, continuing without metrics");
        }
        None => {
            tracing::debug!("OpenTelemetry metrics disabled: OTEL_EXPORTER_OTLP_ENDPOINT not set");
        }
    }

    TelemetryGuard { provider }
}

fn build_meter_provider(config: &TelemetryConfig, endpoint: &str) -> Result<SdkMeterProvider, String> {
    let resource = Resource::builder()
        .with_attributes([KeyValue::new("service.name", config.service_name.clone())])
        .build();

    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| e.to_string())?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(config.export_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build())
}
