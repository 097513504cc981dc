use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_stdout::SpanExporter;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVICE_NAME: &str = "aisle-server";
const OTEL_STDOUT_ENV: &str = "AISLE_OTEL_STDOUT";

/// Logging, tracing and metrics for the server process. Dropping it flushes
/// the tracer provider.
pub struct Telemetry {
    /// Present only when metrics are kept in-process instead of served.
    recorder: Option<PrometheusHandle>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Must run inside the Tokio runtime when `metrics_addr` is set, since the
    /// exporter's HTTP listener is spawned onto it.
    pub fn init(metrics_addr: Option<SocketAddr>) -> Result<Self> {
        let recorder = install_metrics(metrics_addr)?;
        let tracer_provider = flag_enabled(OTEL_STDOUT_ENV).then(stdout_tracer_provider);

        let otel_layer = tracer_provider.as_ref().map(|provider| {
            global::set_tracer_provider(provider.clone());
            tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
        });

        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(otel_layer)
            .try_init()
            .context("failed to initialise tracing subscriber")?;

        if tracer_provider.is_some() {
            info!(env = OTEL_STDOUT_ENV, "exporting spans to stdout");
        }
        if let Some(addr) = metrics_addr {
            info!(metrics_addr = %addr, "serving Prometheus metrics");
        }

        Ok(Self {
            recorder,
            tracer_provider,
        })
    }

    /// Rendered metrics when no HTTP exporter is running.
    pub fn render_metrics(&self) -> Option<String> {
        self.recorder.as_ref().map(PrometheusHandle::render)
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };
        if let Err(err) = provider.shutdown() {
            warn!(error = %err, "failed to flush span exporter");
        }
    }
}

fn install_metrics(metrics_addr: Option<SocketAddr>) -> Result<Option<PrometheusHandle>> {
    let builder = PrometheusBuilder::new();
    match metrics_addr {
        Some(addr) => {
            builder
                .with_http_listener(addr)
                .install()
                .with_context(|| format!("failed to serve Prometheus metrics on {addr}"))?;
            Ok(None)
        }
        None => builder
            .install_recorder()
            .map(Some)
            .context("failed to install Prometheus metrics recorder"),
    }
}

fn stdout_tracer_provider() -> SdkTracerProvider {
    SdkTracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(
            Resource::builder()
                .with_attributes([KeyValue::new("service.name", SERVICE_NAME)])
                .build(),
        )
        .build()
}

fn flag_enabled(key: &str) -> bool {
    std::env::var(key)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
