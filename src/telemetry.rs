use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::path::Path;
use std::time::Duration;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::Config;

const SERVICE_NAME: &str = "timetable_routes";

/// Flushes the log file and exported spans when dropped.
pub struct TelemetryGuard {
    _file_guard: WorkerGuard,
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                error!("couldn't flush spans: {e}");
            }
        }
    }
}

/// Logs to stderr and a daily rolling file. Spans also go to `OTLP_ENDPOINT` when it's set.
pub fn init(config: &Config) -> Result<TelemetryGuard> {
    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| -> Result<SdkTracerProvider> {
            let exporter = SpanExporter::builder()
                .with_tonic()
                .with_timeout(Duration::from_millis(1000))
                .with_endpoint(endpoint)
                .with_protocol(opentelemetry_otlp::Protocol::Grpc)
                .build()?;

            Ok(SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
                .build())
        })
        .transpose()?;

    let telemetry_layer = provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)));

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let (non_blocking_appender, file_guard) =
        tracing_appender::non_blocking(file_appender(&config.log_dir)?);

    // A layer that logs events to rolling files.
    let file_log = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .pretty();

    // stdout is kept for the records printed by dry runs
    let stderr_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    Registry::default()
        .with(telemetry_layer)
        .with(file_log)
        .with(stderr_log)
        .with(env_filter)
        .try_init()?;

    Ok(TelemetryGuard {
        _file_guard: file_guard,
        provider,
    })
}

/// Daily files named `timetable_routes.<date>.log`. Fails instead of panicking when
/// `log_dir` can't be created.
fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(SERVICE_NAME)
        .filename_suffix("log")
        .build(log_dir)
}
