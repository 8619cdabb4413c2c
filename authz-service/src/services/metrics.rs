use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use service_core::error::AppError;
use std::sync::OnceLock;

/// Process-wide collectors, registered once.
pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub authz_decisions_total: IntCounterVec,
    pub commands_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metric_error(e: prometheus::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Failed to initialize metrics: {}", e))
}

fn build() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let authz_decisions_total = IntCounterVec::new(
        Opts::new(
            "authz_decisions_total",
            "Authorization decisions by outcome",
        ),
        &["outcome"],
    )?;
    let commands_total = IntCounterVec::new(
        Opts::new("commands_total", "Handled commands by kind and result"),
        &["command", "result"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(authz_decisions_total.clone()))?;
    registry.register(Box::new(commands_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        authz_decisions_total,
        commands_total,
    })
}

/// Register collectors. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = build().map_err(|e| {
        tracing::error!("Failed to create metrics: {}", e);
        metric_error(e)
    })?;
    let _ = METRICS.set(metrics);
    Ok(())
}

pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

pub fn record_decision(outcome: &str) {
    if let Some(m) = metrics() {
        m.authz_decisions_total.with_label_values(&[outcome]).inc();
    }
}

pub fn record_command(command: &str, result: &str) {
    if let Some(m) = metrics() {
        m.commands_total.with_label_values(&[command, result]).inc();
    }
}

pub fn get_metrics() -> String {
    let Some(metrics) = metrics() else {
        tracing::error!("Metrics registry not initialized");
        return "# Metrics registry not initialized\n".to_string();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
