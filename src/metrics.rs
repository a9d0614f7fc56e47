//! Prometheus metrics for the relay bot.
//!
//! Exposes:
//! - `song_relay_relay_total` (counter by outcome)
//! - `song_relay_command_total` (counter by command and status)
//! - `song_relay_command_duration_seconds` (histogram)
//! - `song_relay_poll_errors_total` (counter)
//! - `song_relay_pruned_total` (counter)
//! - `song_relay_catalog_records` (gauge)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static RELAY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "song_relay_relay_total",
        "Inbound audio messages by relay outcome",
        &["outcome"]
    )
    .expect("failed to register relay counter")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "song_relay_command_total",
        "Handled chat commands by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "song_relay_command_duration_seconds",
        "Chat command handling duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static POLL_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "song_relay_poll_errors_total",
        "Failed getUpdates calls"
    )
    .expect("failed to register poll error counter")
});

static PRUNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "song_relay_pruned_total",
        "Catalog records removed because their message vanished"
    )
    .expect("failed to register pruned counter")
});

static CATALOG_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("song_relay_catalog_records", "Records in the song catalog")
        .expect("failed to register catalog gauge")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&RELAY_TOTAL);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&POLL_ERRORS);
    Lazy::force(&PRUNED_TOTAL);
    Lazy::force(&CATALOG_RECORDS);
}

/// Count one relay attempt by outcome (`relayed`, `duplicate`, `failed`).
pub fn record_relay(outcome: &'static str) {
    init_collectors();
    RELAY_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

pub fn record_poll_error() {
    init_collectors();
    POLL_ERRORS.inc();
}

pub fn record_pruned() {
    init_collectors();
    PRUNED_TOTAL.inc();
}

pub fn set_catalog_size(records: usize) {
    init_collectors();
    CATALOG_RECORDS.set(i64::try_from(records).unwrap_or(i64::MAX));
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        let mut response = Response::new(Full::from("encode error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(response);
    }

    let mut response = Response::new(Full::from(buffer));
    if let Ok(value) = encoder.format_type().parse::<hyper::header::HeaderValue>() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            Ok(response)
        }
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
