//! Prometheus metrics for the hub service.
//!
//! Hub counters live in `SessionHub::stats()`; the telemetry thread mirrors
//! them here through [`record_hub`] so the core crate stays free of any
//! exporter dependency.

use hub_core::HubStats;
use prometheus::core::Collector;
use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Header, Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register<M: Collector + Clone + 'static>(metric: M) -> M {
    if let Err(e) = REGISTRY.register(Box::new(metric.clone())) {
        tracing::warn!(error = %e, "Metric registration failed");
    }
    metric
}

// Metric definitions below are static; construction only fails on an
// invalid name, which would be a programming error.

fn hub_counter(name: &str, help: &str) -> IntCounterVec {
    register(IntCounterVec::new(Opts::new(name, help), &["hub"]).expect("valid metric definition"))
}

// ============================================================================
// Hub Metrics
// ============================================================================

/// Session state per hub (1 = connected, 0 = disconnected)
pub static HUB_CONNECTED: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register(
        IntGaugeVec::new(
            Opts::new("uahub_hub_connected", "Hub session state (1=connected, 0=disconnected)"),
            &["hub"],
        )
        .expect("valid metric definition"),
    )
});

/// Number of hubs with a live session
pub static HUBS_CONNECTED: LazyLock<IntGauge> = LazyLock::new(|| {
    register(
        IntGauge::new("uahub_hubs_connected", "Number of hubs with a live session")
            .expect("valid metric definition"),
    )
});

pub static HUB_CONNECT_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    hub_counter("uahub_connect_attempts_total", "Session connect attempts per hub")
});

pub static HUB_CONNECT_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    hub_counter("uahub_connect_failures_total", "Failed session connects per hub")
});

pub static HUB_READS: LazyLock<IntCounterVec> =
    LazyLock::new(|| hub_counter("uahub_reads_total", "Node reads per hub"));

pub static HUB_READ_FAILURES: LazyLock<IntCounterVec> =
    LazyLock::new(|| hub_counter("uahub_read_failures_total", "Failed node reads per hub"));

pub static HUB_WRITES: LazyLock<IntCounterVec> =
    LazyLock::new(|| hub_counter("uahub_writes_total", "Node writes per hub"));

pub static HUB_WRITE_FAILURES: LazyLock<IntCounterVec> =
    LazyLock::new(|| hub_counter("uahub_write_failures_total", "Failed node writes per hub"));

// ============================================================================
// Sensor Metrics
// ============================================================================

/// Last good numeric reading per sensor
pub static SENSOR_VALUE: LazyLock<GaugeVec> = LazyLock::new(|| {
    register(
        GaugeVec::new(
            Opts::new("uahub_sensor_value", "Last numeric value read by a sensor"),
            &["sensor", "hub"],
        )
        .expect("valid metric definition"),
    )
});

/// Sensor availability (1 = last poll succeeded)
pub static SENSOR_AVAILABLE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register(
        IntGaugeVec::new(
            Opts::new("uahub_sensor_available", "Sensor availability (1=available)"),
            &["sensor", "hub"],
        )
        .expect("valid metric definition"),
    )
});

// ============================================================================
// Service Metrics
// ============================================================================

/// Clients currently attached to the service endpoint
pub static SERVICE_CLIENTS: LazyLock<IntGauge> = LazyLock::new(|| {
    register(
        IntGauge::new("uahub_service_clients", "Clients attached to the service endpoint")
            .expect("valid metric definition"),
    )
});

/// Service requests by type, including malformed ones
pub static SERVICE_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("uahub_service_requests_total", "Service requests handled by type"),
            &["type"],
        )
        .expect("valid metric definition"),
    )
});

fn sync_counter(counter: &IntCounter, total: u64) {
    let seen = counter.get();
    if total > seen {
        counter.inc_by(total - seen);
    }
}

/// Mirror one hub's state and counters into the registry.
pub fn record_hub(hub: &str, connected: bool, stats: &HubStats) {
    HUB_CONNECTED
        .with_label_values(&[hub])
        .set(i64::from(connected));
    for (vec, total) in [
        (&*HUB_CONNECT_ATTEMPTS, stats.connect_attempts),
        (&*HUB_CONNECT_FAILURES, stats.connect_failures),
        (&*HUB_READS, stats.reads),
        (&*HUB_READ_FAILURES, stats.read_failures),
        (&*HUB_WRITES, stats.writes),
        (&*HUB_WRITE_FAILURES, stats.write_failures),
    ] {
        sync_counter(&vec.with_label_values(&[hub]), total);
    }
}

pub fn record_sensor(sensor: &str, hub: &str, available: bool, value: Option<f64>) {
    SENSOR_AVAILABLE
        .with_label_values(&[sensor, hub])
        .set(i64::from(available));
    if let Some(v) = value {
        SENSOR_VALUE.with_label_values(&[sensor, hub]).set(v);
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %bind_addr, error = %e, "Failed to start metrics server");
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => {
                    let mut buffer = Vec::new();
                    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!(error = %e, "Failed to encode metrics");
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }
                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                    continue;
                }
                "/health" => Response::from_string("OK"),
                // Ready once any hub holds a session
                "/ready" if HUBS_CONNECTED.get() > 0 => Response::from_string("Ready"),
                "/ready" => Response::from_string("Not Ready").with_status_code(503),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = HUBS_CONNECTED.get();
    let _ = SERVICE_CLIENTS.get();
    LazyLock::force(&HUB_CONNECTED);
    LazyLock::force(&HUB_CONNECT_ATTEMPTS);
    LazyLock::force(&HUB_CONNECT_FAILURES);
    LazyLock::force(&HUB_READS);
    LazyLock::force(&HUB_READ_FAILURES);
    LazyLock::force(&HUB_WRITES);
    LazyLock::force(&HUB_WRITE_FAILURES);
    LazyLock::force(&SENSOR_VALUE);
    LazyLock::force(&SENSOR_AVAILABLE);
    LazyLock::force(&SERVICE_REQUESTS);
}
