//! Prometheus metrics for the drive402 command surface and telemetry.

use drive_core::{SinkError, TelemetrySample, TelemetrySink};
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// Telemetry channels

pub static POSITION: LazyLock<Gauge> =
    LazyLock::new(|| gauge("drive402_position", "Actual axis position"));

pub static VELOCITY: LazyLock<Gauge> =
    LazyLock::new(|| gauge("drive402_velocity", "Actual axis velocity"));

pub static CURRENT_RMS: LazyLock<Gauge> =
    LazyLock::new(|| gauge("drive402_current_rms", "RMS drive current"));

pub static TEMPERATURE_C: LazyLock<Gauge> =
    LazyLock::new(|| gauge("drive402_temperature_celsius", "Drive temperature in Celsius"));

pub static DIGITAL_INPUTS: LazyLock<Gauge> =
    LazyLock::new(|| gauge("drive402_digital_inputs", "Digital input word"));

pub static DRIVE_STATUS: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "drive402_drive_status",
        "CiA-402 power state (0=not_ready .. 7=fault)",
    )
});

// Cycle and command-surface counters

/// One increment per published cycle sample.
pub static SAMPLES_PUBLISHED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "drive402_samples_published_total",
        "Telemetry samples published by the cyclic loop",
    )
});

pub static COMMANDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "drive402_commands_total",
        "Command-surface requests handled",
    )
});

pub static COMMAND_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "drive402_command_failures_total",
        "Command-surface requests that returned a failure outcome",
    )
});

/// Bridge client connection status (1 = connected, 0 = disconnected)
pub static BRIDGE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "drive402_bridge_connected",
        "Bridge client connection status (1=connected, 0=disconnected)",
    )
});

/// Telemetry sink updating the per-channel gauges once per cycle.
pub struct MetricsSink;

impl TelemetrySink for MetricsSink {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn publish(&self, sample: &TelemetrySample) -> Result<(), SinkError> {
        POSITION.set(sample.position);
        VELOCITY.set(sample.velocity);
        CURRENT_RMS.set(sample.current_rms);
        TEMPERATURE_C.set(sample.temperature_c);
        DIGITAL_INPUTS.set(sample.digital_inputs as f64);
        DRIVE_STATUS.set(sample.status.as_u32() as f64);
        SAMPLES_PUBLISHED.inc();
        Ok(())
    }
}

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = REGISTRY.gather();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let response = Response::from_data(buffer).with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        )
                        .unwrap(),
                    );
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the loop has published at least one sample.
                    if SAMPLES_PUBLISHED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = POSITION.get();
    let _ = VELOCITY.get();
    let _ = CURRENT_RMS.get();
    let _ = TEMPERATURE_C.get();
    let _ = DIGITAL_INPUTS.get();
    let _ = DRIVE_STATUS.get();
    let _ = SAMPLES_PUBLISHED.get();
    let _ = COMMANDS_TOTAL.get();
    let _ = COMMAND_FAILURES.get();
    let _ = BRIDGE_CONNECTED.get();
}
