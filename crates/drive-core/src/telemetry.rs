use crate::mode::DriveStatus;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::warn;

/// Immutable per-cycle snapshot of the device's current readings.
/// Produced once per tick, published to every sink, then discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySample {
    pub timestamp_us: u64,
    pub position: f64,
    pub velocity: f64,
    pub current_rms: f64,
    pub temperature_c: f64,
    pub digital_inputs: u32,
    pub status: DriveStatus,
}

#[derive(Debug, Error)]
#[error("telemetry sink failed: {0}")]
pub struct SinkError(pub String);

/// Fire-and-forget consumer of per-cycle samples. A failing sink must not
/// affect other sinks or the cycle that published the sample.
pub trait TelemetrySink: Send {
    fn name(&self) -> &'static str;
    fn publish(&self, sample: &TelemetrySample) -> Result<(), SinkError>;
}

/// Publishes one sample to every registered sink, isolating failures.
pub struct TelemetryFanout {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl TelemetryFanout {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }

    pub fn publish(&self, sample: &TelemetrySample) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(sample) {
                warn!(sink = sink.name(), error = %e, "telemetry publish failed");
            }
        }
    }
}

impl Default for TelemetryFanout {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-writer latest-value exchange for the most recent sample.
///
/// The cyclic loop writes once per tick; bridge and metrics readers take
/// the freshest complete snapshot without blocking the writer.
pub struct SampleCell {
    slots: [UnsafeCell<TelemetrySample>; 3],
    index: AtomicUsize,
}

unsafe impl Send for SampleCell {}
unsafe impl Sync for SampleCell {}

impl SampleCell {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| UnsafeCell::new(TelemetrySample::default())),
            index: AtomicUsize::new(0),
        }
    }

    pub fn write(&self, sample: TelemetrySample) {
        let current = self.index.load(Ordering::Relaxed);
        let next = (current + 1) % 3;
        unsafe {
            *self.slots[next].get() = sample;
        }
        self.index.store(next, Ordering::Release);
    }

    pub fn read(&self) -> TelemetrySample {
        let idx = self.index.load(Ordering::Acquire);
        unsafe { *self.slots[idx].get() }
    }
}

impl Default for SampleCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that stores the latest sample in a shared [`SampleCell`].
pub struct SharedSampleSink(pub std::sync::Arc<SampleCell>);

impl TelemetrySink for SharedSampleSink {
    fn name(&self) -> &'static str {
        "shared-sample"
    }

    fn publish(&self, sample: &TelemetrySample) -> Result<(), SinkError> {
        self.0.write(*sample);
        Ok(())
    }
}
