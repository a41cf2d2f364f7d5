use crate::command::{CycleState, CycleStateCell};
use crate::device::MotionDevice;
use crate::error::CycleError;
use crate::telemetry::TelemetryFanout;
use crate::watchdog::TargetWatchdog;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Target commanded when the watchdog trips.
const SAFE_TARGET: f64 = 0.0;

#[derive(Clone, Debug)]
pub struct CycleConfig {
    pub period: Duration,
    pub watchdog_timeout: Duration,
    pub mode_confirm_timeout: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(50),
            watchdog_timeout: Duration::from_secs(1),
            mode_confirm_timeout: Duration::from_millis(100),
        }
    }
}

impl CycleConfig {
    /// Period must be non-zero; a timeout below the period would trip the
    /// watchdog on every tick.
    pub fn validate(&self) -> Result<(), String> {
        if self.period.is_zero() {
            return Err("cycle period must be greater than zero".into());
        }
        if self.watchdog_timeout < self.period {
            return Err(format!(
                "watchdog timeout {}ms must be at least the cycle period {}ms",
                self.watchdog_timeout.as_millis(),
                self.period.as_millis()
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Default, Debug)]
pub struct CycleStats {
    pub cycles_executed: u64,
    pub cycles_missed: u64,
    pub watchdog_forced: u64,
    pub max_jitter_us: u64,
}

/// The periodic read-then-write exchange with the device, plus the one-shot
/// initialization sequencer, the watchdog policy and telemetry publication.
///
/// Owns the [`CycleState`] transitions exclusively; no external actor can
/// re-enter initialization. The device lock is held across
/// read → write → watchdog → sample so command handlers can never interleave
/// mid-tick.
pub struct ControlCycle<D: MotionDevice> {
    device: Arc<Mutex<D>>,
    watchdog: Arc<TargetWatchdog>,
    state: Arc<CycleStateCell>,
    period: Duration,
    sinks: TelemetryFanout,
    stats: CycleStats,
}

impl<D: MotionDevice> ControlCycle<D> {
    pub fn new(
        device: Arc<Mutex<D>>,
        watchdog: Arc<TargetWatchdog>,
        state: Arc<CycleStateCell>,
        period: Duration,
        sinks: TelemetryFanout,
    ) -> Self {
        Self {
            device,
            watchdog,
            state,
            period,
            sinks,
            stats: CycleStats::default(),
        }
    }

    /// One scheduled invocation. The very first call runs the one-shot
    /// setup (register default modes, validate configured objects) before
    /// any cyclic exchange; a validation failure is fatal and latches the
    /// driver out of Running permanently.
    pub fn tick(&mut self) -> Result<(), CycleError> {
        match self.state.get() {
            CycleState::NotInitialized => {
                self.state.set(CycleState::Initializing);
                info!("initialising device and configured objects");
                {
                    let mut device = self.device.lock().unwrap();
                    device.register_default_modes();
                    if let Err(e) = device.validate_configured_objects() {
                        error!(error = %e, "object validation failed; refusing to cycle");
                        return Err(CycleError::ObjectValidation(e));
                    }
                }
                self.state.set(CycleState::Running);
                // The command stream starts counting from Running entry.
                self.watchdog.refresh();
                self.exchange();
                Ok(())
            }
            // A failed one-shot setup is never retried.
            CycleState::Initializing => Err(CycleError::InitFailed),
            CycleState::Running => {
                self.exchange();
                Ok(())
            }
        }
    }

    fn exchange(&mut self) {
        let sample = {
            let mut device = self.device.lock().unwrap();
            device.read_cycle();
            device.write_cycle();

            if self.watchdog.expired() {
                // Designed safety behavior, not an error path.
                match device.set_target(SAFE_TARGET) {
                    Ok(()) => info!(
                        timeout_ms = self.watchdog.timeout().as_millis() as u64,
                        "command stream stale; forcing safe target"
                    ),
                    Err(e) => warn!(error = %e, "safe-target write not accepted"),
                }
                // Re-arm so one expiry yields one forced write.
                self.watchdog.refresh();
                self.stats.watchdog_forced += 1;
            }

            device.current_telemetry()
        };

        self.sinks.publish(&sample);
        self.stats.cycles_executed += 1;
    }

    /// Drive ticks at the fixed period until the stop flag is set or a
    /// fatal initialization error surfaces.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), CycleError> {
        let mut next_cycle = Instant::now() + self.period;

        while !stop.load(std::sync::atomic::Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_cycle {
                std::thread::sleep(next_cycle - now);
            } else {
                self.stats.cycles_missed += 1;
            }

            let cycle_start = Instant::now();
            let first_tick = self.state.get() != CycleState::Running;
            self.tick()?;

            let cycle_duration = cycle_start.elapsed();
            if cycle_duration > self.period {
                let jitter_us = (cycle_duration - self.period).as_micros() as u64;
                self.stats.max_jitter_us = self.stats.max_jitter_us.max(jitter_us);
            }

            // The one-shot setup suspended the schedule; re-arm from now so
            // its duration never causes catch-up ticks.
            next_cycle = if first_tick {
                Instant::now() + self.period
            } else {
                next_cycle + self.period
            };
        }
        Ok(())
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn state(&self) -> CycleState {
        self.state.get()
    }
}
