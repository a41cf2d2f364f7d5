use crate::device::MotionDevice;
use crate::error::DeviceError;
use crate::mode::OperationMode;
use crate::watchdog::TargetWatchdog;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of the cyclic loop. Transitions NotInitialized → Initializing
/// → Running happen at most once, driven solely by the loop's first tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    NotInitialized,
    Initializing,
    Running,
}

/// Shared view of [`CycleState`]. Written only by the cyclic loop; the
/// command surface reads it to gate operations that require a running cycle.
#[derive(Debug)]
pub struct CycleStateCell(AtomicU8);

impl CycleStateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(CycleState::NotInitialized as u8))
    }

    pub fn get(&self) -> CycleState {
        match self.0.load(Ordering::Acquire) {
            0 => CycleState::NotInitialized,
            1 => CycleState::Initializing,
            _ => CycleState::Running,
        }
    }

    pub(crate) fn set(&self, state: CycleState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for CycleStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one synchronous command-surface request. Every request yields
/// exactly one outcome; failures carry the device's reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<(), DeviceError>> for CommandOutcome {
    fn from(result: Result<(), DeviceError>) -> Self {
        match result {
            Ok(()) => CommandOutcome::ok("ok"),
            Err(e) => CommandOutcome::failure(e.to_string()),
        }
    }
}

/// Bridges external request/response callers to the device abstraction.
///
/// Every device access locks the same mutex the cyclic loop holds across
/// its read-then-write step, so a command write can never interleave
/// mid-tick. Mode confirmation waits are bounded by `mode_confirm_timeout`.
pub struct CommandSurface<D: MotionDevice> {
    device: Arc<Mutex<D>>,
    watchdog: Arc<TargetWatchdog>,
    cycle_state: Arc<CycleStateCell>,
    mode_confirm_timeout: Duration,
}

impl<D: MotionDevice> Clone for CommandSurface<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            watchdog: Arc::clone(&self.watchdog),
            cycle_state: Arc::clone(&self.cycle_state),
            mode_confirm_timeout: self.mode_confirm_timeout,
        }
    }
}

impl<D: MotionDevice> CommandSurface<D> {
    pub fn new(
        device: Arc<Mutex<D>>,
        watchdog: Arc<TargetWatchdog>,
        cycle_state: Arc<CycleStateCell>,
        mode_confirm_timeout: Duration,
    ) -> Self {
        Self {
            device,
            watchdog,
            cycle_state,
            mode_confirm_timeout,
        }
    }

    /// Bring the drive to operational and home it. Requires the cyclic
    /// loop to be running so the exchange can carry the handshake.
    pub fn init(&self) -> CommandOutcome {
        if self.cycle_state.get() != CycleState::Running {
            warn!("init requested before cyclic loop reached running state");
            return CommandOutcome::failure("driver not cycling yet");
        }
        let result = self.device.lock().unwrap().init();
        match &result {
            Ok(()) => info!("drive initialised and homed"),
            Err(e) => warn!(error = %e, "drive init rejected"),
        }
        result.into()
    }

    /// Clear faults and re-enable the power stage.
    pub fn recover(&self) -> CommandOutcome {
        let result = self.device.lock().unwrap().recover();
        match &result {
            Ok(()) => info!("drive recovered"),
            Err(e) => warn!(error = %e, "drive recover failed"),
        }
        result.into()
    }

    /// Issue a quickstop. The outcome mirrors the device acknowledgment.
    pub fn halt(&self) -> CommandOutcome {
        let result = self.device.lock().unwrap().halt();
        match &result {
            Ok(()) => info!("quickstop issued"),
            Err(e) => warn!(error = %e, "quickstop not acknowledged"),
        }
        result.into()
    }

    /// Request an operation-mode transition and wait (bounded) for the
    /// device to confirm it.
    pub fn set_mode(&self, mode: OperationMode) -> CommandOutcome {
        let result = self
            .device
            .lock()
            .unwrap()
            .enter_mode(mode, self.mode_confirm_timeout);
        match &result {
            Ok(()) => info!(mode = %mode, "operation mode confirmed"),
            Err(e) => warn!(mode = %mode, error = %e, "mode transition rejected"),
        }
        result.into()
    }

    /// Forward a motion target. An accepted target refreshes the watchdog;
    /// a rejected one leaves it untouched.
    pub fn set_target(&self, value: f64) -> CommandOutcome {
        let result = self.device.lock().unwrap().set_target(value);
        match &result {
            Ok(()) => {
                self.watchdog.refresh();
                debug!(value, "target accepted");
            }
            Err(e) => warn!(value, error = %e, "target rejected"),
        }
        result.into()
    }

    /// Streamed target update: same path as [`set_target`](Self::set_target)
    /// but with no response to deliver.
    pub fn stream_target(&self, value: f64) {
        let _ = self.set_target(value);
    }

    /// Whether the transport layer can currently accept commands. Never
    /// fails; the outcome's success mirrors the boolean status.
    pub fn is_ready(&self) -> CommandOutcome {
        let ready = self.device.lock().unwrap().transport_ready();
        if ready {
            CommandOutcome::ok("transport ready")
        } else {
            CommandOutcome::failure("transport not ready")
        }
    }

    pub fn cycle_state(&self) -> CycleState {
        self.cycle_state.get()
    }
}

#[cfg(all(test, feature = "simulation"))]
mod tests {
    use super::*;
    use crate::device_sim::SimulatedDrive;
    use crate::mode::DEFAULT_MODES;

    fn surface(drive: SimulatedDrive) -> CommandSurface<SimulatedDrive> {
        let device = Arc::new(Mutex::new(drive));
        let watchdog = Arc::new(TargetWatchdog::new(Duration::from_secs(1)));
        let state = Arc::new(CycleStateCell::new());
        CommandSurface::new(device, watchdog, state, Duration::from_millis(100))
    }

    fn running_surface(drive: SimulatedDrive) -> CommandSurface<SimulatedDrive> {
        let s = surface(drive);
        s.cycle_state.set(CycleState::Running);
        s
    }

    fn enabled_drive() -> SimulatedDrive {
        let mut drive = SimulatedDrive::new();
        drive.register_default_modes();
        drive.init().unwrap();
        drive
    }

    #[test]
    fn init_fails_before_cycle_is_running() {
        let s = surface(SimulatedDrive::new());
        let outcome = s.init();
        assert!(!outcome.success);

        s.cycle_state.set(CycleState::Running);
        assert!(s.init().success);
    }

    #[test]
    fn accepted_target_refreshes_watchdog() {
        let mut drive = enabled_drive();
        drive
            .enter_mode(OperationMode::ProfiledVelocity, Duration::from_millis(10))
            .unwrap();
        let s = running_surface(drive);

        let before = s.watchdog.last_refresh_us();
        std::thread::sleep(Duration::from_millis(2));
        assert!(s.set_target(2.5).success);
        assert!(s.watchdog.last_refresh_us() > before);
    }

    #[test]
    fn rejected_target_does_not_refresh_watchdog() {
        // No mode selected: the device rejects targets.
        let s = running_surface(enabled_drive());

        let before = s.watchdog.last_refresh_us();
        std::thread::sleep(Duration::from_millis(2));
        let outcome = s.set_target(2.5);
        assert!(!outcome.success);
        assert_eq!(s.watchdog.last_refresh_us(), before);
    }

    #[test]
    fn set_mode_on_faulted_drive_fails_without_touching_cycle_state() {
        let mut drive = enabled_drive();
        drive.inject_fault();
        let s = running_surface(drive);

        let outcome = s.set_mode(OperationMode::ProfiledVelocity);
        assert!(!outcome.success);
        assert_eq!(s.cycle_state(), CycleState::Running);
    }

    #[test]
    fn recover_clears_fault_and_reenables() {
        let mut drive = enabled_drive();
        drive.inject_fault();
        let s = running_surface(drive);

        assert!(s.recover().success);
        assert!(s.set_mode(OperationMode::ProfiledVelocity).success);
    }

    #[test]
    fn halt_reports_device_acknowledgment() {
        let s = running_surface(enabled_drive());
        assert!(s.halt().success);
    }

    #[test]
    fn is_ready_mirrors_transport_status() {
        let s = surface(SimulatedDrive::new());
        assert!(s.is_ready().success);

        let mut drive = SimulatedDrive::new();
        drive.set_transport_ready(false);
        let s = surface(drive);
        assert!(!s.is_ready().success);
    }

    #[test]
    fn every_operation_yields_one_outcome() {
        let mut drive = enabled_drive();
        drive
            .enter_mode(OperationMode::ProfiledVelocity, Duration::from_millis(10))
            .unwrap();
        let s = running_surface(drive);

        let outcomes = [
            s.init(),
            s.recover(),
            s.halt(),
            s.set_mode(OperationMode::ProfiledVelocity),
            s.set_target(1.0),
            s.is_ready(),
        ];
        for outcome in outcomes {
            assert!(!outcome.message.is_empty());
        }
    }

    #[test]
    fn all_default_modes_enterable_on_enabled_drive() {
        let s = running_surface(enabled_drive());
        for mode in DEFAULT_MODES {
            assert!(s.set_mode(*mode).success, "mode {mode} rejected");
        }
    }
}
