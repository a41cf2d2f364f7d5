use crate::device::MotionDevice;
use crate::error::DeviceError;
use crate::mode::{DriveStatus, OperationMode, DEFAULT_MODES};
use crate::telemetry::TelemetrySample;
use std::time::Duration;

/// Objects the driver configuration expects in the dictionary: controlword,
/// statusword, modes of operation (+ display), and the per-mode targets.
const REQUIRED_OBJECTS: &[(u16, u8)] = &[
    (0x6040, 0),
    (0x6041, 0),
    (0x6060, 0),
    (0x6061, 0),
    (0x607A, 0),
    (0x60FF, 0),
    (0x6071, 0),
];

/// Simulated CiA-402 drive with first-order velocity dynamics.
///
/// Used for standalone runs and as the test double for everything the
/// driver core needs from a device: the 402 power ladder, mode bookkeeping,
/// target plumbing and an object dictionary. Injection knobs let tests
/// force faults, transport loss and mode-confirmation timeouts.
#[derive(Debug, Clone)]
pub struct SimulatedDrive {
    status: DriveStatus,
    supported_modes: Vec<OperationMode>,
    mode: Option<OperationMode>,
    objects: Vec<(u16, u8)>,

    position: f64,
    velocity: f64,
    current_rms: f64,
    temperature_c: f64,
    digital_inputs: u32,

    pending_target: Option<f64>,
    active_target: f64,
    max_target: f64,

    transport_up: bool,
    confirm_modes: bool,
    fault_latched: bool,
    homed: bool,

    timestep: Duration,
    sim_time_us: u64,
}

impl SimulatedDrive {
    pub fn new() -> Self {
        Self {
            status: DriveStatus::SwitchOnDisabled,
            supported_modes: Vec::new(),
            mode: None,
            objects: REQUIRED_OBJECTS.to_vec(),
            position: 0.0,
            velocity: 0.0,
            current_rms: 0.0,
            temperature_c: 25.0,
            digital_inputs: 0,
            pending_target: None,
            active_target: 0.0,
            max_target: 100.0,
            transport_up: true,
            confirm_modes: true,
            fault_latched: false,
            homed: false,
            timestep: Duration::from_millis(10),
            sim_time_us: 0,
        }
    }

    /// Simulation step advanced per read cycle; normally the loop Period.
    pub fn with_timestep(mut self, timestep: Duration) -> Self {
        self.timestep = timestep;
        self
    }

    /// Remove an object from the dictionary so validation fails.
    pub fn without_object(mut self, index: u16, subindex: u8) -> Self {
        self.objects.retain(|o| *o != (index, subindex));
        self
    }

    pub fn inject_fault(&mut self) {
        self.status = DriveStatus::Fault;
    }

    /// Make faults survive recover attempts.
    pub fn latch_fault(&mut self) {
        self.inject_fault();
        self.fault_latched = true;
    }

    pub fn set_transport_ready(&mut self, up: bool) {
        self.transport_up = up;
    }

    /// Make every mode transition time out instead of confirming.
    pub fn refuse_mode_confirm(&mut self) {
        self.confirm_modes = false;
    }

    pub fn status(&self) -> DriveStatus {
        self.status
    }

    pub fn active_target(&self) -> f64 {
        self.active_target
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }
}

impl Default for SimulatedDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDevice for SimulatedDrive {
    fn read_cycle(&mut self) {
        let dt_s = self.timestep.as_secs_f64();
        self.sim_time_us += self.timestep.as_micros() as u64;

        let driving = self.status.is_operational() && self.mode.is_some();
        let target_velocity = if driving { self.active_target } else { 0.0 };

        // First-order velocity response, position integration.
        let time_constant = 0.05;
        self.velocity +=
            (target_velocity - self.velocity) * (1.0 - (-dt_s / time_constant).exp());
        self.position += self.velocity * dt_s;

        // Current tracks commanded effort; winding temperature follows it.
        self.current_rms = 0.1 * (target_velocity - self.velocity).abs() + 0.02 * self.velocity.abs();
        let heat_in = 0.5 * self.current_rms * self.current_rms;
        let heat_out = 0.01 * (self.temperature_c - 25.0);
        self.temperature_c += (heat_in - heat_out) * dt_s;
    }

    fn write_cycle(&mut self) {
        if let Some(target) = self.pending_target.take() {
            self.active_target = target;
        }
    }

    fn register_default_modes(&mut self) {
        self.supported_modes = DEFAULT_MODES.to_vec();
    }

    fn validate_configured_objects(&self) -> Result<(), DeviceError> {
        for (index, subindex) in REQUIRED_OBJECTS {
            if !self.objects.contains(&(*index, *subindex)) {
                return Err(DeviceError::ObjectMissing {
                    index: *index,
                    subindex: *subindex,
                });
            }
        }
        Ok(())
    }

    fn enter_mode(&mut self, mode: OperationMode, deadline: Duration) -> Result<(), DeviceError> {
        if !self.transport_up {
            return Err(DeviceError::TransportDown);
        }
        if self.status == DriveStatus::Fault {
            return Err(DeviceError::Faulted);
        }
        if !self.status.is_operational() {
            return Err(DeviceError::NotEnabled);
        }
        if !self.supported_modes.contains(&mode) {
            return Err(DeviceError::ModeNotSupported(mode));
        }
        if !self.confirm_modes {
            return Err(DeviceError::ModeConfirmTimeout {
                mode,
                wait_ms: deadline.as_millis() as u64,
            });
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn set_target(&mut self, value: f64) -> Result<(), DeviceError> {
        if !self.transport_up {
            return Err(DeviceError::TransportDown);
        }
        if !value.is_finite() {
            return Err(DeviceError::TargetRejected {
                value,
                reason: "non-finite",
            });
        }
        if self.mode.is_none() {
            return Err(DeviceError::NoModeActive);
        }
        if value.abs() > self.max_target {
            return Err(DeviceError::TargetRejected {
                value,
                reason: "out of range",
            });
        }
        self.pending_target = Some(value);
        Ok(())
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        if !self.transport_up {
            return Err(DeviceError::TransportDown);
        }
        if self.status == DriveStatus::Fault {
            return Err(DeviceError::Faulted);
        }
        self.status = DriveStatus::OperationEnabled;
        self.homed = true;
        self.position = 0.0;
        Ok(())
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        if !self.transport_up {
            return Err(DeviceError::TransportDown);
        }
        if self.fault_latched {
            return Err(DeviceError::Faulted);
        }
        self.status = DriveStatus::OperationEnabled;
        Ok(())
    }

    fn halt(&mut self) -> Result<(), DeviceError> {
        if !self.transport_up {
            return Err(DeviceError::TransportDown);
        }
        self.status = DriveStatus::QuickStopActive;
        self.pending_target = None;
        self.active_target = 0.0;
        Ok(())
    }

    fn current_telemetry(&self) -> TelemetrySample {
        TelemetrySample {
            timestamp_us: self.sim_time_us,
            position: self.position,
            velocity: self.velocity,
            current_rms: self.current_rms,
            temperature_c: self.temperature_c,
            digital_inputs: self.digital_inputs,
            status: self.status,
        }
    }

    fn transport_ready(&self) -> bool {
        self.transport_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycling_drive() -> SimulatedDrive {
        let mut drive = SimulatedDrive::new();
        drive.register_default_modes();
        drive.init().unwrap();
        drive
            .enter_mode(OperationMode::ProfiledVelocity, Duration::from_millis(10))
            .unwrap();
        drive
    }

    #[test]
    fn validation_passes_with_full_dictionary() {
        assert!(SimulatedDrive::new().validate_configured_objects().is_ok());
    }

    #[test]
    fn validation_reports_missing_object() {
        let drive = SimulatedDrive::new().without_object(0x60FF, 0);
        assert_eq!(
            drive.validate_configured_objects(),
            Err(DeviceError::ObjectMissing {
                index: 0x60FF,
                subindex: 0
            })
        );
    }

    #[test]
    fn mode_entry_requires_enabled_power_stage() {
        let mut drive = SimulatedDrive::new();
        drive.register_default_modes();
        assert_eq!(
            drive.enter_mode(OperationMode::ProfiledVelocity, Duration::from_millis(10)),
            Err(DeviceError::NotEnabled)
        );
    }

    #[test]
    fn mode_entry_requires_registration() {
        let mut drive = SimulatedDrive::new();
        drive.init().unwrap();
        assert_eq!(
            drive.enter_mode(OperationMode::Homing, Duration::from_millis(10)),
            Err(DeviceError::ModeNotSupported(OperationMode::Homing))
        );
    }

    #[test]
    fn refused_confirmation_times_out() {
        let mut drive = cycling_drive();
        drive.refuse_mode_confirm();
        assert!(matches!(
            drive.enter_mode(OperationMode::ProfiledTorque, Duration::from_millis(25)),
            Err(DeviceError::ModeConfirmTimeout { wait_ms: 25, .. })
        ));
    }

    #[test]
    fn target_applies_on_write_cycle() {
        let mut drive = cycling_drive();
        drive.set_target(5.0).unwrap();
        assert_eq!(drive.active_target(), 0.0);
        drive.write_cycle();
        assert_eq!(drive.active_target(), 5.0);
    }

    #[test]
    fn out_of_range_target_rejected() {
        let mut drive = cycling_drive();
        assert!(matches!(
            drive.set_target(1e6),
            Err(DeviceError::TargetRejected { .. })
        ));
        assert!(matches!(
            drive.set_target(f64::NAN),
            Err(DeviceError::TargetRejected { .. })
        ));
    }

    #[test]
    fn velocity_converges_toward_target() {
        let mut drive = cycling_drive();
        drive.set_target(10.0).unwrap();
        drive.write_cycle();
        for _ in 0..200 {
            drive.read_cycle();
        }
        assert!((drive.current_telemetry().velocity - 10.0).abs() < 0.5);
    }

    #[test]
    fn halt_quickstops_and_clears_target() {
        let mut drive = cycling_drive();
        drive.set_target(10.0).unwrap();
        drive.write_cycle();
        drive.halt().unwrap();
        assert_eq!(drive.status(), DriveStatus::QuickStopActive);
        assert_eq!(drive.active_target(), 0.0);
    }

    #[test]
    fn latched_fault_survives_recover() {
        let mut drive = cycling_drive();
        drive.latch_fault();
        assert_eq!(drive.recover(), Err(DeviceError::Faulted));

        let mut drive = cycling_drive();
        drive.inject_fault();
        assert!(drive.recover().is_ok());
        assert_eq!(drive.status(), DriveStatus::OperationEnabled);
    }
}
